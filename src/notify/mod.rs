//! Best-effort notifications.
//!
//! Delivery happens after the owning transaction commits. Failures and
//! timeouts are logged and dropped; they never change the outcome of the
//! operation that triggered them.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::{DecisionRecord, Revision};
use crate::directory::Capability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Submitted,
    Decided,
}

/// Addressee, resolved to concrete contacts by the delivery side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Recipient {
    Principal(i64),
    Everyone(Capability),
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub event: NotificationEvent,
    pub recipient: Recipient,
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn submitted(revision: &Revision) -> Self {
        Self {
            event: NotificationEvent::Submitted,
            recipient: Recipient::Everyone(Capability::Coordinator),
            payload: serde_json::json!({
                "revision_id": revision.id,
                "student_id": revision.student_id,
                "sede_id": revision.sede_id,
                "submitted_at": revision.submitted_at,
            }),
        }
    }

    pub fn decided(record: &DecisionRecord) -> Self {
        Self {
            event: NotificationEvent::Decided,
            recipient: Recipient::Principal(record.revision.student_id),
            payload: serde_json::json!({
                "revision_id": record.revision.id,
                "status": record.approval.status,
                "title": record.comment.title,
                "decided_at": record.comment.decided_at,
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("receiver answered {0}")]
    Rejected(u16),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            event = ?notification.event,
            recipient = ?notification.recipient,
            payload = %notification.payload,
            "notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Deliver in the background. The caller never waits on the receiver;
    /// the handle is only useful to tests that need delivery to finish.
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, notifier.notify(&notification)).await {
                Ok(Ok(())) => debug!(event = ?notification.event, "notification delivered"),
                Ok(Err(e)) => warn!(
                    event = ?notification.event,
                    recipient = ?notification.recipient,
                    "notification failed: {}",
                    e
                ),
                Err(_) => warn!(
                    event = ?notification.event,
                    recipient = ?notification.recipient,
                    "notification timed out after {:?}",
                    timeout
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing(AtomicUsize);

    #[async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _: &Notification) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::Other("smtp down".to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl Notifier for Slow {
        async fn notify(&self, _: &Notification) -> Result<(), NotifyError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn sample() -> Notification {
        Notification {
            event: NotificationEvent::Submitted,
            recipient: Recipient::Everyone(Capability::Coordinator),
            payload: serde_json::json!({ "revision_id": 1 }),
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let failing = Arc::new(Failing(AtomicUsize::new(0)));
        let dispatcher = NotificationDispatcher::new(failing.clone(), Duration::from_secs(1));
        dispatcher.dispatch(sample()).await.unwrap();
        assert_eq!(failing.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_receivers_are_cut_off() {
        let dispatcher = NotificationDispatcher::new(Arc::new(Slow), Duration::from_millis(50));
        let started = std::time::Instant::now();
        let handle = dispatcher.dispatch(sample());
        assert!(started.elapsed() < Duration::from_millis(50));
        handle.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn recipient_serializes_tagged() {
        let json = serde_json::to_value(Recipient::Principal(7)).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "principal", "value": 7 }));
    }
}
