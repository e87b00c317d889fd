use chrono::Utc;
use tracing::{debug, info};

use crate::db::{Comment, RevisionStore};
use crate::error::{Error, Result};
use crate::notify::{Notification, NotificationDispatcher};
use crate::review::status::Verdict;

pub struct DecisionService {
    store: RevisionStore,
    notifications: NotificationDispatcher,
}

impl DecisionService {
    pub fn new(store: RevisionStore, notifications: NotificationDispatcher) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Record the reviewer's verdict for an assignment.
    ///
    /// Deactivates the revision, settles the approval and stores the comment
    /// in one transaction. The student is notified only after it commits.
    pub async fn decide(
        &self,
        assignment_id: i64,
        title: &str,
        body: &str,
        verdict: Verdict,
    ) -> Result<Comment> {
        let title = title.trim();
        let body = body.trim();
        if title.is_empty() {
            return Err(Error::Validation("comment title is required".to_string()));
        }
        if body.is_empty() {
            return Err(Error::Validation("comment body is required".to_string()));
        }

        let record = self
            .store
            .record_decision(assignment_id, title, body, verdict, Utc::now())
            .await
            .inspect_err(|e| {
                if let Some(conflict) = e.conflict() {
                    debug!(assignment_id, "decision refused: {}", conflict);
                }
            })?;

        info!(
            assignment_id,
            revision_id = record.revision.id,
            status = %record.approval.status,
            "revision decided"
        );
        self.notifications.dispatch(Notification::decided(&record));

        Ok(record.comment)
    }
}
