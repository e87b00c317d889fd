#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use thesis_review::db::{self, DbPool, Principal, Revision, RevisionStore};
use thesis_review::directory::{Capability, SqlDirectory};
use thesis_review::notify::{
    Notification, NotificationDispatcher, NotificationEvent, Notifier, NotifyError,
};
use thesis_review::review::{Collaborators, ReviewServices, SubmitRequest};
use thesis_review::storage::{DocumentRef, LocalDocumentStore};

pub const SEDE: i64 = 1;
pub const STUDENT_ANA: i64 = 1;
pub const STUDENT_BETO: i64 = 2;
pub const STUDENT_CARLA: i64 = 3;
pub const REVIEWER_A: i64 = 7;
pub const REVIEWER_B: i64 = 8;
pub const COORDINATOR: i64 = 50;
pub const NOT_A_REVIEWER: i64 = 99;

/// Captures every notification; can be told to fail or to stall delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// Delivery runs in the background; wait until `expected` notifications
    /// of this kind arrived, then give stragglers a moment and return the count.
    pub async fn delivered(&self, event: NotificationEvent, expected: usize) -> usize {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.count(event) < expected && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.count(event)
    }

    pub fn count(&self, event: NotificationEvent) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.event == event)
            .count()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(NotifyError::Other("mail relay unavailable".to_string()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub pool: DbPool,
    pub store: RevisionStore,
    pub services: Arc<ReviewServices>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn uploads(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }
}

pub async fn harness() -> Harness {
    build(true, RecordingNotifier::default()).await
}

pub async fn harness_excluding_rejected() -> Harness {
    build(false, RecordingNotifier::default()).await
}

pub async fn harness_with_failing_notifier() -> Harness {
    build(true, RecordingNotifier::failing()).await
}

pub async fn harness_with_slow_notifier(delay: Duration) -> Harness {
    build(true, RecordingNotifier::slow(delay)).await
}

async fn build(in_review_includes_rejected: bool, notifier: RecordingNotifier) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();

    let url = format!("sqlite://{}", dir.path().join("review.db").display());
    let pool = db::create_pool(&url, 8).await.unwrap();
    db::run_migrations(pool.as_ref()).await.unwrap();
    seed(&pool).await;

    let notifier = Arc::new(notifier);
    let directory = Arc::new(SqlDirectory::new(pool.clone()));
    let services = ReviewServices::new(
        pool.clone(),
        Collaborators {
            directory: directory.clone(),
            capabilities: directory,
            notifications: NotificationDispatcher::new(notifier.clone(), Duration::from_secs(10)),
            documents: Arc::new(LocalDocumentStore::new(uploads)),
        },
        in_review_includes_rejected,
    );

    Harness {
        dir,
        store: RevisionStore::new(pool.clone()),
        pool,
        services: Arc::new(services),
        notifier,
    }
}

async fn seed(pool: &DbPool) {
    db::insert_sede(pool.as_ref(), SEDE, "Central").await.unwrap();
    db::insert_sede(pool.as_ref(), 2, "Quetzaltenango").await.unwrap();

    let people = [
        (STUDENT_ANA, "2019001", "Ana Lopez", vec![Capability::Student]),
        (STUDENT_BETO, "2019002", "Beto Ruiz", vec![Capability::Student]),
        (STUDENT_CARLA, "2020015", "Carla Mendez", vec![Capability::Student]),
        (REVIEWER_A, "R-0007", "Dra. Paz", vec![Capability::Reviewer]),
        (
            REVIEWER_B,
            "R-0008",
            "Ing. Soto",
            vec![Capability::Reviewer, Capability::Coordinator],
        ),
        (COORDINATOR, "C-0050", "Lic. Mora", vec![Capability::Coordinator]),
        (NOT_A_REVIEWER, "2018099", "Dario Gil", vec![Capability::Student]),
    ];
    for (id, carnet, name, capabilities) in people {
        let principal = Principal {
            id,
            carnet: carnet.to_string(),
            full_name: name.to_string(),
            email: Some(format!("{}@example.edu", carnet.to_lowercase())),
        };
        db::insert_principal(pool.as_ref(), &principal, &capabilities)
            .await
            .unwrap();
    }
}

pub fn request(student_id: i64) -> SubmitRequest {
    SubmitRequest {
        student_id,
        sede_id: SEDE,
        approval_letter_ref: DocumentRef(format!("letter-{}.pdf", student_id)),
        thesis_ref: DocumentRef(format!("thesis-{}.pdf", student_id)),
    }
}

pub async fn submit(h: &Harness, student_id: i64) -> thesis_review::Result<Revision> {
    h.services.submission.submit(request(student_id)).await
}

/// Submit and assign in one go; returns (revision_id, assignment_id).
pub async fn submit_and_assign(h: &Harness, student_id: i64, reviewer_id: i64) -> (i64, i64) {
    let revision = submit(h, student_id).await.unwrap();
    let assignment = h
        .services
        .assignment
        .assign(revision.id, reviewer_id)
        .await
        .unwrap();
    (revision.id, assignment.id)
}

pub async fn count_rows(h: &Harness, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(h.pool.as_ref())
        .await
        .unwrap()
}
