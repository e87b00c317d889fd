//! Revision review workflow: submission, reviewer assignment, decision and
//! the read-only listings over them.

mod assignment;
mod decision;
pub mod query;
pub mod status;
mod submission;

pub use assignment::ReviewerAssignmentService;
pub use decision::DecisionService;
pub use query::{QueryService, SortOrder};
pub use status::{ApprovalStatus, Verdict};
pub use submission::{RevisionSubmissionService, SubmitRequest};

use std::sync::Arc;

use crate::db::{DbPool, RevisionStore};
use crate::directory::{CapabilityCheck, Directory};
use crate::notify::NotificationDispatcher;
use crate::storage::DocumentStore;

/// Everything a request handler needs, wired over one pool.
pub struct ReviewServices {
    pub submission: RevisionSubmissionService,
    pub assignment: ReviewerAssignmentService,
    pub decision: DecisionService,
    pub query: QueryService,
    pub documents: Arc<dyn DocumentStore>,
}

pub struct Collaborators {
    pub directory: Arc<dyn Directory>,
    pub capabilities: Arc<dyn CapabilityCheck>,
    pub notifications: NotificationDispatcher,
    pub documents: Arc<dyn DocumentStore>,
}

impl ReviewServices {
    pub fn new(pool: DbPool, collaborators: Collaborators, in_review_includes_rejected: bool) -> Self {
        let store = RevisionStore::new(pool.clone());
        Self {
            submission: RevisionSubmissionService::new(
                store.clone(),
                collaborators.directory,
                collaborators.capabilities.clone(),
                collaborators.notifications.clone(),
            ),
            assignment: ReviewerAssignmentService::new(store.clone(), collaborators.capabilities),
            decision: DecisionService::new(store, collaborators.notifications),
            query: QueryService::new(pool, in_review_includes_rejected),
            documents: collaborators.documents,
        }
    }
}
