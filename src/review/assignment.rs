use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{Assignment, RevisionStore};
use crate::directory::{Capability, CapabilityCheck};
use crate::error::{Error, Result};

pub struct ReviewerAssignmentService {
    store: RevisionStore,
    capabilities: Arc<dyn CapabilityCheck>,
}

impl ReviewerAssignmentService {
    pub fn new(store: RevisionStore, capabilities: Arc<dyn CapabilityCheck>) -> Self {
        Self {
            store,
            capabilities,
        }
    }

    /// Bind `reviewer_id` to the revision. A revision gets one reviewer, ever.
    pub async fn assign(&self, revision_id: i64, reviewer_id: i64) -> Result<Assignment> {
        if !self
            .capabilities
            .has_capability(reviewer_id, Capability::Reviewer)
            .await?
        {
            return Err(Error::Validation(format!(
                "principal {} is not a reviewer",
                reviewer_id
            )));
        }

        let assignment = self
            .store
            .create_assignment(revision_id, reviewer_id, Utc::now())
            .await
            .inspect_err(|e| {
                if let Some(conflict) = e.conflict() {
                    debug!(revision_id, reviewer_id, "assignment refused: {}", conflict);
                }
            })?;

        info!(
            assignment_id = assignment.id,
            revision_id, reviewer_id, "reviewer assigned"
        );
        Ok(assignment)
    }
}
