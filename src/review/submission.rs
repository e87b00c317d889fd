use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{NewRevision, Revision, RevisionStore};
use crate::directory::{Capability, CapabilityCheck, Directory, PrincipalKey};
use crate::error::{Error, Result};
use crate::notify::{Notification, NotificationDispatcher};
use crate::storage::{DocumentRef, StagedDocument};

#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub student_id: i64,
    pub sede_id: i64,
    pub approval_letter_ref: DocumentRef,
    pub thesis_ref: DocumentRef,
}

pub struct RevisionSubmissionService {
    store: RevisionStore,
    directory: Arc<dyn Directory>,
    capabilities: Arc<dyn CapabilityCheck>,
    notifications: NotificationDispatcher,
}

impl RevisionSubmissionService {
    pub fn new(
        store: RevisionStore,
        directory: Arc<dyn Directory>,
        capabilities: Arc<dyn CapabilityCheck>,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            directory,
            capabilities,
            notifications,
        }
    }

    /// Open a new revision for a student.
    ///
    /// Fails with a conflict while the student has an active revision, and
    /// forever once one of the student's revisions was approved.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Revision> {
        if request.approval_letter_ref.as_str().trim().is_empty() {
            return Err(Error::Validation("approval letter is required".to_string()));
        }
        if request.thesis_ref.as_str().trim().is_empty() {
            return Err(Error::Validation("thesis document is required".to_string()));
        }

        let student = self
            .directory
            .resolve(PrincipalKey::Id(request.student_id))
            .await?;
        let is_student = match student {
            Some(_) => {
                self.capabilities
                    .has_capability(request.student_id, Capability::Student)
                    .await?
            }
            None => false,
        };
        if !is_student {
            return Err(Error::NotFound(format!("student {}", request.student_id)));
        }
        if !self.directory.sede_exists(request.sede_id).await? {
            return Err(Error::NotFound(format!("sede {}", request.sede_id)));
        }

        let new = NewRevision {
            student_id: request.student_id,
            sede_id: request.sede_id,
            approval_letter_ref: request.approval_letter_ref.0,
            thesis_ref: request.thesis_ref.0,
        };
        let (revision, _approval) = self
            .store
            .create_revision(&new, Utc::now())
            .await
            .inspect_err(|e| {
                if let Some(conflict) = e.conflict() {
                    debug!(student_id = new.student_id, "submission refused: {}", conflict);
                }
            })?;

        info!(
            revision_id = revision.id,
            student_id = revision.student_id,
            "revision submitted"
        );
        self.notifications.dispatch(Notification::submitted(&revision));

        Ok(revision)
    }

    /// Look up a student by carnet, for callers that only know the badge number.
    pub async fn student_by_carnet(&self, carnet: &str) -> Result<i64> {
        let carnet = carnet.trim();
        if carnet.is_empty() {
            return Err(Error::Validation("carnet is required".to_string()));
        }
        let principal = self
            .directory
            .resolve(PrincipalKey::Carnet(carnet.to_string()))
            .await?
            .ok_or_else(|| Error::NotFound(format!("student with carnet {}", carnet)))?;
        Ok(principal.id)
    }

    /// [`submit`](Self::submit) for freshly uploaded documents.
    ///
    /// The documents are kept only if the revision is created; on any error
    /// both are discarded when the guards drop.
    pub async fn submit_staged(
        &self,
        student_id: i64,
        sede_id: i64,
        approval_letter: StagedDocument,
        thesis: StagedDocument,
    ) -> Result<Revision> {
        let request = SubmitRequest {
            student_id,
            sede_id,
            approval_letter_ref: approval_letter.reference().clone(),
            thesis_ref: thesis.reference().clone(),
        };
        let revision = self.submit(request).await?;
        approval_letter.commit();
        thesis.commit();
        Ok(revision)
    }
}
