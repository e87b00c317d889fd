use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::Revision;
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::storage::StagedDocument;

/// `POST /revisions`: multipart form with `student_id` (or `carnet`),
/// `sede_id`, `approval_letter` and `thesis`.
///
/// Uploads are staged as they arrive; an early return drops the guards and
/// removes whatever was already written.
pub async fn submit_revision(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Revision>)> {
    let mut student_id: Option<i64> = None;
    let mut carnet: Option<String> = None;
    let mut sede_id: Option<i64> = None;
    let mut approval_letter: Option<StagedDocument> = None;
    let mut thesis: Option<StagedDocument> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("malformed upload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "student_id" | "sede_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::Validation(format!("malformed {}: {}", name, e)))?;
                let value: i64 = text
                    .trim()
                    .parse()
                    .map_err(|_| Error::Validation(format!("{} must be a number", name)))?;
                if name == "student_id" {
                    student_id = Some(value);
                } else {
                    sede_id = Some(value);
                }
            }
            "carnet" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| Error::Validation(format!("malformed carnet: {}", e)))?;
                carnet = Some(text);
            }
            "approval_letter" | "thesis" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::Validation(format!("malformed {}: {}", name, e)))?;
                let staged =
                    StagedDocument::stage(state.services.documents.clone(), &filename, &data)?;
                let slot = if name == "thesis" {
                    &mut thesis
                } else {
                    &mut approval_letter
                };
                // A repeated field replaces (and discards) the earlier upload.
                *slot = Some(staged);
            }
            _ => {}
        }
    }

    let student_id = match (student_id, carnet) {
        (Some(id), _) => id,
        (None, Some(carnet)) => state.services.submission.student_by_carnet(&carnet).await?,
        (None, None) => return Err(Error::Validation("student_id or carnet is required".into())),
    };
    let sede_id = sede_id.ok_or_else(|| Error::Validation("sede_id is required".into()))?;
    let approval_letter =
        approval_letter.ok_or_else(|| Error::Validation("approval_letter is required".into()))?;
    let thesis = thesis.ok_or_else(|| Error::Validation("thesis is required".into()))?;

    let revision = state
        .services
        .submission
        .submit_staged(student_id, sede_id, approval_letter, thesis)
        .await?;

    Ok((StatusCode::CREATED, Json(revision)))
}
