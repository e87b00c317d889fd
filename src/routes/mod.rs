mod api;
mod upload;

pub use api::*;
pub use upload::submit_revision;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/revisions", post(submit_revision))
        .route("/revisions/pending", get(list_pending))
        .route("/revisions/in-review", get(list_in_review))
        .route("/revisions/approved", get(list_approved))
        .route("/revisions/:revision_id/assignment", post(assign_reviewer))
        .route("/assignments/:assignment_id/decision", post(decide))
        .route("/reviewers/:reviewer_id/history", get(reviewer_history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        let message = match &self {
            Error::Validation(m) | Error::NotFound(m) => m.clone(),
            Error::Conflict(c) => c.to_string(),
            other => {
                tracing::error!("request failed: {}", other);
                "internal error".to_string()
            }
        };

        (
            status,
            Json(serde_json::json!({ "error": kind, "message": message })),
        )
            .into_response()
    }
}
