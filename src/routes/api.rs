use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{Assignment, Comment, ReviewerHistory, RevisionOverview};
use crate::error::Result;
use crate::review::{SortOrder, Verdict};
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    order: SortOrder,
    carnet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    order: SortOrder,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AssignBody {
    reviewer_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    title: String,
    body: String,
    verdict: Verdict,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    sqlx::query("SELECT 1").execute(state.pool.as_ref()).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RevisionOverview>>> {
    let rows = state
        .services
        .query
        .list_pending(params.order, params.carnet.as_deref())
        .await?;
    Ok(Json(rows))
}

pub async fn list_in_review(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RevisionOverview>>> {
    let rows = state
        .services
        .query
        .list_in_review(params.order, params.carnet.as_deref())
        .await?;
    Ok(Json(rows))
}

pub async fn list_approved(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RevisionOverview>>> {
    let rows = state
        .services
        .query
        .list_approved(params.order, params.carnet.as_deref())
        .await?;
    Ok(Json(rows))
}

pub async fn reviewer_history(
    State(state): State<Arc<AppState>>,
    Path(reviewer_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ReviewerHistory>> {
    let history = state
        .services
        .query
        .reviewer_history(
            reviewer_id,
            params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            params.order,
        )
        .await?;
    Ok(Json(history))
}

pub async fn assign_reviewer(
    State(state): State<Arc<AppState>>,
    Path(revision_id): Path<i64>,
    Json(body): Json<AssignBody>,
) -> Result<(StatusCode, Json<Assignment>)> {
    let assignment = state
        .services
        .assignment
        .assign(revision_id, body.reviewer_id)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn decide(
    State(state): State<Arc<AppState>>,
    Path(assignment_id): Path<i64>,
    Json(body): Json<DecisionBody>,
) -> Result<(StatusCode, Json<Comment>)> {
    let comment = state
        .services
        .decision
        .decide(assignment_id, &body.title, &body.body, body.verdict)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
