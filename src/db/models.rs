use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::review::status::ApprovalStatus;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Revision {
    pub id: i64,
    pub student_id: i64,
    pub sede_id: i64,
    pub approval_letter_ref: String,
    pub thesis_ref: String,
    pub active_process: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Approval {
    pub id: i64,
    pub revision_id: i64,
    pub student_id: i64,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    pub approved: bool,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub revision_id: i64,
    pub reviewer_id: i64,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub assignment_id: i64,
    pub title: String,
    pub body: String,
    pub decided_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub carnet: String,
    pub full_name: String,
    pub email: Option<String>,
}

/// Flattened row behind the pending / in-review / approved listings.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RevisionOverview {
    pub revision_id: i64,
    pub student_id: i64,
    pub carnet: Option<String>,
    pub student_name: Option<String>,
    pub sede_id: i64,
    pub approval_letter_ref: String,
    pub thesis_ref: String,
    pub active_process: bool,
    pub submitted_at: DateTime<Utc>,
    pub approval_id: i64,
    #[sqlx(try_from = "String")]
    pub status: ApprovalStatus,
    pub approved: bool,
    pub decided_at: Option<DateTime<Utc>>,
    pub assignment_id: Option<i64>,
    pub reviewer_id: Option<i64>,
    pub assigned_at: Option<DateTime<Utc>>,
}

/// Outcome of a committed decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub revision: Revision,
    pub approval: Approval,
    pub comment: Comment,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub assignment: Assignment,
    pub revision: Revision,
    pub approval: Approval,
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ReviewerTotals {
    pub approved: i64,
    pub rejected: i64,
    pub pending_or_in_review: i64,
    pub total_comments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewerHistory {
    pub reviewer_id: i64,
    pub entries: Vec<HistoryEntry>,
    pub totals: ReviewerTotals,
}
