//! Write side of the review workflow.
//!
//! Each mutating method is one SQLite transaction whose first statement is a
//! write, so the database writer lock is held before anything is read. The
//! exclusivity rules live in the schema:
//!
//! - `ux_revisions_active_student`: one active revision per student
//! - `approvals.revision_id UNIQUE`: one approval per revision
//! - `assignments.revision_id UNIQUE`: one reviewer per revision
//! - `comments.assignment_id UNIQUE`: one verdict per assignment
//!
//! and the "never again after approval" rule is a guarded insert inside the
//! same transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use super::models::{Approval, Assignment, Comment, DecisionRecord, Revision};
use super::DbPool;
use crate::error::{is_unique_violation, Conflict, Error, Result};
use crate::review::status::{ApprovalStatus, StatusEvent, Verdict};

const REVISION_COLUMNS: &str =
    "id, student_id, sede_id, approval_letter_ref, thesis_ref, active_process, submitted_at";
const APPROVAL_COLUMNS: &str = "id, revision_id, student_id, status, approved, decided_at";
const ASSIGNMENT_COLUMNS: &str = "id, revision_id, reviewer_id, assigned_at";
const COMMENT_COLUMNS: &str = "id, assignment_id, title, body, decided_at, created_at";

#[derive(Debug, Clone)]
pub struct NewRevision {
    pub student_id: i64,
    pub sede_id: i64,
    pub approval_letter_ref: String,
    pub thesis_ref: String,
}

#[derive(Clone)]
pub struct RevisionStore {
    pool: DbPool,
}

impl RevisionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.pool.as_ref()
    }

    /// Insert a revision and its pending approval as one unit.
    pub async fn create_revision(
        &self,
        new: &NewRevision,
        now: DateTime<Utc>,
    ) -> Result<(Revision, Approval)> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Revision>(&format!(
            r#"
            INSERT INTO revisions (student_id, sede_id, approval_letter_ref, thesis_ref, active_process, submitted_at)
            SELECT ?1, ?2, ?3, ?4, 1, ?5
            WHERE NOT EXISTS (
                SELECT 1 FROM approvals WHERE student_id = ?1 AND status = 'approved'
            )
            RETURNING {REVISION_COLUMNS}
            "#
        ))
        .bind(new.student_id)
        .bind(new.sede_id)
        .bind(&new.approval_letter_ref)
        .bind(&new.thesis_ref)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await;

        let revision = match inserted {
            Ok(Some(revision)) => revision,
            Ok(None) => return Err(Conflict::AlreadyApproved.into()),
            Err(e) if is_unique_violation(&e) => return Err(Conflict::ActiveRevisionExists.into()),
            Err(e) => return Err(e.into()),
        };

        let approval = sqlx::query_as::<_, Approval>(&format!(
            r#"
            INSERT INTO approvals (revision_id, student_id, status, approved, decided_at)
            VALUES (?1, ?2, ?3, 0, NULL)
            RETURNING {APPROVAL_COLUMNS}
            "#
        ))
        .bind(revision.id)
        .bind(revision.student_id)
        .bind(ApprovalStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((revision, approval))
    }

    /// Bind a reviewer to an active revision and move its approval into review.
    pub async fn create_assignment(
        &self,
        revision_id: i64,
        reviewer_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, Assignment>(&format!(
            r#"
            INSERT INTO assignments (revision_id, reviewer_id, assigned_at)
            SELECT id, ?2, ?3 FROM revisions WHERE id = ?1 AND active_process = 1
            RETURNING {ASSIGNMENT_COLUMNS}
            "#
        ))
        .bind(revision_id)
        .bind(reviewer_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await;

        let assignment = match inserted {
            Ok(Some(assignment)) => assignment,
            Ok(None) => return Err(explain_missing_assignment(&mut tx, revision_id).await),
            Err(e) if is_unique_violation(&e) => return Err(Conflict::AlreadyAssigned.into()),
            Err(e) => return Err(e.into()),
        };

        let current = approval_status(&mut tx, revision_id).await?;
        let next = current
            .apply(StatusEvent::ReviewerAssigned)
            .map_err(|e| Error::Internal(format!("revision {}: {}", revision_id, e)))?;

        sqlx::query("UPDATE approvals SET status = ?2 WHERE revision_id = ?1")
            .bind(revision_id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(assignment)
    }

    /// Close the revision behind `assignment_id` with a verdict.
    ///
    /// The conditional flip of `active_process` picks the single winner when
    /// decisions race; the loser sees zero affected rows and writes nothing.
    pub async fn record_decision(
        &self,
        assignment_id: i64,
        title: &str,
        body: &str,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> Result<DecisionRecord> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query(
            r#"
            UPDATE revisions SET active_process = 0
            WHERE active_process = 1
              AND id = (SELECT revision_id FROM assignments WHERE id = ?1)
            "#,
        )
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

        let revision_id: Option<i64> =
            sqlx::query_scalar("SELECT revision_id FROM assignments WHERE id = ?1")
                .bind(assignment_id)
                .fetch_optional(&mut *tx)
                .await?;
        let revision_id = match revision_id {
            Some(id) => id,
            None => return Err(Error::NotFound(format!("assignment {}", assignment_id))),
        };
        if flipped.rows_affected() == 0 {
            return Err(Conflict::AlreadyDecided.into());
        }

        let current = approval_status(&mut tx, revision_id).await?;
        let next = current
            .apply(StatusEvent::Decided(verdict))
            .map_err(|e| Error::Internal(format!("revision {}: {}", revision_id, e)))?;

        let approval = sqlx::query_as::<_, Approval>(&format!(
            r#"
            UPDATE approvals SET status = ?2, approved = ?3, decided_at = ?4
            WHERE revision_id = ?1
            RETURNING {APPROVAL_COLUMNS}
            "#
        ))
        .bind(revision_id)
        .bind(next.as_str())
        .bind(next == ApprovalStatus::Approved)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (assignment_id, title, body, decided_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(assignment_id)
        .bind(title)
        .bind(body)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(Conflict::AlreadyDecided)
            } else {
                Error::Database(e)
            }
        })?;

        let revision = fetch_revision(&mut tx, revision_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("revision {}", revision_id)))?;

        tx.commit().await?;
        Ok(DecisionRecord {
            revision,
            approval,
            comment,
        })
    }

    pub async fn get_revision(&self, revision_id: i64) -> Result<Option<Revision>> {
        let mut conn = self.pool.acquire().await?;
        fetch_revision(&mut conn, revision_id).await
    }

    pub async fn approval_for_revision(&self, revision_id: i64) -> Result<Option<Approval>> {
        let approval = sqlx::query_as::<_, Approval>(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE revision_id = ?1"
        ))
        .bind(revision_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(approval)
    }

    pub async fn assignment_for_revision(&self, revision_id: i64) -> Result<Option<Assignment>> {
        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE revision_id = ?1"
        ))
        .bind(revision_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(assignment)
    }

    pub async fn comments_for_assignment(&self, assignment_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE assignment_id = ?1 ORDER BY id"
        ))
        .bind(assignment_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(comments)
    }

    /// Every revision a student ever submitted, oldest first.
    pub async fn revisions_for_student(&self, student_id: i64) -> Result<Vec<Revision>> {
        let revisions = sqlx::query_as::<_, Revision>(&format!(
            "SELECT {REVISION_COLUMNS} FROM revisions WHERE student_id = ?1 ORDER BY submitted_at, id"
        ))
        .bind(student_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(revisions)
    }
}

async fn fetch_revision(conn: &mut SqliteConnection, revision_id: i64) -> Result<Option<Revision>> {
    let revision = sqlx::query_as::<_, Revision>(&format!(
        "SELECT {REVISION_COLUMNS} FROM revisions WHERE id = ?1"
    ))
    .bind(revision_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(revision)
}

async fn approval_status(conn: &mut SqliteConnection, revision_id: i64) -> Result<ApprovalStatus> {
    let raw: Option<String> = sqlx::query_scalar("SELECT status FROM approvals WHERE revision_id = ?1")
        .bind(revision_id)
        .fetch_optional(&mut *conn)
        .await?;
    let raw = raw.ok_or_else(|| {
        Error::Internal(format!("revision {} has no approval record", revision_id))
    })?;
    raw.parse::<ApprovalStatus>()
        .map_err(|e| Error::Internal(e.to_string()))
}

/// Work out why the guarded assignment insert selected no revision.
async fn explain_missing_assignment(conn: &mut SqliteConnection, revision_id: i64) -> Error {
    let row: std::result::Result<Option<(bool, bool)>, sqlx::Error> = sqlx::query_as(
        r#"
        SELECT r.active_process,
               EXISTS (SELECT 1 FROM assignments a WHERE a.revision_id = r.id)
        FROM revisions r WHERE r.id = ?1
        "#,
    )
    .bind(revision_id)
    .fetch_optional(&mut *conn)
    .await;

    match row {
        Ok(None) => Error::NotFound(format!("revision {}", revision_id)),
        Ok(Some((_, true))) => Error::Conflict(Conflict::AlreadyAssigned),
        Ok(Some((_, false))) => Error::Conflict(Conflict::AlreadyDecided),
        Err(e) => Error::Database(e),
    }
}
