//! Listing queries for the review dashboards.

use sqlx::SqlitePool;

use super::models::{
    Approval, Assignment, Comment, HistoryEntry, ReviewerHistory, ReviewerTotals, Revision,
    RevisionOverview,
};
use crate::error::{Error, Result};
use crate::review::query::SortOrder;

const OVERVIEW_COLUMNS: &str = r#"
    r.id AS revision_id, r.student_id, p.carnet, p.full_name AS student_name, r.sede_id,
    r.approval_letter_ref, r.thesis_ref, r.active_process, r.submitted_at,
    ap.id AS approval_id, ap.status, ap.approved, ap.decided_at,
    a.id AS assignment_id, a.reviewer_id, a.assigned_at
"#;

const OVERVIEW_JOINS: &str = r#"
    FROM revisions r
    JOIN approvals ap ON ap.revision_id = r.id
    LEFT JOIN assignments a ON a.revision_id = r.id
    LEFT JOIN principals p ON p.id = r.student_id
"#;

// `?1` is the lowercased carnet filter or NULL.
const CARNET_FILTER: &str = "(?1 IS NULL OR LOWER(p.carnet) LIKE '%' || ?1 || '%')";

pub async fn list_pending(
    pool: &SqlitePool,
    order: SortOrder,
    carnet: Option<&str>,
) -> Result<Vec<RevisionOverview>> {
    let dir = order.sql();
    let sql = format!(
        "SELECT {OVERVIEW_COLUMNS} {OVERVIEW_JOINS}
         WHERE ap.status = 'pending' AND a.id IS NULL AND {CARNET_FILTER}
         ORDER BY r.submitted_at {dir}, r.id {dir}"
    );
    let rows = sqlx::query_as::<_, RevisionOverview>(&sql)
        .bind(carnet)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Only the newest matching revision per student is returned, whatever `order` is.
pub async fn list_in_review(
    pool: &SqlitePool,
    order: SortOrder,
    carnet: Option<&str>,
    include_rejected: bool,
) -> Result<Vec<RevisionOverview>> {
    let dir = order.sql();
    let statuses = if include_rejected {
        "('in revision', 'rejected')"
    } else {
        "('in revision')"
    };
    let sql = format!(
        "SELECT * FROM (
             SELECT {OVERVIEW_COLUMNS},
                    ROW_NUMBER() OVER (
                        PARTITION BY r.student_id
                        ORDER BY r.submitted_at DESC, r.id DESC
                    ) AS newest
             {OVERVIEW_JOINS}
             WHERE a.id IS NOT NULL AND ap.status IN {statuses} AND {CARNET_FILTER}
         )
         WHERE newest = 1
         ORDER BY submitted_at {dir}, revision_id {dir}"
    );
    let rows = sqlx::query_as::<_, RevisionOverview>(&sql)
        .bind(carnet)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn list_approved(
    pool: &SqlitePool,
    order: SortOrder,
    carnet: Option<&str>,
) -> Result<Vec<RevisionOverview>> {
    let dir = order.sql();
    let sql = format!(
        "SELECT {OVERVIEW_COLUMNS} {OVERVIEW_JOINS}
         WHERE ap.status = 'approved' AND {CARNET_FILTER}
         ORDER BY r.submitted_at {dir}, r.id {dir}"
    );
    let rows = sqlx::query_as::<_, RevisionOverview>(&sql)
        .bind(carnet)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Assignments of one reviewer with everything hanging off them.
///
/// `limit` bounds the entries; the totals always cover every assignment.
pub async fn reviewer_history(
    pool: &SqlitePool,
    reviewer_id: i64,
    limit: i64,
    order: SortOrder,
) -> Result<ReviewerHistory> {
    let dir = order.sql();
    // One read transaction so entries and totals come from the same snapshot.
    let mut tx = pool.begin().await?;

    let assignments = sqlx::query_as::<_, Assignment>(&format!(
        "SELECT id, revision_id, reviewer_id, assigned_at FROM assignments
         WHERE reviewer_id = ?1
         ORDER BY assigned_at {dir}, id {dir}
         LIMIT ?2"
    ))
    .bind(reviewer_id)
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    let mut entries = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let revision = sqlx::query_as::<_, Revision>(
            "SELECT id, student_id, sede_id, approval_letter_ref, thesis_ref, active_process, submitted_at
             FROM revisions WHERE id = ?1",
        )
        .bind(assignment.revision_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::Internal(format!("assignment {} lost its revision", assignment.id)))?;

        let approval = sqlx::query_as::<_, Approval>(
            "SELECT id, revision_id, student_id, status, approved, decided_at
             FROM approvals WHERE revision_id = ?1",
        )
        .bind(assignment.revision_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::Internal(format!("revision {} has no approval", revision.id)))?;

        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, assignment_id, title, body, decided_at, created_at
             FROM comments WHERE assignment_id = ?1",
        )
        .bind(assignment.id)
        .fetch_optional(&mut *tx)
        .await?;

        entries.push(HistoryEntry {
            assignment,
            revision,
            approval,
            comment,
        });
    }

    let totals = sqlx::query_as::<_, ReviewerTotals>(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN ap.status = 'approved' THEN 1 ELSE 0 END), 0) AS approved,
            COALESCE(SUM(CASE WHEN ap.status = 'rejected' THEN 1 ELSE 0 END), 0) AS rejected,
            COALESCE(SUM(CASE WHEN ap.status IN ('pending', 'in revision') THEN 1 ELSE 0 END), 0)
                AS pending_or_in_review,
            COUNT(c.id) AS total_comments
        FROM assignments a
        JOIN approvals ap ON ap.revision_id = a.revision_id
        LEFT JOIN comments c ON c.assignment_id = a.id
        WHERE a.reviewer_id = ?1
        "#,
    )
    .bind(reviewer_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(ReviewerHistory {
        reviewer_id,
        entries,
        totals,
    })
}
