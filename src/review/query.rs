use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::db::queries;
use crate::db::{DbPool, ReviewerHistory, RevisionOverview};
use crate::error::{Error, Result};

const MAX_HISTORY_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub(crate) fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

fn carnet_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]{1,32}$").expect("valid carnet pattern"))
}

/// Blank filters mean "no filter"; anything else must look like a carnet.
fn normalize_carnet(filter: Option<&str>) -> Result<Option<String>> {
    match filter.map(str::trim) {
        None | Some("") => Ok(None),
        Some(carnet) if carnet_pattern().is_match(carnet) => Ok(Some(carnet.to_lowercase())),
        Some(carnet) => Err(Error::Validation(format!("invalid carnet filter '{}'", carnet))),
    }
}

/// Read-only views over the workflow.
pub struct QueryService {
    pool: DbPool,
    in_review_includes_rejected: bool,
}

impl QueryService {
    pub fn new(pool: DbPool, in_review_includes_rejected: bool) -> Self {
        Self {
            pool,
            in_review_includes_rejected,
        }
    }

    /// Submitted revisions still waiting for a reviewer.
    pub async fn list_pending(
        &self,
        order: SortOrder,
        carnet: Option<&str>,
    ) -> Result<Vec<RevisionOverview>> {
        let carnet = normalize_carnet(carnet)?;
        queries::list_pending(self.pool.as_ref(), order, carnet.as_deref()).await
    }

    /// Assigned revisions, newest one per student.
    ///
    /// Rejected revisions are listed too unless the service was built with
    /// `in_review_includes_rejected = false`.
    pub async fn list_in_review(
        &self,
        order: SortOrder,
        carnet: Option<&str>,
    ) -> Result<Vec<RevisionOverview>> {
        let carnet = normalize_carnet(carnet)?;
        queries::list_in_review(
            self.pool.as_ref(),
            order,
            carnet.as_deref(),
            self.in_review_includes_rejected,
        )
        .await
    }

    pub async fn list_approved(
        &self,
        order: SortOrder,
        carnet: Option<&str>,
    ) -> Result<Vec<RevisionOverview>> {
        let carnet = normalize_carnet(carnet)?;
        queries::list_approved(self.pool.as_ref(), order, carnet.as_deref()).await
    }

    pub async fn reviewer_history(
        &self,
        reviewer_id: i64,
        limit: i64,
        order: SortOrder,
    ) -> Result<ReviewerHistory> {
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(Error::Validation(format!(
                "limit must be between 1 and {}",
                MAX_HISTORY_LIMIT
            )));
        }
        queries::reviewer_history(self.pool.as_ref(), reviewer_id, limit, order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carnet_filter_normalization() {
        assert_eq!(normalize_carnet(None).unwrap(), None);
        assert_eq!(normalize_carnet(Some("  ")).unwrap(), None);
        assert_eq!(
            normalize_carnet(Some(" 2019-AB12 ")).unwrap(),
            Some("2019-ab12".to_string())
        );
        assert!(normalize_carnet(Some("20%")).is_err());
        assert!(normalize_carnet(Some("1' OR '1'='1")).is_err());
    }
}
