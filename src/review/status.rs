//! Approval status machine.
//!
//! Stored as the strings `pending`, `in revision`, `approved` and `rejected`.
//! Every legal move is listed in [`ApprovalStatus::apply`]; anything else is
//! an [`IllegalTransition`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in revision")]
    InReview,
    #[serde(rename = "approved")]
    Approved,
    #[serde(rename = "rejected")]
    Rejected,
}

/// Terminal outcome a reviewer can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    ReviewerAssigned,
    Decided(Verdict),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal approval transition from '{from}' on {event:?}")]
pub struct IllegalTransition {
    pub from: ApprovalStatus,
    pub event: StatusEvent,
}

#[derive(Debug, Error)]
#[error("unknown approval status '{0}'")]
pub struct UnknownStatus(pub String);

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::InReview => "in revision",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Rejected)
    }

    pub fn apply(self, event: StatusEvent) -> Result<ApprovalStatus, IllegalTransition> {
        use ApprovalStatus::*;
        match (self, event) {
            (Pending, StatusEvent::ReviewerAssigned) => Ok(InReview),
            (InReview, StatusEvent::Decided(Verdict::Approved)) => Ok(Approved),
            (InReview, StatusEvent::Decided(Verdict::Rejected)) => Ok(Rejected),
            (Pending, StatusEvent::Decided(_))
            | (InReview, StatusEvent::ReviewerAssigned)
            | (Approved, _)
            | (Rejected, _) => Err(IllegalTransition { from: self, event }),
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "in revision" => Ok(ApprovalStatus::InReview),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// Lets `FromRow` decode the TEXT column through `#[sqlx(try_from = "String")]`.
impl TryFrom<String> for ApprovalStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
