//! Error types for the review workflow

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Which exclusivity rule a write would have broken.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    #[error("active revision exists")]
    ActiveRevisionExists,

    #[error("already approved; no further submissions")]
    AlreadyApproved,

    #[error("already assigned")]
    AlreadyAssigned,

    #[error("already decided")]
    AlreadyDecided,
}

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed input, or a principal lacking a required capability
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(Conflict),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn conflict(&self) -> Option<Conflict> {
        match self {
            Error::Conflict(c) => Some(*c),
            _ => None,
        }
    }
}

impl From<Conflict> for Error {
    fn from(c: Conflict) -> Self {
        Error::Conflict(c)
    }
}

/// True when the database rejected a write because of a UNIQUE index.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
