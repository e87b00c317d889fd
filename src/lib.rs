//! Thesis revision review workflow.
//!
//! Students submit a revision, a coordinator binds one reviewer to it, and
//! the reviewer's verdict closes it. The exclusivity rules (one active
//! revision per student, nothing after an approval, one reviewer per
//! revision, one verdict per revision) are enforced by the database inside
//! each write transaction.

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod notify;
pub mod review;
pub mod routes;
pub mod state;
pub mod storage;

pub use error::{Conflict, Error, Result};
