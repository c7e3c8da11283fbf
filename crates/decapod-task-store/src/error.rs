//! Unified error type for task store backends.
//!
//! Mirrors the pattern used by `decapod-task-core`: one `thiserror` enum,
//! `#[from]` conversions at the boundary, and a `TransientError` impl so the
//! core crate's bounded retry wrapper can decide whether to retry without
//! knowing anything about a particular driver.

use decapod_task_core::{TaskId, TransientError, TransitionForbidden};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error(transparent)]
    TransitionForbidden(#[from] TransitionForbidden),

    #[error("duplicate task for (execution_id, task_type)")]
    UniqueConstraintViolation,

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TransientError for StoreError {
    fn is_transient(&self) -> bool {
        // Only an opaque driver-level failure is worth retrying; every other
        // variant is a deterministic rejection that a retry cannot fix.
        matches!(self, StoreError::Database(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueConstraintViolation;
            }
        }
        StoreError::Database(err.to_string())
    }
}
