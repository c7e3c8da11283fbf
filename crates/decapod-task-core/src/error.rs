//! Unified error type for the task queue core.
//!
//! Mirrors the pattern used by the storage and queue crates layered on top of
//! this one: one `thiserror` enum per crate, with `#[from]` conversions at
//! the boundary rather than ad-hoc `String` errors.

use thiserror::Error;

/// A transition that the CAS predicate refused.
///
/// Each variant names the transition that was attempted; the predicate
/// itself never reports *why* it failed (stale marker vs. wrong phase vs.
/// already terminal) because the store cannot distinguish those cases in a
/// single round trip — the caller re-reads the document if it needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionForbidden {
    #[error("cannot bounce: task is started or terminal")]
    CannotBounce,
    #[error("cannot start: task already started or terminal")]
    CannotStart,
    #[error("cannot complete: task not started, or already terminal")]
    CannotComplete,
    #[error("cannot cancel: task already terminal")]
    CannotCancel,
    #[error("cannot fail: task not started, or already terminal")]
    CannotFail,
    #[error("cannot set executor data: task not started, terminal, or executor already set")]
    CannotSetExecutor,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum TaskQueueError {
    #[error(transparent)]
    TransitionForbidden(#[from] TransitionForbidden),

    #[error("duplicate task for (execution_id, task_type)")]
    UniqueConstraintViolation,

    #[error("task {0} not found")]
    NotFound(String),

    #[error("unknown task_type {0:?} encountered while decoding a task document")]
    UnknownTaskType(String),

    #[error("internal store error: {0}")]
    InternalStoreError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TaskQueueError {
    /// True for the handful of errors a caller can sensibly treat as "refresh
    /// and decide", as opposed to a hard failure of the store itself.
    pub fn is_transition_forbidden(&self) -> bool {
        matches!(self, TaskQueueError::TransitionForbidden(_))
    }
}

/// Marker trait implemented by backend-specific errors so the bounded retry
/// wrapper in [`crate::retry`] can ask "is this worth retrying" without the
/// core crate knowing about any particular driver's error type.
pub trait TransientError {
    /// Whether this error represents a transient condition (connection
    /// reset, timeout, pool exhaustion) as opposed to a deterministic
    /// rejection (constraint violation, not found) that retrying cannot fix.
    fn is_transient(&self) -> bool;
}

/// Helper used by backends translating a failed-predicate UPDATE into the
/// right `TransitionForbidden` variant for the attempted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Bounce,
    Start,
    Complete,
    Fail,
    Cancel,
    SetExecutor,
}

impl Transition {
    pub fn forbidden(self) -> TransitionForbidden {
        match self {
            Transition::Bounce => TransitionForbidden::CannotBounce,
            Transition::Start => TransitionForbidden::CannotStart,
            Transition::Complete => TransitionForbidden::CannotComplete,
            Transition::Fail => TransitionForbidden::CannotFail,
            Transition::Cancel => TransitionForbidden::CannotCancel,
            Transition::SetExecutor => TransitionForbidden::CannotSetExecutor,
        }
    }
}
