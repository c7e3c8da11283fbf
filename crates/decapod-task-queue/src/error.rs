//! Crate-wide error type for the task queue: the store's own error plus the
//! configuration and subtype-hook failures that only exist at this layer.

use decapod_task_core::{TaskQueueError as CoreError, TransitionForbidden};
use decapod_task_store::StoreError;
use thiserror::Error;

/// Failure loading or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {0}: {1}")]
    File(String, String),

    #[error("invalid TOML: {0}")]
    Toml(String),

    #[error("invalid value for TASKQ_{0}: {1:?}")]
    Env(String, String),
}

/// Crate-wide error for the watcher, subtype hooks, and configuration
/// layered on top of `decapod-task-store`.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A subtype side-effect (execution mirroring, server-lock release,
    /// configuration-lock toggling) failed. Per §7, this does not roll back
    /// the base transition — the caller logs it and lets the idempotent
    /// retry-on-next-transition design catch up.
    #[error("subtype hook {hook} failed for task {task_id}: {source}")]
    HookFailed {
        hook: &'static str,
        task_id: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl QueueError {
    pub fn is_transition_forbidden(&self) -> bool {
        matches!(self, QueueError::Store(StoreError::TransitionForbidden(_)))
    }

    pub fn transition_forbidden(&self) -> Option<TransitionForbidden> {
        match self {
            QueueError::Store(StoreError::TransitionForbidden(t)) => Some(*t),
            _ => None,
        }
    }
}

/// Convenience conversion so code that already produces the core crate's
/// error enum (e.g. a CAS predicate check run locally before a store round
/// trip) composes with [`QueueError`] via `?`.
impl From<CoreError> for QueueError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TransitionForbidden(t) => QueueError::Store(StoreError::TransitionForbidden(t)),
            other => QueueError::Store(StoreError::Database(other.to_string())),
        }
    }
}
