//! Pluggable CAS-backed document storage for decapod tasks.
//!
//! This crate knows how to persist a [`decapod_task_core::TaskRecord`] and how
//! to run the CAS transitions of the state machine as a single atomic round
//! trip against a particular backend. It does not know about the task
//! lifecycle's side-effects on executions, server locks, or playbook
//! configurations — that lives one layer up, in `decapod-task-queue`.
//!
//! Two backends are provided behind feature flags:
//!
//! - `in-memory` (default): a `HashMap` behind a `parking_lot::RwLock`, for
//!   tests and single-process development.
//! - `postgres`: the reference durable backend, via `sqlx`. The CAS predicate
//!   is realized as a single `UPDATE ... WHERE ... RETURNING *` statement.
//!
//! Both implement the same [`TaskStore`] trait so the state machine and
//! watcher in `decapod-task-queue` never know which backend they're talking
//! to.

pub mod error;
#[cfg(feature = "in-memory")]
pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod traits;

pub use error::StoreError;
#[cfg(feature = "in-memory")]
pub use in_memory::{InMemoryStoreConfig, InMemoryTaskStore};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresStoreConfig, PostgresTaskStore};
pub use traits::TaskStore;

/// Create a default in-memory task store for development and testing.
#[cfg(feature = "in-memory")]
pub fn create_default_store() -> InMemoryTaskStore {
    InMemoryTaskStore::new()
}
