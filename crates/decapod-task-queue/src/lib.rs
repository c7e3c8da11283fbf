//! Fair, bounce-aware polling scheduler and subtype lifecycle hooks.
//!
//! This crate sits on top of `decapod-task-store`: it adds the watcher
//! (§4.3), the typed configuration surface, and the three subtype wrappers
//! (§4.4) that mirror execution state and toggle server/configuration locks
//! after a base transition succeeds. It depends on `decapod-task-store` only
//! through the `TaskStore` trait, so a consumer picks a backend via that
//! crate's feature flags and hands this crate an `Arc<dyn TaskStore>` or a
//! concrete store type.

pub mod config;
pub mod error;
pub mod hooks;
pub mod tasks;
pub mod watcher;

pub use config::Config;
pub use error::{ConfigError, QueueError};
pub use hooks::{ExecutionSink, ExecutionState, PlaybookConfigurationStore, ServerLockReleaser};
pub use tasks::{CancelPlaybookPluginTask, PlaybookPluginTask, ServerDiscoveryTask};
pub use watcher::{Watcher, WatcherConfig};
