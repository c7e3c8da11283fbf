//! Foreign collaborator traits consumed by the subtype lifecycle hooks.
//!
//! The task-queue crate never depends on the concrete execution, fleet, or
//! playbook-configuration models — a caller supplies implementations of
//! these three traits (or, for tests, the fakes in [`testing`]). This keeps
//! the dependency one-way: subtype hooks call out to execution/server/config
//! interfaces, never the reverse.

use async_trait::async_trait;

/// Mirror of an execution's lifecycle state, kept in sync with the owning
/// task's transitions by the `PlaybookPluginTask` hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Created,
    Started,
    Completed,
    Canceled,
    Failed,
}

/// The execution a `PlaybookPluginTask` or `CancelPlaybookPluginTask` is one
/// unit of work within.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Set the execution's mirrored lifecycle state.
    async fn set_state(&self, execution_id: &str, state: ExecutionState) -> Result<(), Self::Error>;

    /// The server ids referenced by this execution, for lock release.
    async fn servers(&self, execution_id: &str) -> Result<Vec<String>, Self::Error>;
}

/// Idempotent release of server locks held for the duration of a playbook
/// run.
#[async_trait]
pub trait ServerLockReleaser: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Release locks on the given servers. A no-op for servers that are
    /// already unlocked.
    async fn unlock_servers(&self, server_ids: &[String]) -> Result<(), Self::Error>;
}

/// Get/set the `locked` flag on playbook configuration documents.
#[async_trait]
pub trait PlaybookConfigurationStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lock the named configuration (`start`).
    async fn lock(&self, configuration_id: &str) -> Result<(), Self::Error>;

    /// Clear `locked` on every configuration sharing `model_id`
    /// (`complete`).
    async fn unlock_all_for_model(&self, model_id: &str) -> Result<(), Self::Error>;

    /// The `model_id` a configuration belongs to, needed to fan the
    /// `complete` unlock out across sibling configurations.
    async fn model_id_of(&self, configuration_id: &str) -> Result<String, Self::Error>;
}

/// In-memory fakes recording every call, for the subtype-hook scenario
/// tests.
#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::sync::Arc;

    /// Records `set_state` calls and answers `servers` from a fixed map
    /// installed by the test.
    #[derive(Clone, Default)]
    pub struct FakeExecutionSink {
        pub states: Arc<Mutex<HashMap<String, ExecutionState>>>,
        pub servers_by_execution: Arc<Mutex<HashMap<String, Vec<String>>>>,
    }

    impl FakeExecutionSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_servers(self, execution_id: &str, servers: Vec<String>) -> Self {
            self.servers_by_execution
                .lock()
                .insert(execution_id.to_string(), servers);
            self
        }

        pub fn state_of(&self, execution_id: &str) -> Option<ExecutionState> {
            self.states.lock().get(execution_id).copied()
        }
    }

    #[async_trait]
    impl ExecutionSink for FakeExecutionSink {
        type Error = Infallible;

        async fn set_state(&self, execution_id: &str, state: ExecutionState) -> Result<(), Self::Error> {
            self.states.lock().insert(execution_id.to_string(), state);
            Ok(())
        }

        async fn servers(&self, execution_id: &str) -> Result<Vec<String>, Self::Error> {
            Ok(self
                .servers_by_execution
                .lock()
                .get(execution_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    /// Tracks the set of currently locked servers; `unlock_servers` is a
    /// genuine no-op for servers not in the set, matching the idempotence
    /// property in §8.
    #[derive(Clone, Default)]
    pub struct FakeServerLockReleaser {
        pub locked: Arc<Mutex<std::collections::HashSet<String>>>,
        pub unlock_calls: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl FakeServerLockReleaser {
        pub fn new(initially_locked: impl IntoIterator<Item = String>) -> Self {
            FakeServerLockReleaser {
                locked: Arc::new(Mutex::new(initially_locked.into_iter().collect())),
                unlock_calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn is_locked(&self, server_id: &str) -> bool {
            self.locked.lock().contains(server_id)
        }
    }

    #[async_trait]
    impl ServerLockReleaser for FakeServerLockReleaser {
        type Error = Infallible;

        async fn unlock_servers(&self, server_ids: &[String]) -> Result<(), Self::Error> {
            self.unlock_calls.lock().push(server_ids.to_vec());
            let mut locked = self.locked.lock();
            for id in server_ids {
                locked.remove(id);
            }
            Ok(())
        }
    }

    /// Keeps `{configuration_id -> (model_id, locked)}` in memory.
    #[derive(Clone, Default)]
    pub struct FakePlaybookConfigurationStore {
        pub configurations: Arc<Mutex<HashMap<String, (String, bool)>>>,
    }

    impl FakePlaybookConfigurationStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_configuration(self, configuration_id: &str, model_id: &str, locked: bool) -> Self {
            self.configurations
                .lock()
                .insert(configuration_id.to_string(), (model_id.to_string(), locked));
            self
        }

        pub fn is_locked(&self, configuration_id: &str) -> bool {
            self.configurations
                .lock()
                .get(configuration_id)
                .map(|(_, locked)| *locked)
                .unwrap_or(false)
        }
    }

    #[async_trait]
    impl PlaybookConfigurationStore for FakePlaybookConfigurationStore {
        type Error = Infallible;

        async fn lock(&self, configuration_id: &str) -> Result<(), Self::Error> {
            let mut configs = self.configurations.lock();
            configs
                .entry(configuration_id.to_string())
                .or_insert_with(|| ("unknown-model".to_string(), false))
                .1 = true;
            Ok(())
        }

        async fn unlock_all_for_model(&self, model_id: &str) -> Result<(), Self::Error> {
            let mut configs = self.configurations.lock();
            for (m, locked) in configs.values_mut() {
                if m == model_id {
                    *locked = false;
                }
            }
            Ok(())
        }

        async fn model_id_of(&self, configuration_id: &str) -> Result<String, Self::Error> {
            Ok(self
                .configurations
                .lock()
                .get(configuration_id)
                .map(|(m, _)| m.clone())
                .unwrap_or_else(|| "unknown-model".to_string()))
        }
    }
}
