//! `PlaybookPluginTask`: the subtype whose transitions mirror execution
//! state and toggle server/configuration locks (§4.4).

use std::sync::Arc;

use decapod_task_core::{RetryPolicy, TaskData, TaskId, TaskRecord, retry};
use decapod_task_store::TaskStore;

use crate::error::QueueError;
use crate::hooks::{ExecutionSink, ExecutionState, PlaybookConfigurationStore, ServerLockReleaser};

/// Wraps a [`TaskStore`] with the execution-mirroring and lock-toggling
/// side-effects `PlaybookPluginTask` performs after each base transition.
///
/// Generic over the three foreign collaborator traits so the task-queue
/// crate never names a concrete execution, fleet, or playbook-configuration
/// type — a caller supplies its own implementations (or, in tests, the
/// fakes in [`crate::hooks::testing`]).
pub struct PlaybookPluginTask<S, X, L, C> {
    store: Arc<S>,
    retry_policy: RetryPolicy,
    executions: Arc<X>,
    locks: Arc<L>,
    configurations: Arc<C>,
}

fn playbook_configuration_id(record: &TaskRecord) -> Option<&str> {
    match &record.data {
        TaskData::Playbook(data) => Some(data.playbook_configuration_id.as_str()),
        _ => None,
    }
}

impl<S, X, L, C> PlaybookPluginTask<S, X, L, C>
where
    S: TaskStore + 'static,
    X: ExecutionSink + 'static,
    L: ServerLockReleaser + 'static,
    C: PlaybookConfigurationStore + 'static,
{
    pub fn new(store: Arc<S>, retry_policy: RetryPolicy, executions: Arc<X>, locks: Arc<L>, configurations: Arc<C>) -> Self {
        PlaybookPluginTask {
            store,
            retry_policy,
            executions,
            locks,
            configurations,
        }
    }

    /// `start` → execution state `STARTED`; lock the named configuration.
    pub async fn start(&self, id: TaskId, expected_marker: &str, now: i64) -> Result<TaskRecord, QueueError> {
        let store = self.store.clone();
        let marker = expected_marker.to_string();
        let record = retry(&self.retry_policy, || {
            let store = store.clone();
            let marker = marker.clone();
            async move { store.start(id, &marker, now).await }
        })
        .await?;

        self.executions
            .set_state(&record.execution_id, ExecutionState::Started)
            .await
            .map_err(|e| hook_failed("set_state(Started)", id, e))?;
        self.lock_configuration(id, &record).await?;

        Ok(record)
    }

    /// `complete` → execution state `COMPLETED`; release server locks;
    /// clear `locked` across every configuration sharing the same
    /// `model_id`.
    pub async fn complete(&self, id: TaskId, expected_marker: &str, now: i64) -> Result<TaskRecord, QueueError> {
        let store = self.store.clone();
        let marker = expected_marker.to_string();
        let record = retry(&self.retry_policy, || {
            let store = store.clone();
            let marker = marker.clone();
            async move { store.complete(id, &marker, now).await }
        })
        .await?;

        self.executions
            .set_state(&record.execution_id, ExecutionState::Completed)
            .await
            .map_err(|e| hook_failed("set_state(Completed)", id, e))?;

        self.release_servers(id, &record.execution_id).await?;

        if let Some(configuration_id) = playbook_configuration_id(&record) {
            let model_id = self
                .configurations
                .model_id_of(configuration_id)
                .await
                .map_err(|e| hook_failed("model_id_of", id, e))?;
            self.configurations
                .unlock_all_for_model(&model_id)
                .await
                .map_err(|e| hook_failed("unlock_all_for_model", id, e))?;
        }

        Ok(record)
    }

    /// `cancel` → execution state `CANCELED`; release server locks; the
    /// configuration is (re-)locked since its outcome is indeterminate — a
    /// task cancelled straight from `CREATED` never ran `start`'s `lock`
    /// call, so this must lock unconditionally rather than assume it already
    /// happened.
    pub async fn cancel(&self, id: TaskId, expected_marker: &str, now: i64) -> Result<TaskRecord, QueueError> {
        let store = self.store.clone();
        let marker = expected_marker.to_string();
        let record = retry(&self.retry_policy, || {
            let store = store.clone();
            let marker = marker.clone();
            async move { store.cancel(id, &marker, now).await }
        })
        .await?;

        self.executions
            .set_state(&record.execution_id, ExecutionState::Canceled)
            .await
            .map_err(|e| hook_failed("set_state(Canceled)", id, e))?;
        self.release_servers(id, &record.execution_id).await?;
        self.lock_configuration(id, &record).await?;

        Ok(record)
    }

    /// `fail` → execution state `FAILED`; release server locks; the
    /// configuration is (re-)locked for the same reason as `cancel`.
    pub async fn fail(&self, id: TaskId, expected_marker: &str, now: i64, error: String) -> Result<TaskRecord, QueueError> {
        let store = self.store.clone();
        let marker = expected_marker.to_string();
        let record = retry(&self.retry_policy, || {
            let store = store.clone();
            let marker = marker.clone();
            let error = error.clone();
            async move { store.fail(id, &marker, now, error).await }
        })
        .await?;

        self.executions
            .set_state(&record.execution_id, ExecutionState::Failed)
            .await
            .map_err(|e| hook_failed("set_state(Failed)", id, e))?;
        self.release_servers(id, &record.execution_id).await?;
        self.lock_configuration(id, &record).await?;

        Ok(record)
    }

    async fn lock_configuration(&self, id: TaskId, record: &TaskRecord) -> Result<(), QueueError> {
        if let Some(configuration_id) = playbook_configuration_id(record) {
            self.configurations
                .lock(configuration_id)
                .await
                .map_err(|e| hook_failed("lock(configuration)", id, e))?;
        }
        Ok(())
    }

    async fn release_servers(&self, id: TaskId, execution_id: &str) -> Result<(), QueueError> {
        let servers = self
            .executions
            .servers(execution_id)
            .await
            .map_err(|e| hook_failed("servers", id, e))?;
        self.locks
            .unlock_servers(&servers)
            .await
            .map_err(|e| hook_failed("unlock_servers", id, e))?;
        Ok(())
    }
}

fn hook_failed(hook: &'static str, task_id: TaskId, source: impl std::error::Error + Send + Sync + 'static) -> QueueError {
    tracing::error!(%task_id, hook, error = %source, "subtype hook failed; base transition already committed");
    QueueError::HookFailed {
        hook,
        task_id: task_id.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decapod_task_core::{PlaybookPluginData, RetryPolicy};
    use decapod_task_store::InMemoryTaskStore;

    use crate::hooks::testing::{FakeExecutionSink, FakePlaybookConfigurationStore, FakeServerLockReleaser};

    const NOW: i64 = 1_700_000_000;

    fn playbook_record(execution_id: &str) -> TaskRecord {
        TaskRecord::new(
            execution_id,
            TaskData::Playbook(PlaybookPluginData {
                playbook_id: "pb1".into(),
                playbook_configuration_id: "cfg1".into(),
            }),
            NOW,
        )
    }

    fn harness() -> (
        Arc<InMemoryTaskStore>,
        Arc<FakeExecutionSink>,
        Arc<FakeServerLockReleaser>,
        Arc<FakePlaybookConfigurationStore>,
    ) {
        (
            Arc::new(InMemoryTaskStore::new()),
            Arc::new(FakeExecutionSink::new().with_servers("exec1", vec!["srv1".into(), "srv2".into()])),
            Arc::new(FakeServerLockReleaser::new(["srv1".to_string(), "srv2".to_string()])),
            Arc::new(FakePlaybookConfigurationStore::new().with_configuration("cfg1", "model1", false)),
        )
    }

    #[tokio::test]
    async fn start_mirrors_state_and_locks_configuration() {
        let (store, executions, locks, configurations) = harness();
        let created = store.create(playbook_record("exec1")).await.unwrap();
        let task = PlaybookPluginTask::new(store, RetryPolicy::none(), executions.clone(), locks, configurations.clone());

        task.start(created.id, &created.update_marker, NOW).await.unwrap();

        assert_eq!(executions.state_of("exec1"), Some(ExecutionState::Started));
        assert!(configurations.is_locked("cfg1"));
    }

    #[tokio::test]
    async fn complete_releases_servers_and_clears_every_configuration_sharing_the_model() {
        let (store, executions, locks, configurations) = harness();
        configurations.with_configuration("cfg2", "model1", true);

        let created = store.create(playbook_record("exec1")).await.unwrap();
        let task = PlaybookPluginTask::new(store, RetryPolicy::none(), executions.clone(), locks.clone(), configurations.clone());

        let started = task.start(created.id, &created.update_marker, NOW).await.unwrap();
        task.complete(started.id, &started.update_marker, NOW).await.unwrap();

        assert_eq!(executions.state_of("exec1"), Some(ExecutionState::Completed));
        assert!(!locks.is_locked("srv1"));
        assert!(!locks.is_locked("srv2"));
        assert!(!configurations.is_locked("cfg1"));
        assert!(!configurations.is_locked("cfg2"));
    }

    #[tokio::test]
    async fn cancel_releases_servers_but_leaves_the_configuration_locked() {
        let (store, executions, locks, configurations) = harness();
        let created = store.create(playbook_record("exec1")).await.unwrap();
        let task = PlaybookPluginTask::new(store, RetryPolicy::none(), executions.clone(), locks.clone(), configurations.clone());

        let started = task.start(created.id, &created.update_marker, NOW).await.unwrap();
        task.cancel(started.id, &started.update_marker, NOW).await.unwrap();

        assert_eq!(executions.state_of("exec1"), Some(ExecutionState::Canceled));
        assert!(!locks.is_locked("srv1"));
        assert!(configurations.is_locked("cfg1"));
    }

    #[tokio::test]
    async fn cancel_before_start_still_locks_the_configuration() {
        let (store, executions, locks, configurations) = harness();
        let created = store.create(playbook_record("exec1")).await.unwrap();
        let task = PlaybookPluginTask::new(store, RetryPolicy::none(), executions.clone(), locks, configurations.clone());

        // Cancelled straight from CREATED: `start` never ran, so `lock` was
        // never called by it — `cancel` must lock unconditionally.
        assert!(!configurations.is_locked("cfg1"));
        task.cancel(created.id, &created.update_marker, NOW).await.unwrap();

        assert_eq!(executions.state_of("exec1"), Some(ExecutionState::Canceled));
        assert!(configurations.is_locked("cfg1"));
    }

    #[tokio::test]
    async fn fail_releases_servers_but_leaves_the_configuration_locked() {
        let (store, executions, locks, configurations) = harness();
        let created = store.create(playbook_record("exec1")).await.unwrap();
        let task = PlaybookPluginTask::new(store, RetryPolicy::none(), executions.clone(), locks.clone(), configurations.clone());

        let started = task.start(created.id, &created.update_marker, NOW).await.unwrap();
        task.fail(started.id, &started.update_marker, NOW, "boom".into())
            .await
            .unwrap();

        assert_eq!(executions.state_of("exec1"), Some(ExecutionState::Failed));
        assert!(!locks.is_locked("srv2"));
        assert!(configurations.is_locked("cfg1"));
    }
}
