//! `CancelPlaybookPluginTask`: carries no payload beyond its `execution_id`
//! and has no subtype hooks of its own — its only extra surface is
//! `get_executing_task`, letting the worker that owns it find the
//! `PLAYBOOK` task it targets. The cancellation itself is performed by that
//! worker against the `PlaybookPluginTask` wrapper, per §4.4.

use std::sync::Arc;

use decapod_task_core::{RetryPolicy, TaskId, TaskRecord, TaskType, retry};
use decapod_task_store::TaskStore;

use crate::error::QueueError;

pub struct CancelPlaybookPluginTask<S> {
    store: Arc<S>,
    retry_policy: RetryPolicy,
}

impl<S: TaskStore + 'static> CancelPlaybookPluginTask<S> {
    pub fn new(store: Arc<S>, retry_policy: RetryPolicy) -> Self {
        CancelPlaybookPluginTask { store, retry_policy }
    }

    /// The `PLAYBOOK` task sharing this cancel task's `execution_id`, or
    /// `None` if it has already been removed by TTL expiry.
    pub async fn get_executing_task(&self, execution_id: &str) -> Result<Option<TaskRecord>, QueueError> {
        let store = self.store.clone();
        let execution_id = execution_id.to_string();
        let record = retry(&self.retry_policy, || {
            let store = store.clone();
            let execution_id = execution_id.clone();
            async move { store.find_by_execution(&execution_id, TaskType::Playbook).await }
        })
        .await?;
        Ok(record)
    }

    pub async fn start(&self, id: TaskId, expected_marker: &str, now: i64) -> Result<TaskRecord, QueueError> {
        Ok(self.store.start(id, expected_marker, now).await?)
    }

    pub async fn complete(&self, id: TaskId, expected_marker: &str, now: i64) -> Result<TaskRecord, QueueError> {
        Ok(self.store.complete(id, expected_marker, now).await?)
    }

    pub async fn fail(&self, id: TaskId, expected_marker: &str, now: i64, error: String) -> Result<TaskRecord, QueueError> {
        Ok(self.store.fail(id, expected_marker, now, error).await?)
    }

    pub async fn cancel(&self, id: TaskId, expected_marker: &str, now: i64) -> Result<TaskRecord, QueueError> {
        Ok(self.store.cancel(id, expected_marker, now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decapod_task_core::{CancelPlaybookPluginData, PlaybookPluginData, TaskData};
    use decapod_task_store::InMemoryTaskStore;

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn finds_the_playbook_task_sharing_the_execution_id() {
        let store = Arc::new(InMemoryTaskStore::new());
        let playbook = store
            .create(TaskRecord::new(
                "exec1",
                TaskData::Playbook(PlaybookPluginData {
                    playbook_id: "pb1".into(),
                    playbook_configuration_id: "cfg1".into(),
                }),
                NOW,
            ))
            .await
            .unwrap();
        store
            .create(TaskRecord::new("exec1", TaskData::Cancel(CancelPlaybookPluginData {}), NOW))
            .await
            .unwrap();

        let cancel_task = CancelPlaybookPluginTask::new(store, RetryPolicy::none());
        let found = cancel_task.get_executing_task("exec1").await.unwrap();
        assert_eq!(found.unwrap().id, playbook.id);
    }

    #[tokio::test]
    async fn returns_none_once_the_playbook_task_is_gone() {
        let store = Arc::new(InMemoryTaskStore::new());
        store
            .create(TaskRecord::new("exec1", TaskData::Cancel(CancelPlaybookPluginData {}), NOW))
            .await
            .unwrap();

        let cancel_task = CancelPlaybookPluginTask::new(store, RetryPolicy::none());
        let found = cancel_task.get_executing_task("exec1").await.unwrap();
        assert!(found.is_none());
    }
}
