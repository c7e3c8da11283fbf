//! `ServerDiscoveryTask`: no extra hooks beyond the base transitions (§4.4).
//! The wrapper exists purely so callers address every subtype through the
//! same shape; it adds nothing over `TaskStore` itself.

use std::sync::Arc;

use decapod_task_core::TaskId;
use decapod_task_core::TaskRecord;
use decapod_task_store::TaskStore;

use crate::error::QueueError;

pub struct ServerDiscoveryTask<S> {
    store: Arc<S>,
}

impl<S: TaskStore + 'static> ServerDiscoveryTask<S> {
    pub fn new(store: Arc<S>) -> Self {
        ServerDiscoveryTask { store }
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
    use decapod_task_core::{ServerDiscoveryData, TaskData};
    use decapod_task_store::InMemoryTaskStore;

    const NOW: i64 = 1_700_000_000;

    #[tokio::test]
    async fn start_then_complete_round_trips_through_the_base_store() {
        let store = Arc::new(InMemoryTaskStore::new());
        let created = store
            .create(TaskRecord::new(
                "exec1",
                TaskData::ServerDiscovery(ServerDiscoveryData {
                    id: "srv1".into(),
                    host: "10.0.0.1".into(),
                    username: "admin".into(),
                }),
                NOW,
            ))
            .await
            .unwrap();

        let task = ServerDiscoveryTask::new(store);
        let started = task.start(created.id, &created.update_marker, NOW).await.unwrap();
        let completed = task.complete(started.id, &started.update_marker, NOW).await.unwrap();
        assert_eq!(completed.time.completed, NOW);
    }
}
