//! In-memory task store backend.
//!
//! Suitable for development, testing, and the scenario suite in §8. Tasks
//! are stored in a `HashMap` behind a `parking_lot::RwLock` — every method
//! below takes the lock, mutates or reads, and releases it without ever
//! holding it across an `.await`, so a synchronous lock is the right tool
//! even though the trait methods are `async`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use decapod_task_core::{TaskId, TaskRecord, TaskType, new_bounce_time, new_update_marker, state_machine};
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::traits::TaskStore;

/// Configuration for the in-memory backend.
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// `cron.clean_finished_tasks_after_seconds` — how far in the future
    /// `remove_at` is stamped on a terminal transition.
    pub ttl_seconds: i64,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        InMemoryStoreConfig { ttl_seconds: 86_400 }
    }
}

/// In-memory, process-local task store.
#[derive(Clone)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<TaskId, TaskRecord>>>,
    config: InMemoryStoreConfig,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        InMemoryTaskStore {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    fn duplicate_execution(
        tasks: &HashMap<TaskId, TaskRecord>,
        execution_id: &str,
        task_type: TaskType,
    ) -> bool {
        tasks
            .values()
            .any(|t| t.execution_id == execution_id && t.task_type() == task_type)
    }

    /// Shared guard for every CAS-style update: locate the record, check
    /// the marker, run `check`, apply `mutate`, rotate the marker, bump
    /// `time.updated`. Returns the post-image on success.
    ///
    /// `transition` names the attempted transition so a stale marker — which
    /// is indistinguishable, from one round trip, from any other failed
    /// predicate — reports the same transition-specific error as the
    /// predicate failure itself, per the CAS contract in §4.1.
    fn cas<F, G>(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
        transition: decapod_task_core::Transition,
        check: F,
        mutate: G,
    ) -> Result<TaskRecord, StoreError>
    where
        F: FnOnce(&TaskRecord) -> Result<(), decapod_task_core::TransitionForbidden>,
        G: FnOnce(&mut TaskRecord, i64),
    {
        let mut tasks = self.tasks.write();
        let record = tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.update_marker != expected_marker {
            return Err(transition.forbidden().into());
        }
        check(record)?;
        mutate(record, now);
        record.update_marker = new_update_marker();
        record.time.updated = now;
        Ok(record.clone())
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create(&self, record: TaskRecord) -> Result<TaskRecord, StoreError> {
        let mut tasks = self.tasks.write();
        if Self::duplicate_execution(&tasks, &record.execution_id, record.task_type()) {
            return Err(StoreError::UniqueConstraintViolation);
        }
        tasks.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self.tasks.read().get(&id).cloned())
    }

    async fn bounce(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError> {
        self.cas(
            id,
            expected_marker,
            now,
            decapod_task_core::Transition::Bounce,
            state_machine::check_bounce,
            |record, now| {
                record.bounced += 1;
                record.time.bounced = new_bounce_time(now, record.bounced - 1);
            },
        )
    }

    async fn start(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError> {
        self.cas(
            id,
            expected_marker,
            now,
            decapod_task_core::Transition::Start,
            state_machine::check_start,
            |record, now| {
                record.time.started = now;
            },
        )
    }

    async fn complete(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError> {
        let ttl = self.config.ttl_seconds;
        self.cas(
            id,
            expected_marker,
            now,
            decapod_task_core::Transition::Complete,
            state_machine::check_complete,
            move |record, now| {
                record.time.completed = now;
                record.remove_at = now + ttl;
            },
        )
    }

    async fn fail(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
        error: String,
    ) -> Result<TaskRecord, StoreError> {
        let ttl = self.config.ttl_seconds;
        self.cas(id, expected_marker, now, decapod_task_core::Transition::Fail, state_machine::check_fail, move |record, now| {
            record.time.failed = now;
            record.error = Some(error);
            record.remove_at = now + ttl;
        })
    }

    async fn cancel(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError> {
        let ttl = self.config.ttl_seconds;
        self.cas(id, expected_marker, now, decapod_task_core::Transition::Cancel, state_machine::check_cancel, move |record, now| {
            record.time.cancelled = now;
            record.remove_at = now + ttl;
        })
    }

    async fn set_executor_data(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
        host: String,
        pid: i64,
    ) -> Result<TaskRecord, StoreError> {
        self.cas(
            id,
            expected_marker,
            now,
            decapod_task_core::Transition::SetExecutor,
            state_machine::check_set_executor,
            move |record, _now| {
                record.executor.host = host;
                record.executor.pid = pid;
            },
        )
    }

    async fn next_eligible(&self, now: i64) -> Result<Option<TaskRecord>, StoreError> {
        let tasks = self.tasks.read();
        let mut candidates: Vec<&TaskRecord> = tasks
            .values()
            .filter(|t| t.time.is_eligible(now))
            .collect();
        candidates.sort_by(|a, b| {
            b.bounced
                .cmp(&a.bounced)
                .then(a.time.bounced.cmp(&b.time.bounced))
                .then(a.time.created.cmp(&b.time.created))
        });
        Ok(candidates.into_iter().next().cloned())
    }

    async fn find_by_execution(
        &self,
        execution_id: &str,
        task_type: TaskType,
    ) -> Result<Option<TaskRecord>, StoreError> {
        Ok(self
            .tasks
            .read()
            .values()
            .find(|t| t.execution_id == execution_id && t.task_type() == task_type)
            .cloned())
    }

    async fn expire_terminal_tasks(&self, now: i64) -> Result<Vec<TaskId>, StoreError> {
        let mut tasks = self.tasks.write();
        let expired: Vec<TaskId> = tasks
            .values()
            .filter(|t| t.remove_at != 0 && t.remove_at <= now)
            .map(|t| t.id)
            .collect();
        for id in &expired {
            tasks.remove(id);
        }
        Ok(expired)
    }

    async fn task_count(&self) -> Result<usize, StoreError> {
        Ok(self.tasks.read().len())
    }

    async fn maintenance(&self, now: i64) -> Result<(), StoreError> {
        self.expire_terminal_tasks(now).await?;
        Ok(())
    }
}
