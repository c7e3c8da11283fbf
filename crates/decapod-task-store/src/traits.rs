//! The `TaskStore` trait: every state transition in §4.2 as one CAS round
//! trip, plus the scheduler query and TTL maintenance.

use async_trait::async_trait;
use decapod_task_core::{TaskId, TaskRecord, TaskType};

use crate::error::StoreError;

/// Core trait for task document store backends.
///
/// Each transition method is the one-round-trip CAS primitive described in
/// §4.1: the caller supplies the `update_marker` it last observed, and the
/// backend composes the full predicate (`id` + that marker + "not
/// terminal" + the transition's own extra predicate) against the store in a
/// single atomic statement. A mismatch — stale marker, wrong phase, already
/// terminal — surfaces uniformly as the transition's
/// [`decapod_task_core::TransitionForbidden`] variant; the backend cannot
/// and need not distinguish those cases from one round trip.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Human-readable name of the storage backend (e.g. "in-memory").
    fn backend_name(&self) -> &'static str;

    /// Idempotently create the indexes and tables in §4.5. Safe to call on
    /// every startup.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Persist a freshly built [`TaskRecord`]. Fails with
    /// [`StoreError::UniqueConstraintViolation`] if `(execution_id,
    /// task_type)` already exists.
    async fn create(&self, record: TaskRecord) -> Result<TaskRecord, StoreError>;

    /// Fetch a task by id, bypassing any CAS guard. Used to refresh a stale
    /// in-memory view after a failed transition.
    async fn get(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError>;

    /// `bounce`: defer an unstarted, non-terminal task to `new_bounce_time`.
    async fn bounce(&self, id: TaskId, expected_marker: &str, now: i64)
    -> Result<TaskRecord, StoreError>;

    /// `start`: requires `time.started == 0` and non-terminal.
    async fn start(&self, id: TaskId, expected_marker: &str, now: i64)
    -> Result<TaskRecord, StoreError>;

    /// `complete`: requires `time.started != 0` and non-terminal.
    async fn complete(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
    ) -> Result<TaskRecord, StoreError>;

    /// `fail`: requires `time.started != 0` and non-terminal.
    async fn fail(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
        error: String,
    ) -> Result<TaskRecord, StoreError>;

    /// `cancel`: allowed from either CREATED or STARTED; only guard is
    /// non-terminal.
    async fn cancel(&self, id: TaskId, expected_marker: &str, now: i64)
    -> Result<TaskRecord, StoreError>;

    /// `set_executor_data`: requires a started, non-terminal task whose
    /// executor stamp is still unset.
    async fn set_executor_data(
        &self,
        id: TaskId,
        expected_marker: &str,
        now: i64,
        host: String,
        pid: i64,
    ) -> Result<TaskRecord, StoreError>;

    /// The scheduler query of §4.3: the single most eligible task, or
    /// `None`. Does **not** mark the task started.
    async fn next_eligible(&self, now: i64) -> Result<Option<TaskRecord>, StoreError>;

    /// Look up the task for `(execution_id, task_type)`, relying on
    /// invariant 3's uniqueness. Used by `CancelPlaybookPluginTask` to find
    /// the `PLAYBOOK` task it targets.
    async fn find_by_execution(
        &self,
        execution_id: &str,
        task_type: TaskType,
    ) -> Result<Option<TaskRecord>, StoreError>;

    /// Delete every terminal task whose `remove_at` has passed. Returns the
    /// ids removed.
    async fn expire_terminal_tasks(&self, now: i64) -> Result<Vec<TaskId>, StoreError>;

    /// Total number of tasks currently stored (terminal and non-terminal).
    async fn task_count(&self) -> Result<usize, StoreError>;

    /// Periodic maintenance: at minimum, `expire_terminal_tasks`; backends
    /// with a query planner may also refresh statistics here.
    async fn maintenance(&self, now: i64) -> Result<(), StoreError>;
}
