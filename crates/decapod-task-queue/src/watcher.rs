//! The fair, bounce-aware polling scheduler.
//!
//! A [`Watcher`] is a lazy, one-item-at-a-time producer — the same
//! `async_stream`-driven idiom this lineage uses elsewhere for long-running,
//! cancellable operations (an SSE connection is the closest cousin: replay
//! what's there, then block on either new input or a cooperative stop
//! signal). It never marks a task started; the consumer calls `start` on the
//! yielded record, and the loser of a race re-enters the loop.

use std::sync::Arc;
use std::time::Duration;

use decapod_task_core::{Clock, RetryPolicy, TaskRecord, retry};
use decapod_task_store::{StoreError, TaskStore};
use tokio_util::sync::CancellationToken;

/// Configuration for a single watcher instance.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Terminate the sequence the first time a poll finds nothing eligible,
    /// instead of continuing to poll forever. Useful for batch-style
    /// "drain the queue" consumers and for tests.
    pub exit_on_empty: bool,
    /// How long to idle between polls once a cycle completes within the
    /// same clock second (§4.3 step 5).
    pub idle_wait: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        WatcherConfig {
            exit_on_empty: false,
            idle_wait: Duration::from_secs(1),
        }
    }
}

/// Producer of the next eligible [`TaskRecord`], in the fairness order of
/// §4.3: most-bounced first, then earliest scheduled bounce, then FIFO by
/// creation.
pub struct Watcher<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
    config: WatcherConfig,
}

impl<S: TaskStore + 'static> Watcher<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, retry_policy: RetryPolicy) -> Self {
        Watcher {
            store,
            clock,
            retry_policy,
            config: WatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the poll loop, emitting eligible tasks on an internal
    /// capacity-one channel until `stop` is cancelled, a non-transient store
    /// error aborts the sequence, or (with `exit_on_empty`) a poll finds
    /// nothing.
    ///
    /// Returns a `futures::Stream` so a consumer can `.next().await` it like
    /// any other async sequence; internally it's backed by an `async_stream`
    /// generator, the OS-thread-model equivalent of a language-level lazy
    /// sequence called out in the design notes.
    pub fn run(self, stop: CancellationToken) -> impl futures::Stream<Item = Result<TaskRecord, StoreError>> {
        let Watcher {
            store,
            clock,
            retry_policy,
            config,
        } = self;

        async_stream::stream! {
            loop {
                if stop.is_cancelled() {
                    tracing::debug!("watcher stopping: cancellation observed before poll");
                    break;
                }

                let fetched_at = clock.now();
                let store = store.clone();
                let poll = retry(&retry_policy, || {
                    let store = store.clone();
                    async move { store.next_eligible(fetched_at).await }
                })
                .await;

                match poll {
                    Ok(Some(task)) => {
                        if stop.is_cancelled() {
                            tracing::debug!("watcher stopping: cancellation observed after poll, discarding result");
                            break;
                        }
                        tracing::info!(task_id = %task.id, task_type = ?task.task_type(), "watcher yielding task");
                        yield Ok(task);
                    }
                    Ok(None) => {
                        tracing::debug!(fetched_at, "watcher poll found nothing eligible");
                        if config.exit_on_empty {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "watcher aborting: non-transient store error");
                        yield Err(err);
                        break;
                    }
                }

                if clock.now() == fetched_at {
                    tokio::select! {
                        _ = stop.cancelled() => {
                            tracing::debug!("watcher stopping: cancellation observed during idle wait");
                            break;
                        }
                        _ = tokio::time::sleep(config.idle_wait) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use decapod_task_core::{FixedClock, ServerDiscoveryData, TaskData};
    use decapod_task_store::InMemoryTaskStore;
    use futures::StreamExt;

    fn discovery_record(execution_id: &str, now: i64) -> TaskRecord {
        TaskRecord::new(
            execution_id,
            TaskData::ServerDiscovery(ServerDiscoveryData {
                id: "srv1".into(),
                host: "10.0.0.1".into(),
                username: "admin".into(),
            }),
            now,
        )
    }

    #[tokio::test]
    async fn yields_nothing_and_exits_when_queue_is_empty_and_exit_on_empty() {
        let store = Arc::new(InMemoryTaskStore::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1_700_000_000));
        let watcher = Watcher::new(store, clock, RetryPolicy::none())
            .with_config(WatcherConfig { exit_on_empty: true, idle_wait: Duration::from_millis(1) });

        let stop = CancellationToken::new();
        let results: Vec<_> = watcher.run(stop).collect().await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn yields_eligible_tasks_in_fairness_order() {
        let store = Arc::new(InMemoryTaskStore::new());
        let now = 1_700_000_000;

        let a = store.create(discovery_record("a", now)).await.unwrap();
        let b = store.create(discovery_record("b", now)).await.unwrap();

        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let watcher = Watcher::new(store.clone(), clock, RetryPolicy::none())
            .with_config(WatcherConfig { exit_on_empty: true, idle_wait: Duration::from_millis(1) });

        let stop = CancellationToken::new();
        let first = watcher.run(stop).next().await.unwrap().unwrap();
        // Both are equally eligible (FIFO); the first creation wins.
        assert_eq!(first.id, a.id);

        // Start `a` so only `b` remains eligible for a second pass.
        store.start(a.id, &a.update_marker, now).await.unwrap();
        let clock2: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let watcher2 = Watcher::new(store, clock2, RetryPolicy::none())
            .with_config(WatcherConfig { exit_on_empty: true, idle_wait: Duration::from_millis(1) });
        let stop2 = CancellationToken::new();
        let second = watcher2.run(stop2).next().await.unwrap().unwrap();
        assert_eq!(second.id, b.id);
    }

    #[tokio::test]
    async fn cancellation_stops_the_sequence_without_yielding_further() {
        let store = Arc::new(InMemoryTaskStore::new());
        let now = 1_700_000_000;
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let watcher = Watcher::new(store, clock, RetryPolicy::none());

        let stop = CancellationToken::new();
        stop.cancel();
        let results: Vec<_> = watcher.run(stop).collect().await;
        assert!(results.is_empty());
    }

    /// Wraps a store and cancels a token the instant `next_eligible`
    /// resolves, simulating a stop signal arriving while that await point
    /// was in flight.
    struct CancelDuringPoll {
        inner: InMemoryTaskStore,
        stop: CancellationToken,
    }

    #[async_trait::async_trait]
    impl TaskStore for CancelDuringPoll {
        fn backend_name(&self) -> &'static str {
            self.inner.backend_name()
        }
        async fn ensure_schema(&self) -> Result<(), StoreError> {
            self.inner.ensure_schema().await
        }
        async fn create(&self, record: TaskRecord) -> Result<TaskRecord, StoreError> {
            self.inner.create(record).await
        }
        async fn get(&self, id: decapod_task_core::TaskId) -> Result<Option<TaskRecord>, StoreError> {
            self.inner.get(id).await
        }
        async fn bounce(&self, id: decapod_task_core::TaskId, marker: &str, now: i64) -> Result<TaskRecord, StoreError> {
            self.inner.bounce(id, marker, now).await
        }
        async fn start(&self, id: decapod_task_core::TaskId, marker: &str, now: i64) -> Result<TaskRecord, StoreError> {
            self.inner.start(id, marker, now).await
        }
        async fn complete(&self, id: decapod_task_core::TaskId, marker: &str, now: i64) -> Result<TaskRecord, StoreError> {
            self.inner.complete(id, marker, now).await
        }
        async fn fail(&self, id: decapod_task_core::TaskId, marker: &str, now: i64, error: String) -> Result<TaskRecord, StoreError> {
            self.inner.fail(id, marker, now, error).await
        }
        async fn cancel(&self, id: decapod_task_core::TaskId, marker: &str, now: i64) -> Result<TaskRecord, StoreError> {
            self.inner.cancel(id, marker, now).await
        }
        async fn set_executor_data(
            &self,
            id: decapod_task_core::TaskId,
            marker: &str,
            now: i64,
            host: String,
            pid: i64,
        ) -> Result<TaskRecord, StoreError> {
            self.inner.set_executor_data(id, marker, now, host, pid).await
        }
        async fn next_eligible(&self, now: i64) -> Result<Option<TaskRecord>, StoreError> {
            let result = self.inner.next_eligible(now).await;
            // The stop signal arrives "while the find was in flight" from
            // the watcher's point of view.
            self.stop.cancel();
            result
        }
        async fn find_by_execution(
            &self,
            execution_id: &str,
            task_type: decapod_task_core::TaskType,
        ) -> Result<Option<TaskRecord>, StoreError> {
            self.inner.find_by_execution(execution_id, task_type).await
        }
        async fn expire_terminal_tasks(&self, now: i64) -> Result<Vec<decapod_task_core::TaskId>, StoreError> {
            self.inner.expire_terminal_tasks(now).await
        }
        async fn task_count(&self) -> Result<usize, StoreError> {
            self.inner.task_count().await
        }
        async fn maintenance(&self, now: i64) -> Result<(), StoreError> {
            self.inner.maintenance(now).await
        }
    }

    #[tokio::test]
    async fn cancellation_observed_between_poll_and_yield_discards_the_result() {
        let now = 1_700_000_000;
        let inner = InMemoryTaskStore::new();
        inner.create(discovery_record("a", now)).await.unwrap();

        let stop = CancellationToken::new();
        let store = Arc::new(CancelDuringPoll { inner, stop: stop.clone() });
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(now));
        let watcher = Watcher::new(store, clock, RetryPolicy::none())
            .with_config(WatcherConfig { exit_on_empty: true, idle_wait: Duration::from_millis(1) });

        // The token starts uncancelled; `CancelDuringPoll::next_eligible`
        // cancels it only once the eligible task has already been fetched,
        // so the watcher must re-check after the poll and before yielding.
        let results: Vec<_> = watcher.run(stop).collect().await;
        assert!(results.is_empty(), "a task fetched after cancellation must not be yielded");
    }
}
