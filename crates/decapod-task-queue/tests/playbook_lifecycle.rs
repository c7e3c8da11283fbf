//! End-to-end scenario: the watcher yields a freshly created
//! `PlaybookPluginTask`, a worker drives it through `start`/`complete`
//! against the `PlaybookPluginTask` wrapper, and the subtype hooks land on
//! the execution, server-lock, and configuration-lock fakes exactly as §8's
//! happy-path scenario describes.

use std::sync::Arc;
use std::time::Duration;

use decapod_task_core::{Clock, FixedClock, PlaybookPluginData, RetryPolicy, TaskData, TaskRecord};
use decapod_task_queue::hooks::testing::{FakeExecutionSink, FakePlaybookConfigurationStore, FakeServerLockReleaser};
use decapod_task_queue::hooks::ExecutionState;
use decapod_task_queue::tasks::PlaybookPluginTask;
use decapod_task_queue::watcher::{Watcher, WatcherConfig};
use decapod_task_store::InMemoryTaskStore;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

const NOW: i64 = 1_700_000_000;

#[tokio::test]
async fn watcher_yields_a_playbook_task_and_the_full_lifecycle_runs_its_hooks() {
    let store = Arc::new(InMemoryTaskStore::new());
    let created = store
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
    assert_eq!(created.time.created, NOW);
    assert_eq!(created.time.updated, NOW);

    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(NOW));
    let watcher = Watcher::new(store.clone(), clock, RetryPolicy::none())
        .with_config(WatcherConfig { exit_on_empty: true, idle_wait: Duration::from_millis(1) });
    let stop = CancellationToken::new();
    let yielded = watcher.run(stop).next().await.unwrap().unwrap();
    assert_eq!(yielded.id, created.id);

    let executions = Arc::new(FakeExecutionSink::new().with_servers("exec1", vec!["srv1".into(), "srv2".into()]));
    let locks = Arc::new(FakeServerLockReleaser::new(["srv1".to_string(), "srv2".to_string()]));
    let configurations = Arc::new(FakePlaybookConfigurationStore::new().with_configuration("cfg1", "model1", false));
    let task = PlaybookPluginTask::new(store, RetryPolicy::none(), executions.clone(), locks.clone(), configurations.clone());

    let started = task.start(yielded.id, &yielded.update_marker, NOW).await.unwrap();
    assert_eq!(started.time.started, NOW);
    assert_eq!(executions.state_of("exec1"), Some(ExecutionState::Started));
    assert!(configurations.is_locked("cfg1"));

    let completed = task.complete(started.id, &started.update_marker, NOW).await.unwrap();
    assert_eq!(completed.time.completed, NOW);
    assert_eq!(completed.remove_at, NOW + 86_400);
    assert_eq!(executions.state_of("exec1"), Some(ExecutionState::Completed));
    assert!(!locks.is_locked("srv1"));
    assert!(!locks.is_locked("srv2"));
    assert!(!configurations.is_locked("cfg1"));
}

#[tokio::test]
async fn double_start_against_the_same_stale_marker_loses() {
    let store = Arc::new(InMemoryTaskStore::new());
    let created = store
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

    let executions = Arc::new(FakeExecutionSink::new());
    let locks = Arc::new(FakeServerLockReleaser::default());
    let configurations = Arc::new(FakePlaybookConfigurationStore::new());
    let task = PlaybookPluginTask::new(store, RetryPolicy::none(), executions, locks, configurations);

    let winner = task.start(created.id, &created.update_marker, NOW).await;
    assert!(winner.is_ok());

    let loser = task.start(created.id, &created.update_marker, NOW).await;
    assert!(loser.is_err());
}
