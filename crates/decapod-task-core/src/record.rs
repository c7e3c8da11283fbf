//! The persisted task document.

use serde::{Deserialize, Serialize};

use crate::id::TaskId;
use crate::task_type::{TaskData, TaskType};
use crate::time::TimeFields;

/// Informational owner stamp set once by the worker that called `start`.
///
/// No lease renewal is performed on this value — see §5 of the design
/// notes. A crashed worker simply leaves it pointing at a dead process; an
/// operator recovers by bouncing or failing the task externally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorStamp {
    pub host: String,
    pub pid: i64,
}

impl ExecutorStamp {
    pub fn is_unset(&self) -> bool {
        self.host.is_empty() && self.pid == 0
    }
}

/// Full persisted shape of a task document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub execution_id: String,
    pub time: TimeFields,
    pub bounced: u32,
    pub update_marker: String,
    pub executor: ExecutorStamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: TaskData,
    pub remove_at: i64,
}

impl TaskRecord {
    /// Build a freshly created record. `set_fields` for `create` per §4.2:
    /// `time.created = time.updated = now`, a new update marker, everything
    /// else zeroed.
    pub fn new(execution_id: impl Into<String>, data: TaskData, now: i64) -> Self {
        TaskRecord {
            id: TaskId::generate(),
            execution_id: execution_id.into(),
            time: TimeFields::created_at(now),
            bounced: 0,
            update_marker: crate::id::new_update_marker(),
            executor: ExecutorStamp::default(),
            error: None,
            data,
            remove_at: 0,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.data.task_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_type::ServerDiscoveryData;

    fn sample(now: i64) -> TaskRecord {
        TaskRecord::new(
            "exec1",
            TaskData::ServerDiscovery(ServerDiscoveryData {
                id: "srv1".into(),
                host: "10.0.0.1".into(),
                username: "admin".into(),
            }),
            now,
        )
    }

    #[test]
    fn new_record_has_zeroed_lifecycle_fields() {
        let record = sample(1_700_000_000);
        assert_eq!(record.time.created, 1_700_000_000);
        assert_eq!(record.time.updated, 1_700_000_000);
        assert_eq!(record.time.started, 0);
        assert!(!record.time.is_terminal());
        assert!(record.executor.is_unset());
        assert_eq!(record.remove_at, 0);
        assert_eq!(record.task_type(), TaskType::ServerDiscovery);
    }

    #[test]
    fn serialize_then_deserialize_round_trips_field_by_field() {
        let record = sample(1_700_000_000);
        let json = serde_json::to_string(&record).unwrap();
        let back: TaskRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
