//! The `task_type` tag and its per-subtype payload.
//!
//! The source system carries `task_type` and `data` as two independent
//! fields, which lets them disagree with each other. Here they are a single
//! internally-tagged enum: the tag *is* `task_type`, so decoding a document
//! with a known tag and the wrong payload shape is a deserialization error
//! rather than a runtime invariant violation discovered later.

use serde::{Deserialize, Serialize};

/// Tag identifying which lifecycle-hook table and payload shape a task uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Playbook,
    Cancel,
    ServerDiscovery,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Playbook => "PLAYBOOK",
            TaskType::Cancel => "CANCEL",
            TaskType::ServerDiscovery => "SERVER_DISCOVERY",
        }
    }
}

/// The subtype payload, tagged by `task_type` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task_type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskData {
    Playbook(PlaybookPluginData),
    Cancel(CancelPlaybookPluginData),
    ServerDiscovery(ServerDiscoveryData),
}

impl TaskData {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskData::Playbook(_) => TaskType::Playbook,
            TaskData::Cancel(_) => TaskType::Cancel,
            TaskData::ServerDiscovery(_) => TaskType::ServerDiscovery,
        }
    }
}

/// `PlaybookPluginTask.data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookPluginData {
    pub playbook_id: String,
    pub playbook_configuration_id: String,
}

/// `CancelPlaybookPluginTask.data` — carries nothing beyond the shared
/// `execution_id`, which names the playbook task being cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CancelPlaybookPluginData {}

/// `ServerDiscoveryTask.data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDiscoveryData {
    pub id: String,
    pub host: String,
    pub username: String,
}
