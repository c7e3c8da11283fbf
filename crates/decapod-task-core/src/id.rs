//! Opaque identifiers: task ids and CAS update markers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Server-assigned, opaque 12-byte task identifier.
///
/// Derived from the leading 12 bytes of a UUIDv7 so ids sort roughly in
/// creation order even though the type itself makes no ordering promise —
/// the scheduler's fairness key is `(bounced, time.bounced, time.created)`,
/// never the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TaskId([u8; 12]);

impl TaskId {
    /// Generate a new task id.
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7();
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&uuid.as_bytes()[..12]);
        TaskId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

/// Error returned when a string is not a well-formed [`TaskId`].
#[derive(Debug, thiserror::Error)]
#[error("invalid task id: {0}")]
pub struct InvalidTaskId(String);

impl TryFrom<String> for TaskId {
    type Error = InvalidTaskId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != 24 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidTaskId(value));
        }
        let mut bytes = [0u8; 12];
        for (i, chunk) in value.as_bytes().chunks(2).enumerate() {
            let hex = std::str::from_utf8(chunk).map_err(|_| InvalidTaskId(value.clone()))?;
            bytes[i] = u8::from_str_radix(hex, 16).map_err(|_| InvalidTaskId(value.clone()))?;
        }
        Ok(TaskId(bytes))
    }
}

/// Generate a fresh opaque CAS token.
///
/// Rotated on every successful write; a writer presenting a stale marker
/// always loses the compare-and-swap.
pub fn new_update_marker() -> String {
    Uuid::new_v4().to_string()
}
