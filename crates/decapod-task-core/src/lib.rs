//! Domain types, state machine, and CAS support primitives shared by the
//! `decapod-task-store` and `decapod-task-queue` crates.
//!
//! This crate knows nothing about any particular document store — it is the
//! vocabulary the rest of the stack agrees on: what a task document looks
//! like, which transitions are legal from which state, how a bounce
//! deadline is computed, and how to bound-retry a flaky store call.

pub mod bounce;
pub mod clock;
pub mod error;
pub mod id;
pub mod record;
pub mod retry;
pub mod state_machine;
pub mod task_type;
pub mod time;

pub use bounce::new_bounce_time;
pub use clock::{Clock, SystemClock};
pub use error::{TaskQueueError, Transition, TransientError, TransitionForbidden};
pub use id::{TaskId, new_update_marker};
pub use record::{ExecutorStamp, TaskRecord};
pub use retry::{RetryPolicy, retry};
pub use task_type::{CancelPlaybookPluginData, PlaybookPluginData, ServerDiscoveryData, TaskData, TaskType};
pub use time::TimeFields;

#[cfg(any(test, feature = "test-support"))]
pub use clock::FixedClock;
