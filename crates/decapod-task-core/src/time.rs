//! Timestamp bundle carried by every task document.
//!
//! Every field is a UNIX second; `0` means "not yet". `bounced` is the one
//! exception — while it is nonzero it names a *future* second before which
//! the task is not eligible for the scheduler (see [`crate::bounce`]).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFields {
    pub created: i64,
    pub updated: i64,
    pub started: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub failed: i64,
    pub bounced: i64,
}

impl TimeFields {
    /// Timestamps for a just-created task: `created`/`updated` stamped, all
    /// other fields zero.
    pub fn created_at(now: i64) -> Self {
        TimeFields {
            created: now,
            updated: now,
            started: 0,
            completed: 0,
            cancelled: 0,
            failed: 0,
            bounced: 0,
        }
    }

    /// Invariant 1 of the data model: at most one terminal timestamp is set.
    pub fn is_terminal(&self) -> bool {
        [self.completed, self.cancelled, self.failed]
            .iter()
            .filter(|&&t| t != 0)
            .count()
            >= 1
    }

    pub fn is_started(&self) -> bool {
        self.started != 0
    }

    /// Eligible for the scheduler: not started, not terminal, and any bounce
    /// deadline has elapsed.
    pub fn is_eligible(&self, now: i64) -> bool {
        self.started == 0 && !self.is_terminal() && self.bounced <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_task_is_not_terminal() {
        let tf = TimeFields::created_at(100);
        assert!(!tf.is_terminal());
        assert!(!tf.is_started());
        assert!(tf.is_eligible(100));
    }

    #[test]
    fn terminal_detection_counts_any_single_field() {
        let mut tf = TimeFields::created_at(100);
        tf.completed = 150;
        assert!(tf.is_terminal());

        let mut tf = TimeFields::created_at(100);
        tf.failed = 150;
        assert!(tf.is_terminal());

        let mut tf = TimeFields::created_at(100);
        tf.cancelled = 150;
        assert!(tf.is_terminal());
    }

    #[test]
    fn bounced_in_the_future_is_not_eligible() {
        let mut tf = TimeFields::created_at(100);
        tf.bounced = 120;
        assert!(!tf.is_eligible(119));
        assert!(tf.is_eligible(120));
        assert!(tf.is_eligible(121));
    }
}
