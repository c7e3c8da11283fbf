//! Monotonic-ish UNIX-second clock abstraction.
//!
//! All timestamps on a [`crate::record::TaskRecord`] are UNIX seconds, not
//! wall-clock strings, so the state machine and the watcher can pin `now()`
//! in tests without touching the system clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Supplies the current time as UNIX seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Real wall-clock time via [`chrono::Utc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock pinned to a value the test controls, for the literal-`now`
/// scenarios in the task queue's test suite.
#[derive(Debug, Clone)]
#[cfg(any(test, feature = "test-support"))]
pub struct FixedClock(Arc<AtomicI64>);

#[cfg(any(test, feature = "test-support"))]
impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}
