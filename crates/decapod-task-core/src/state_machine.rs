//! Pure predicate checks for each transition in §4.2.
//!
//! These mirror, in-process, the predicate every CAS update also carries to
//! the store: a backend uses these same checks either to build its `WHERE`
//! clause (Postgres) or to decide whether a guarded write may proceed while
//! holding its lock (in-memory). Keeping the checks here means both backends
//! agree on the rules by construction instead of by convention.

use crate::error::{Transition, TransitionForbidden};
use crate::record::TaskRecord;

/// `bounce`: only while unstarted and non-terminal.
pub fn check_bounce(record: &TaskRecord) -> Result<(), TransitionForbidden> {
    if record.time.started == 0 && !record.time.is_terminal() {
        Ok(())
    } else {
        Err(Transition::Bounce.forbidden())
    }
}

/// `start`: only while unstarted and non-terminal.
pub fn check_start(record: &TaskRecord) -> Result<(), TransitionForbidden> {
    if record.time.started == 0 && !record.time.is_terminal() {
        Ok(())
    } else {
        Err(Transition::Start.forbidden())
    }
}

/// `complete`: requires `time.started != 0` and non-terminal.
pub fn check_complete(record: &TaskRecord) -> Result<(), TransitionForbidden> {
    if record.time.started != 0 && !record.time.is_terminal() {
        Ok(())
    } else {
        Err(Transition::Complete.forbidden())
    }
}

/// `fail`: requires `time.started != 0` and non-terminal.
pub fn check_fail(record: &TaskRecord) -> Result<(), TransitionForbidden> {
    if record.time.started != 0 && !record.time.is_terminal() {
        Ok(())
    } else {
        Err(Transition::Fail.forbidden())
    }
}

/// `cancel`: allowed from either CREATED or STARTED — the only guard is
/// non-terminal. See the open question in DESIGN.md: the source allows
/// cancelling an unstarted task, and this crate preserves that behavior.
pub fn check_cancel(record: &TaskRecord) -> Result<(), TransitionForbidden> {
    if !record.time.is_terminal() {
        Ok(())
    } else {
        Err(Transition::Cancel.forbidden())
    }
}

/// `set_executor_data`: requires a started, non-terminal task whose executor
/// stamp has not already been set.
pub fn check_set_executor(record: &TaskRecord) -> Result<(), TransitionForbidden> {
    if record.time.started != 0 && !record.time.is_terminal() && record.executor.is_unset() {
        Ok(())
    } else {
        Err(Transition::SetExecutor.forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_type::{ServerDiscoveryData, TaskData};

    fn fresh() -> TaskRecord {
        TaskRecord::new(
            "exec1",
            TaskData::ServerDiscovery(ServerDiscoveryData {
                id: "srv1".into(),
                host: "h".into(),
                username: "u".into(),
            }),
            1_700_000_000,
        )
    }

    #[test]
    fn fresh_task_can_start_bounce_or_cancel_but_not_complete_or_fail() {
        let record = fresh();
        assert!(check_start(&record).is_ok());
        assert!(check_bounce(&record).is_ok());
        assert!(check_cancel(&record).is_ok());
        assert!(check_complete(&record).is_err());
        assert!(check_fail(&record).is_err());
        assert!(check_set_executor(&record).is_err());
    }

    #[test]
    fn started_task_can_complete_fail_cancel_but_not_bounce_or_restart() {
        let mut record = fresh();
        record.time.started = 1_700_000_010;
        assert!(check_complete(&record).is_ok());
        assert!(check_fail(&record).is_ok());
        assert!(check_cancel(&record).is_ok());
        assert!(check_start(&record).is_err());
        assert!(check_bounce(&record).is_err());
        assert!(check_set_executor(&record).is_ok());
    }

    #[test]
    fn terminal_task_rejects_every_transition() {
        let mut record = fresh();
        record.time.started = 1_700_000_010;
        record.time.completed = 1_700_000_020;
        assert!(check_start(&record).is_err());
        assert!(check_bounce(&record).is_err());
        assert!(check_complete(&record).is_err());
        assert!(check_fail(&record).is_err());
        assert!(check_cancel(&record).is_err());
        assert!(check_set_executor(&record).is_err());
    }

    #[test]
    fn executor_already_set_rejects_set_executor() {
        let mut record = fresh();
        record.time.started = 1_700_000_010;
        record.executor.host = "worker-1".into();
        record.executor.pid = 42;
        assert!(check_set_executor(&record).is_err());
    }
}
