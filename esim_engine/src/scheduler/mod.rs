//! Periodic job harness: persisted cursor, reentrancy guard and a fixed interval.
mod clock;
mod harness;

pub use clock::{Clock, ManualClock, SystemClock};
pub(crate) use harness::RunningGuard;
pub use harness::{initial_delay, JobError, RunOutcome, ScheduledJob, Scheduler, MIN_INTERVAL};
