use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
        PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use thiserror::Error;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    db::traits::{cursor_key, SettingsStore, StorageError},
    scheduler::Clock,
};

#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Failed(String),
}

/// A unit of periodic work. The job persists its own cursor at the end of a successful run; the scheduler only reads
/// it to decide when the first run after a restart is due.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn cursor_key(&self) -> String {
        cursor_key(self.name())
    }

    async fn run(&self) -> Result<(), JobError>;
}

/// Lets a job be scheduled while other owners (e.g. a manual trigger) keep a handle to it.
#[async_trait]
impl<J: ScheduledJob> ScheduledJob for Arc<J> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn cursor_key(&self) -> String {
        self.as_ref().cursor_key()
    }

    async fn run(&self) -> Result<(), JobError> {
        self.as_ref().run().await
    }
}

/// The shortest interval a scheduler accepts. `tokio::time::interval` panics on a zero period.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// A previous run was still in progress
    Skipped,
}

/// How long to wait before the first run. An absent cursor, or one at least `interval` old, means the job is overdue.
/// A cursor in the future (clock skew) counts as "just ran".
pub fn initial_delay(cursor: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> Duration {
    let Some(last_run) = cursor else {
        return Duration::ZERO;
    };
    let elapsed = (now - last_run).to_std().unwrap_or(Duration::ZERO);
    interval.saturating_sub(elapsed)
}

/// Clears a running flag when dropped, including when the run is cancelled.
pub(crate) struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    pub(crate) fn new(flag: &'a AtomicBool) -> Self {
        Self(flag)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct SchedulerInner<J, S> {
    job: J,
    settings: S,
    clock: Arc<dyn Clock>,
    interval: Duration,
    running: AtomicBool,
}

impl<J: ScheduledJob, S: SettingsStore> SchedulerInner<J, S> {
    async fn run_once(&self) -> RunOutcome {
        let name = self.job.name();
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            warn!("🕰️ {name} is still running. Skipping this tick.");
            return RunOutcome::Skipped;
        }
        let _guard = RunningGuard::new(&self.running);
        debug!("🕰️ Running {name}");
        match self.job.run().await {
            Ok(()) => {
                debug!("🕰️ {name} completed");
                RunOutcome::Completed
            },
            Err(e) => {
                error!("🕰️ {name} failed: {e}");
                RunOutcome::Failed
            },
        }
    }

    async fn first_delay(&self) -> Duration {
        let key = self.job.cursor_key();
        let cursor = match self.settings.read_cursor(&key).await {
            Ok(c) => c,
            Err(e) => {
                warn!("🕰️ Could not read {key}: {e}. Treating the job as overdue.");
                None
            },
        };
        initial_delay(cursor, self.clock.now(), self.interval)
    }
}

/// Runs a [`ScheduledJob`] on a fixed interval, never overlapping with itself, and picks up where it left off after a
/// restart.
pub struct Scheduler<J, S> {
    inner: Arc<SchedulerInner<J, S>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<J: ScheduledJob, S: SettingsStore> Scheduler<J, S> {
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn new(job: J, settings: S, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        let interval = if interval < MIN_INTERVAL {
            let (millis, name) = (interval.as_millis(), job.name());
            warn!("🕰️ {millis}ms is too short an interval for {name}. Using {}s.", MIN_INTERVAL.as_secs());
            MIN_INTERVAL
        } else {
            interval
        };
        let inner = SchedulerInner { job, settings, clock, interval, running: AtomicBool::new(false) };
        Self { inner: Arc::new(inner), handle: Mutex::new(None) }
    }

    pub fn job(&self) -> &J {
        &self.inner.job
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Runs the job now unless a run is already in progress. Errors are logged and reported as
    /// [`RunOutcome::Failed`].
    pub async fn run_once(&self) -> RunOutcome {
        self.inner.run_once().await
    }

    /// Spawns the timer loop. Calling `start` on a started scheduler does nothing.
    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.is_some() {
            warn!("🕰️ {} scheduler is already started", self.inner.job.name());
            return;
        }
        let inner = Arc::clone(&self.inner);
        *handle = Some(tokio::spawn(async move {
            let name = inner.job.name().to_string();
            let delay = inner.first_delay().await;
            info!("🕰️ {name} scheduled every {}s. First run in {}s", inner.interval.as_secs(), delay.as_secs());
            tokio::time::sleep(delay).await;
            let mut timer = tokio::time::interval(inner.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // The first tick completes immediately
                timer.tick().await;
                inner.run_once().await;
            }
        }));
    }

    /// Stops the timer loop. A run in progress is cancelled at its next await point.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
            info!("🕰️ {} scheduler stopped", self.inner.job.name());
        }
    }
}

impl<J, S> Drop for Scheduler<J, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, 0).unwrap()
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn missing_cursor_runs_immediately() {
        assert_eq!(initial_delay(None, at(12, 0), HOUR), Duration::ZERO);
    }

    #[test]
    fn stale_cursor_runs_immediately() {
        assert_eq!(initial_delay(Some(at(10, 0)), at(12, 0), HOUR), Duration::ZERO);
        assert_eq!(initial_delay(Some(at(11, 0)), at(12, 0), HOUR), Duration::ZERO);
    }

    #[test]
    fn fresh_cursor_waits_for_the_remainder() {
        assert_eq!(initial_delay(Some(at(11, 40)), at(12, 0), HOUR), Duration::from_secs(40 * 60));
    }

    #[test]
    fn future_cursor_waits_a_full_interval() {
        assert_eq!(initial_delay(Some(at(13, 0)), at(12, 0), HOUR), HOUR);
    }
}
