//! Running jobs under the lease lock, once or on an interval.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pillar_shared::config::JobScheduleConfig;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use super::error::JobError;
use super::lock::{JobLock, LockLease};

/// A unit of periodic work.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Lock name, unique per job.
    fn name(&self) -> &'static str;

    /// Runs the job once.
    async fn run(&self) -> Result<(), JobError>;
}

/// Whether a locked run happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The job ran to completion.
    Completed,
    /// Another instance holds the lock.
    Skipped,
}

/// Runs `job` if its lock can be taken, releasing the lock afterwards even
/// when the job fails.
///
/// # Errors
///
/// The job's own error, or a lock failure.
pub async fn run_locked(
    lock: &dyn JobLock,
    job: &dyn ScheduledJob,
    lease: LockLease,
) -> Result<RunOutcome, JobError> {
    let Some(acquired) = lock.try_acquire(job.name(), lease).await? else {
        debug!(job = job.name(), "Job locked by another instance, skipping");
        return Ok(RunOutcome::Skipped);
    };

    let result = job.run().await;
    if let Err(err) = lock.release(&acquired, lease).await {
        warn!(job = job.name(), error = %err, "Failed to release job lock");
    }
    result.map(|()| RunOutcome::Completed)
}

/// Runs `job` every `schedule.interval_secs` until `shutdown` flips to
/// true. Failed runs are logged and retried on the next tick.
pub async fn run_scheduled(
    lock: Arc<dyn JobLock>,
    job: Arc<dyn ScheduledJob>,
    schedule: JobScheduleConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let lease = LockLease::from_schedule(&schedule);
    let mut ticker = interval(Duration::from_secs(schedule.interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        job = job.name(),
        interval_secs = schedule.interval_secs,
        "Job scheduled"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_locked(lock.as_ref(), job.as_ref(), lease).await {
                    Ok(outcome) => debug!(job = job.name(), ?outcome, "Job tick finished"),
                    Err(err) => error!(
                        job = job.name(),
                        code = err.error_code(),
                        error = %err,
                        "Job run failed"
                    ),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(job = job.name(), "Job stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::lock::InMemoryJobLock;
    use chrono::Duration as LeaseDuration;
    use pillar_shared::FixedClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(JobError::Lock("boom".into()));
            }
            Ok(())
        }
    }

    fn lease() -> LockLease {
        LockLease::new(LeaseDuration::minutes(5), LeaseDuration::zero())
    }

    #[tokio::test]
    async fn test_runs_and_releases() {
        let lock = InMemoryJobLock::new("node-a", Arc::new(FixedClock::default()));
        let job = CountingJob::default();

        assert_eq!(
            run_locked(&lock, &job, lease()).await.unwrap(),
            RunOutcome::Completed
        );
        assert_eq!(
            run_locked(&lock, &job, lease()).await.unwrap(),
            RunOutcome::Completed
        );
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_skips_while_lease_is_active() {
        let lock = InMemoryJobLock::new("node-a", Arc::new(FixedClock::default()));
        let job = CountingJob::default();
        let held = lock.try_acquire(job.name(), lease()).await.unwrap();
        assert!(held.is_some());

        assert_eq!(
            run_locked(&lock, &job, lease()).await.unwrap(),
            RunOutcome::Skipped
        );
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_run_still_releases() {
        let lock = InMemoryJobLock::new("node-a", Arc::new(FixedClock::default()));
        let job = CountingJob {
            fail: true,
            ..CountingJob::default()
        };

        assert!(run_locked(&lock, &job, lease()).await.is_err());
        assert!(run_locked(&lock, &job, lease()).await.is_err());
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let lock: Arc<dyn JobLock> =
            Arc::new(InMemoryJobLock::new("node-a", Arc::new(FixedClock::default())));
        let job = Arc::new(CountingJob::default());
        let schedule = JobScheduleConfig {
            interval_secs: 3600,
            lock_at_most_secs: 60,
            lock_at_least_secs: 0,
        };
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_scheduled(lock, job.clone(), schedule, rx));
        // The first tick fires immediately.
        while job.runs.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }
}
