//! Cluster-wide lease locks for periodic jobs.
//!
//! A lock is held until `lock_until`. Acquiring sets it to `now + at_most`,
//! so a crashed holder frees the job after at most that long. Releasing
//! sets it to `max(now, locked_at + at_least)`, so a run that finishes
//! quickly still keeps other nodes from starting the same job right away.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use pillar_shared::Clock;
use pillar_shared::config::JobScheduleConfig;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::JobError;

/// Lease bounds for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockLease {
    /// Longest time the lock is held if the holder never releases it.
    pub at_most: Duration,
    /// Shortest time the lock is held after acquisition.
    pub at_least: Duration,
}

impl LockLease {
    /// Creates a lease.
    #[must_use]
    pub const fn new(at_most: Duration, at_least: Duration) -> Self {
        Self { at_most, at_least }
    }

    /// Reads the lease bounds from a job schedule.
    #[must_use]
    pub fn from_schedule(schedule: &JobScheduleConfig) -> Self {
        Self {
            at_most: seconds(schedule.lock_at_most_secs),
            at_least: seconds(schedule.lock_at_least_secs),
        }
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
}

/// A held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredLock {
    /// Job name.
    pub name: String,
    /// Holder identity.
    pub locked_by: String,
    /// Acquisition time.
    pub locked_at: DateTime<Utc>,
    /// Lease end as acquired.
    pub lock_until: DateTime<Utc>,
}

impl AcquiredLock {
    /// Lease end to write on release.
    #[must_use]
    pub fn release_until(&self, now: DateTime<Utc>, lease: LockLease) -> DateTime<Utc> {
        now.max(self.locked_at + lease.at_least)
    }
}

/// Lease lock shared by all worker instances.
#[async_trait]
pub trait JobLock: Send + Sync {
    /// Takes the lock for `name` unless another holder's lease is still
    /// running. Returns `None` when the lock is held elsewhere.
    async fn try_acquire(
        &self,
        name: &str,
        lease: LockLease,
    ) -> Result<Option<AcquiredLock>, JobError>;

    /// Shortens the lease to its lower bound. Releasing a lock that was
    /// taken over by someone else is a no-op.
    async fn release(&self, lock: &AcquiredLock, lease: LockLease) -> Result<(), JobError>;
}

#[derive(Debug, Clone)]
struct LockRow {
    lock_until: DateTime<Utc>,
    locked_at: DateTime<Utc>,
    locked_by: String,
}

/// Lease lock for a single process.
pub struct InMemoryJobLock {
    instance_id: String,
    clock: Arc<dyn Clock>,
    rows: Mutex<HashMap<String, LockRow>>,
}

impl InMemoryJobLock {
    /// Creates a lock identifying its holder as `instance_id`.
    #[must_use]
    pub fn new(instance_id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            instance_id: instance_id.into(),
            clock,
            rows: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl JobLock for InMemoryJobLock {
    async fn try_acquire(
        &self,
        name: &str,
        lease: LockLease,
    ) -> Result<Option<AcquiredLock>, JobError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get(name)
            && row.lock_until > now
        {
            debug!(job = name, locked_by = %row.locked_by, "Job lock held elsewhere");
            return Ok(None);
        }

        let row = LockRow {
            lock_until: now + lease.at_most,
            locked_at: now,
            locked_by: self.instance_id.clone(),
        };
        let acquired = AcquiredLock {
            name: name.to_string(),
            locked_by: row.locked_by.clone(),
            locked_at: row.locked_at,
            lock_until: row.lock_until,
        };
        rows.insert(name.to_string(), row);
        Ok(Some(acquired))
    }

    async fn release(&self, lock: &AcquiredLock, lease: LockLease) -> Result<(), JobError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(&lock.name)
            && row.locked_by == lock.locked_by
            && row.locked_at == lock.locked_at
        {
            row.lock_until = lock.release_until(now, lease);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pillar_shared::FixedClock;

    fn lease() -> LockLease {
        LockLease::new(Duration::minutes(10), Duration::minutes(1))
    }

    #[tokio::test]
    async fn test_second_holder_is_refused_while_leased() {
        let clock = Arc::new(FixedClock::default());
        let lock = InMemoryJobLock::new("node-a", clock.clone());

        let held = lock.try_acquire("statements", lease()).await.unwrap();
        assert!(held.is_some());
        assert!(lock.try_acquire("statements", lease()).await.unwrap().is_none());
        assert!(lock.try_acquire("transfers", lease()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_keeps_minimum_lease() {
        let clock = Arc::new(FixedClock::default());
        let lock = InMemoryJobLock::new("node-a", clock.clone());

        let held = lock.try_acquire("statements", lease()).await.unwrap().unwrap();
        clock.advance(Duration::seconds(5));
        lock.release(&held, lease()).await.unwrap();

        assert!(lock.try_acquire("statements", lease()).await.unwrap().is_none());
        clock.advance(Duration::seconds(55));
        assert!(lock.try_acquire("statements", lease()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_after_minimum_frees_immediately() {
        let clock = Arc::new(FixedClock::default());
        let lock = InMemoryJobLock::new("node-a", clock.clone());

        let held = lock.try_acquire("statements", lease()).await.unwrap().unwrap();
        clock.advance(Duration::minutes(3));
        lock.release(&held, lease()).await.unwrap();

        assert!(lock.try_acquire("statements", lease()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken_over() {
        let clock = Arc::new(FixedClock::default());
        let lock = InMemoryJobLock::new("node-a", clock.clone());

        let stale = lock.try_acquire("statements", lease()).await.unwrap().unwrap();
        clock.advance(Duration::minutes(11));
        let fresh = lock.try_acquire("statements", lease()).await.unwrap().unwrap();

        // The stale holder finishing late must not shorten the new lease.
        lock.release(&stale, lease()).await.unwrap();
        assert!(lock.try_acquire("statements", lease()).await.unwrap().is_none());
        assert!(fresh.locked_at > stale.locked_at);
    }

    #[test]
    fn test_lease_from_schedule() {
        let schedule = JobScheduleConfig {
            interval_secs: 300,
            lock_at_most_secs: 240,
            lock_at_least_secs: 30,
        };
        assert_eq!(
            LockLease::from_schedule(&schedule),
            LockLease::new(Duration::minutes(4), Duration::seconds(30))
        );
    }
}
