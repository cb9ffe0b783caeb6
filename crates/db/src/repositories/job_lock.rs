//! Job lease lock stored in the `job_locks` table.
//!
//! Acquisition is a single upsert that only overwrites a row whose lease
//! has run out, so two nodes racing for the same job cannot both win.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use pillar_core::jobs::{AcquiredLock, JobError, JobLock, LockLease};
use pillar_shared::Clock;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
};
use tracing::debug;

use crate::entities::job_locks;

fn lock_error(err: DbErr) -> JobError {
    JobError::Lock(err.to_string())
}

/// Lease lock shared by every worker connected to the same database.
#[derive(Clone)]
pub struct SeaJobLock {
    db: DatabaseConnection,
    instance_id: String,
    clock: Arc<dyn Clock>,
}

impl SeaJobLock {
    /// Creates a lock identifying its holder as `instance_id`.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        instance_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            instance_id: instance_id.into(),
            clock,
        }
    }

    // Postgres keeps microseconds; release compares `locked_at` exactly.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }
}

#[async_trait]
impl JobLock for SeaJobLock {
    async fn try_acquire(
        &self,
        name: &str,
        lease: LockLease,
    ) -> Result<Option<AcquiredLock>, JobError> {
        let now = self.now();
        let lock_until = now + lease.at_most;
        let locked_at: DateTime<FixedOffset> = now.into();

        let row = job_locks::ActiveModel {
            name: Set(name.to_string()),
            lock_until: Set(lock_until.into()),
            locked_at: Set(locked_at),
            locked_by: Set(self.instance_id.clone()),
        };
        let rows = job_locks::Entity::insert(row)
            .on_conflict(
                OnConflict::column(job_locks::Column::Name)
                    .update_columns([
                        job_locks::Column::LockUntil,
                        job_locks::Column::LockedAt,
                        job_locks::Column::LockedBy,
                    ])
                    .action_and_where(
                        Expr::col((job_locks::Entity, job_locks::Column::LockUntil)).lte(locked_at),
                    )
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(lock_error)?;

        if rows == 0 {
            debug!(job = name, "Job lock held elsewhere");
            return Ok(None);
        }
        Ok(Some(AcquiredLock {
            name: name.to_string(),
            locked_by: self.instance_id.clone(),
            locked_at: now,
            lock_until,
        }))
    }

    async fn release(&self, lock: &AcquiredLock, lease: LockLease) -> Result<(), JobError> {
        let until: DateTime<FixedOffset> = lock.release_until(self.now(), lease).into();
        let locked_at: DateTime<FixedOffset> = lock.locked_at.into();

        let result = job_locks::Entity::update_many()
            .col_expr(job_locks::Column::LockUntil, Expr::value(until))
            .filter(job_locks::Column::Name.eq(lock.name.as_str()))
            .filter(job_locks::Column::LockedBy.eq(lock.locked_by.as_str()))
            .filter(job_locks::Column::LockedAt.eq(locked_at))
            .exec(&self.db)
            .await
            .map_err(lock_error)?;

        if result.rows_affected == 0 {
            debug!(job = %lock.name, "Job lock was taken over before release");
        }
        Ok(())
    }
}
