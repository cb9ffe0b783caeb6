//! Periodic jobs and the lease lock that keeps them single-instance.

pub mod capital_transfer;
pub mod error;
pub mod lock;
pub mod runner;
pub mod statement;

pub use capital_transfer::CapitalTransferJob;
pub use error::JobError;
pub use lock::{AcquiredLock, InMemoryJobLock, JobLock, LockLease};
pub use runner::{RunOutcome, ScheduledJob, run_locked, run_scheduled};
pub use statement::{StatementJob, StatementJobReport};
