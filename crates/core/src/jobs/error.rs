//! Periodic job error types.

use std::io;

use thiserror::Error;

use crate::bank::ProcessingError;
use crate::capital::CapitalTransferError;
use crate::payment::ReturnMatchError;

/// Errors that end a job run.
#[derive(Debug, Error)]
pub enum JobError {
    /// The lease lock could not be read or written.
    #[error("Job lock error: {0}")]
    Lock(String),

    /// The statement directory could not be read.
    #[error("Statement directory error: {0}")]
    Io(#[from] io::Error),

    /// Statement processing hit a hard failure.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// Return matching hit a hard failure.
    #[error(transparent)]
    ReturnMatch(#[from] ReturnMatchError),

    /// The capital transfer sweep hit a hard failure.
    #[error(transparent)]
    CapitalTransfer(#[from] CapitalTransferError),
}

impl JobError {
    /// Returns the error code used in logs and alerts.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Lock(_) => "JOB_LOCK_ERROR",
            Self::Io(_) => "JOB_IO_ERROR",
            Self::Processing(err) => err.error_code(),
            Self::ReturnMatch(err) => err.error_code(),
            Self::CapitalTransfer(err) => err.error_code(),
        }
    }
}
