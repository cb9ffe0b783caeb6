//! Return matching error types.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::repository::RepositoryError;

/// Errors raised while matching one return or loading the queue.
#[derive(Debug, Error)]
pub enum ReturnMatchError {
    /// Ledger posting failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Payment repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ReturnMatchError {
    /// Returns the error code used in logs and alerts.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Ledger(err) => err.error_code(),
            Self::Repository(err) => err.error_code(),
        }
    }

    /// Ledger balance violations abort the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_fatal(),
            Self::Repository(_) => false,
        }
    }
}
