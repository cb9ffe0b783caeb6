//! Errors shared by the persistence seams of the core.

use thiserror::Error;

/// Failure of a payment or contract repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// Record id.
        id: String,
    },

    /// The backing store failed.
    #[error("Repository storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    /// Returns the error code used in logs and alerts.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Storage(_) => "REPOSITORY_STORAGE_ERROR",
        }
    }
}
