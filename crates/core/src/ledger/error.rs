//! Ledger error types.

use rust_decimal::Decimal;
use thiserror::Error;

use super::account::AssetType;
use super::reference::ExternalReference;
use super::types::TransactionType;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A transaction must carry at least one posting.
    #[error("Transaction has no postings")]
    EmptyTransaction,

    /// Postings of one asset type do not sum to zero.
    #[error("Transaction is not balanced for {asset_type}: postings sum to {sum}")]
    Unbalanced {
        /// Asset type whose postings do not net out.
        asset_type: AssetType,
        /// The non-zero sum.
        sum: Decimal,
    },

    /// A transaction with the same reference and type already exists.
    #[error("Transaction {transaction_type} with reference {external_reference} already exists")]
    Duplicate {
        /// Conflicting reference.
        external_reference: ExternalReference,
        /// Conflicting type.
        transaction_type: TransactionType,
    },

    /// The backing store failed.
    #[error("Ledger storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Returns the error code used in logs and alerts.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyTransaction => "LEDGER_EMPTY_TRANSACTION",
            Self::Unbalanced { .. } => "LEDGER_UNBALANCED",
            Self::Duplicate { .. } => "LEDGER_DUPLICATE",
            Self::Storage(_) => "LEDGER_STORAGE_ERROR",
        }
    }

    /// Returns true for idempotency conflicts.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Returns true when the error indicates a programming defect rather than
    /// a data or infrastructure problem. Callers must not swallow these.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unbalanced { .. } | Self::EmptyTransaction)
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
