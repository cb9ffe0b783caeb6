//! Bank statement error types.

use thiserror::Error;

use crate::ledger::{LedgerError, TransactionType};
use crate::repository::RepositoryError;

/// Errors raised while parsing camt messages. Parsing fails closed: any of
/// these rejects the whole document.
#[derive(Debug, Error)]
pub enum StatementParseError {
    /// The document is not well-formed XML.
    #[error("Malformed XML: {0}")]
    Xml(String),

    /// The root element carries no default namespace.
    #[error("Document has no namespace")]
    MissingNamespace,

    /// The namespace is neither camt.052 nor camt.053.
    #[error("Unsupported namespace: {0}")]
    UnsupportedNamespace(String),

    /// A mandatory element is absent.
    #[error("Missing element: {0}")]
    MissingElement(String),

    /// The message does not contain exactly one statement or report.
    #[error("Expected exactly one {element}, found {count}")]
    ElementCount {
        /// Element name.
        element: &'static str,
        /// Number found.
        count: usize,
    },

    /// An entry does not name exactly one counter-party.
    #[error("Entry {external_id} has {count} counter-parties, expected exactly one")]
    CounterPartyCount {
        /// Entry reference.
        external_id: String,
        /// Number found.
        count: usize,
    },

    /// An entry does not carry exactly one unstructured remittance line.
    #[error("Entry {external_id} has {count} remittance lines, expected exactly one")]
    RemittanceCount {
        /// Entry reference.
        external_id: String,
        /// Number found.
        count: usize,
    },

    /// An amount is not a decimal number.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// A date is not ISO 8601.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// `CdtDbtInd` is neither CRDT nor DBIT.
    #[error("Invalid credit/debit indicator: {0}")]
    InvalidIndicator(String),
}

impl StatementParseError {
    /// Returns the error code used in logs and alerts.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Xml(_) => "STATEMENT_MALFORMED_XML",
            Self::MissingNamespace => "STATEMENT_MISSING_NAMESPACE",
            Self::UnsupportedNamespace(_) => "STATEMENT_UNSUPPORTED_NAMESPACE",
            Self::MissingElement(_) => "STATEMENT_MISSING_ELEMENT",
            Self::ElementCount { .. } => "STATEMENT_ELEMENT_COUNT",
            Self::CounterPartyCount { .. } => "STATEMENT_COUNTER_PARTY_COUNT",
            Self::RemittanceCount { .. } => "STATEMENT_REMITTANCE_COUNT",
            Self::InvalidAmount(_) => "STATEMENT_INVALID_AMOUNT",
            Self::InvalidDate(_) => "STATEMENT_INVALID_DATE",
            Self::InvalidIndicator(_) => "STATEMENT_INVALID_INDICATOR",
        }
    }
}

/// Errors that abort processing of a whole statement.
///
/// Per-entry problems are reported in the `ProcessingReport` instead.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The statement belongs to an IBAN that is not one of the fund's
    /// configured bank accounts.
    #[error("Unknown bank account: {0}")]
    UnknownAccount(String),

    /// A sub-family code mapped to a transaction type that bank
    /// operations cannot post.
    #[error("Transaction type {0} cannot be posted from a statement entry")]
    UnsupportedTransactionType(TransactionType),

    /// The ledger rejected a transaction.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The payment repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ProcessingError {
    /// Returns the error code used in logs and alerts.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownAccount(_) => "PROCESSING_UNKNOWN_ACCOUNT",
            Self::UnsupportedTransactionType(_) => "PROCESSING_UNSUPPORTED_TYPE",
            Self::Ledger(err) => err.error_code(),
            Self::Repository(err) => err.error_code(),
        }
    }

    /// Ledger balance violations must stop processing.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_fatal(),
            Self::UnsupportedTransactionType(_) => true,
            Self::UnknownAccount(_) | Self::Repository(_) => false,
        }
    }
}
