//! Capital transfer error types.

use pillar_shared::types::ContractId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{CapitalType, ContractState};
use crate::ledger::LedgerError;
use crate::repository::RepositoryError;

/// Errors that abort execution of a single contract.
#[derive(Debug, Error)]
pub enum CapitalTransferError {
    /// The contract does not exist.
    #[error("Capital transfer contract not found: {0}")]
    ContractNotFound(ContractId),

    /// The contract is not in the APPROVED state.
    #[error("Contract {contract_id} is {state}, expected APPROVED")]
    InvalidState {
        /// Contract.
        contract_id: ContractId,
        /// Current state.
        state: ContractState,
    },

    /// The contract has no transfer lines.
    #[error("Contract {0} has no transfer lines")]
    EmptyContract(ContractId),

    /// The seller does not hold enough capital of a type.
    #[error("Insufficient {capital_type} capital: requested {requested}, available {available}")]
    InsufficientCapital {
        /// Capital type.
        capital_type: CapitalType,
        /// Requested book value.
        requested: Decimal,
        /// Seller's book value.
        available: Decimal,
    },

    /// The requested units exceed the seller's units by more than the
    /// clamping tolerance allows.
    #[error(
        "Requested {requested} units exceed available {available} units by {drift_value} in value"
    )]
    ClampingToleranceExceeded {
        /// Units derived from the requested book value.
        requested: Decimal,
        /// Seller's units.
        available: Decimal,
        /// Value of the excess at the unit price.
        drift_value: Decimal,
    },

    /// A unit price is zero or negative.
    #[error("Invalid unit price: {0}")]
    InvalidUnitPrice(Decimal),

    /// A calculation overflowed the decimal range.
    #[error("Arithmetic overflow in capital calculation")]
    Overflow,

    /// Ledger posting failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Contract repository failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CapitalTransferError {
    /// Returns the error code used in logs and alerts.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ContractNotFound(_) => "CONTRACT_NOT_FOUND",
            Self::InvalidState { .. } => "CONTRACT_INVALID_STATE",
            Self::EmptyContract(_) => "CONTRACT_EMPTY",
            Self::InsufficientCapital { .. } => "INSUFFICIENT_CAPITAL",
            Self::ClampingToleranceExceeded { .. } => "CLAMPING_TOLERANCE_EXCEEDED",
            Self::InvalidUnitPrice(_) => "INVALID_UNIT_PRICE",
            Self::Overflow => "ARITHMETIC_OVERFLOW",
            Self::Ledger(err) => err.error_code(),
            Self::Repository(err) => err.error_code(),
        }
    }

    /// Ledger balance violations propagate out of a sweep.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Ledger(err) => err.is_fatal(),
            _ => false,
        }
    }
}
