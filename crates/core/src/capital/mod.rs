//! Capital transfer contracts and their execution.

pub mod calculation;
pub mod error;
pub mod executor;
pub mod notifier;
pub mod repository;
pub mod types;

#[cfg(test)]
mod calculation_props;

pub use calculation::{UNIT_SCALE, clamp_units, proportional_fiat_value, requested_units};
pub use error::CapitalTransferError;
pub use executor::{CapitalTransferExecutor, ExecutionOutcome, SweepReport};
pub use notifier::{LoggingNotifier, NotificationError, TransferNotifier, TransferRole};
pub use repository::{ContractRepository, InMemoryContractRepository};
pub use types::{CapitalTransferAmount, CapitalTransferContract, CapitalType, ContractState};
