//! Double-entry ledger.
//!
//! - Account identity (owner, purpose, asset type)
//! - Transactions with signed postings, balanced per asset type
//! - Idempotency by `(external reference, transaction type)`
//! - The `LedgerStore` seam with an in-memory implementation

pub mod account;
pub mod error;
pub mod memory;
pub mod reference;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use account::{
    AccountOwner, AccountPurpose, AssetType, BankAccountType, FundTicker, LedgerAccount, OwnerType,
};
pub use error::{LedgerError, LedgerResult};
pub use memory::InMemoryLedgerStore;
pub use reference::ExternalReference;
pub use store::LedgerStore;
pub use types::{AccountPosting, NewTransaction, PostedTransaction, Posting, TransactionType};
pub use validation::validate_balance;
