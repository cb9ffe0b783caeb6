//! `SeaORM` entity definitions.
//!
//! Enum-like columns are stored as their SCREAMING_SNAKE_CASE names and
//! converted with the `as_str` / `parse` pairs of the core types.

pub mod capital_transfer_contract_transactions;
pub mod capital_transfer_contracts;
pub mod job_locks;
pub mod ledger_accounts;
pub mod ledger_entries;
pub mod ledger_transactions;
pub mod payment_returns;
pub mod payments;
