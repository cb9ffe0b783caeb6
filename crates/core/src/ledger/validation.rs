//! Balance validation for new transactions.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::account::AssetType;
use super::error::LedgerError;
use super::types::Posting;

/// Validates that postings are non-empty and net to zero per asset type.
///
/// Currency and fund units are never summed together; a transaction that
/// moves both must balance each independently.
///
/// # Errors
///
/// Returns `EmptyTransaction` or the first `Unbalanced` asset type in
/// `AssetType` order.
pub fn validate_balance(postings: &[Posting]) -> Result<(), LedgerError> {
    if postings.is_empty() {
        return Err(LedgerError::EmptyTransaction);
    }

    let mut sums: BTreeMap<AssetType, Decimal> = BTreeMap::new();
    for posting in postings {
        *sums.entry(posting.asset_type()).or_default() += posting.amount;
    }

    match sums.into_iter().find(|(_, sum)| !sum.is_zero()) {
        Some((asset_type, sum)) => Err(LedgerError::Unbalanced { asset_type, sum }),
        None => Ok(()),
    }
}
