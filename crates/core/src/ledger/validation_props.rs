//! Property-based tests for transaction balance validation.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::account::{AccountPurpose, AssetType, LedgerAccount};
use super::error::LedgerError;
use super::types::Posting;
use super::validation::validate_balance;

/// Strategy to generate a signed amount with two decimal places.
fn cents() -> impl Strategy<Value = Decimal> {
    (-100_000_000i64..100_000_000i64).prop_map(|c| Decimal::new(c, 2))
}

/// Strategy to generate a signed unit amount with five decimal places.
fn units() -> impl Strategy<Value = Decimal> {
    (-10_000_000_000i64..10_000_000_000i64).prop_map(|u| Decimal::new(u, 5))
}

fn account(asset_type: AssetType) -> LedgerAccount {
    LedgerAccount::system(AccountPurpose::FundUnits, asset_type)
}

/// Builds postings of one asset type with a balancing last leg.
fn balanced(amounts: &[Decimal], asset_type: AssetType) -> Vec<Posting> {
    let mut postings: Vec<Posting> = amounts
        .iter()
        .map(|a| Posting::new(account(asset_type), *a))
        .collect();
    let sum: Decimal = amounts.iter().copied().sum();
    postings.push(Posting::new(account(asset_type), -sum));
    postings
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any set of postings closed by the negated sum validates.
    #[test]
    fn prop_balanced_accepted(amounts in prop::collection::vec(cents(), 1..10)) {
        prop_assert!(validate_balance(&balanced(&amounts, AssetType::Currency)).is_ok());
    }

    /// Mixing two independently balanced asset types still validates.
    #[test]
    fn prop_mixed_assets_accepted(
        cash in prop::collection::vec(cents(), 1..6),
        fund in prop::collection::vec(units(), 1..6),
    ) {
        let mut postings = balanced(&cash, AssetType::Currency);
        postings.extend(balanced(&fund, AssetType::FundUnit));
        prop_assert!(validate_balance(&postings).is_ok());
    }

    /// Any non-zero skew on the closing leg is reported with the exact sum.
    #[test]
    fn prop_skew_rejected(
        amounts in prop::collection::vec(cents(), 1..10),
        skew in cents().prop_filter("non-zero", |d| !d.is_zero()),
    ) {
        let mut postings = balanced(&amounts, AssetType::Currency);
        if let Some(last) = postings.last_mut() {
            last.amount += skew;
        }
        match validate_balance(&postings) {
            Err(LedgerError::Unbalanced { asset_type, sum }) => {
                prop_assert_eq!(asset_type, AssetType::Currency);
                prop_assert_eq!(sum, skew);
            }
            other => prop_assert!(false, "expected Unbalanced, got {:?}", other),
        }
    }
}
