//! Property-based tests for transfer unit calculations.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::calculation::{clamp_units, proportional_fiat_value, requested_units};
use super::error::CapitalTransferError;

const TOLERANCE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Units with five decimal places, up to one million.
fn units() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000_000i64).prop_map(|u| Decimal::new(u, 5))
}

/// Unit prices from 0.01 to 1000.00000.
fn price() -> impl Strategy<Value = Decimal> {
    (1_000i64..100_000_000i64).prop_map(|p| Decimal::new(p, 5))
}

/// Book values with two decimal places, up to one million.
fn book_value() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|c| Decimal::new(c, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The transferred units never exceed what the seller holds.
    #[test]
    fn prop_clamped_units_never_exceed_available(
        requested in units(),
        available in units(),
        unit_price in price(),
    ) {
        if let Ok(result) = clamp_units(requested, available, unit_price, TOLERANCE) {
            prop_assert!(result <= available);
        }
    }

    /// Zero drift always passes through unchanged.
    #[test]
    fn prop_zero_drift_unmodified(amount in units(), unit_price in price()) {
        prop_assert_eq!(clamp_units(amount, amount, unit_price, TOLERANCE).unwrap(), amount);
    }

    /// Results are either the request or the available units, and failures
    /// only happen for requests above the available units.
    #[test]
    fn prop_clamp_outcomes(
        requested in units(),
        available in units(),
        unit_price in price(),
    ) {
        match clamp_units(requested, available, unit_price, TOLERANCE) {
            Ok(result) => prop_assert!(result == requested || result == available),
            Err(CapitalTransferError::ClampingToleranceExceeded { drift_value, .. }) => {
                prop_assert!(requested > available);
                prop_assert!(drift_value > TOLERANCE);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    /// Requested units carry at most five decimal places.
    #[test]
    fn prop_requested_units_scale(value in book_value(), unit_price in price()) {
        let result = requested_units(value, unit_price).unwrap();
        prop_assert!(result.scale() <= 5);
    }

    /// Moving the whole position moves its whole value, and any part moves
    /// no more than the whole.
    #[test]
    fn prop_proportional_value_bounded(
        total_fiat in book_value(),
        total_units in units().prop_filter("non-zero", |u| !u.is_zero()),
        share in 0u32..=100u32,
    ) {
        let whole = proportional_fiat_value(total_fiat, total_units, total_units).unwrap();
        prop_assert_eq!(whole, total_fiat);

        let part_units = (total_units * Decimal::from(share) / Decimal::from(100u32)).round_dp(5);
        let part = proportional_fiat_value(total_fiat, part_units, total_units).unwrap();
        prop_assert!(part >= Decimal::ZERO);
        prop_assert!(part <= total_fiat);
    }
}
