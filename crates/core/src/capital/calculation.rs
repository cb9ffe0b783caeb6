//! Unit and cost-basis calculations for capital transfers.
//!
//! Ownership units carry five decimal places; every intermediate result is
//! rounded half away from zero to that scale.

use rust_decimal::{Decimal, RoundingStrategy};

use super::error::CapitalTransferError;

/// Decimal places of ownership units and unit-denominated values.
pub const UNIT_SCALE: u32 = 5;

fn round_units(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Units bought by `book_value` at `unit_price`.
///
/// # Errors
///
/// `InvalidUnitPrice` for a non-positive price.
pub fn requested_units(
    book_value: Decimal,
    unit_price: Decimal,
) -> Result<Decimal, CapitalTransferError> {
    if unit_price <= Decimal::ZERO {
        return Err(CapitalTransferError::InvalidUnitPrice(unit_price));
    }
    book_value
        .checked_div(unit_price)
        .map(round_units)
        .ok_or(CapitalTransferError::Overflow)
}

/// Reconciles requested units with the seller's available units.
///
/// - No drift: the request is used as is.
/// - Drift worth at most `tolerance` at `unit_price`: clamps to `available`,
///   so rounding never strands or overdraws a dust position.
/// - Request above `available` beyond tolerance: fails.
/// - Request below `available` beyond tolerance: partial transfer of the
///   requested units.
///
/// # Errors
///
/// `ClampingToleranceExceeded` when the request exceeds the available units
/// by more than the tolerance.
pub fn clamp_units(
    requested: Decimal,
    available: Decimal,
    unit_price: Decimal,
    tolerance: Decimal,
) -> Result<Decimal, CapitalTransferError> {
    let diff = requested - available;
    if diff.is_zero() {
        return Ok(requested);
    }
    let drift_value = diff
        .abs()
        .checked_mul(unit_price)
        .ok_or(CapitalTransferError::Overflow)?;
    if drift_value <= tolerance {
        return Ok(available);
    }
    if diff.is_sign_positive() {
        return Err(CapitalTransferError::ClampingToleranceExceeded {
            requested,
            available,
            drift_value,
        });
    }
    Ok(requested)
}

/// Cost basis carried by `units` out of a position of `total_units` worth
/// `total_fiat`: `total_fiat * units / total_units`.
///
/// An empty position carries no value.
///
/// # Errors
///
/// `Overflow` if the product leaves the decimal range.
pub fn proportional_fiat_value(
    total_fiat: Decimal,
    units: Decimal,
    total_units: Decimal,
) -> Result<Decimal, CapitalTransferError> {
    if total_units.is_zero() {
        return Ok(Decimal::ZERO);
    }
    total_fiat
        .checked_mul(units)
        .and_then(|product| product.checked_div(total_units))
        .map(round_units)
        .ok_or(CapitalTransferError::Overflow)
}
