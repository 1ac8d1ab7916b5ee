//! Fixed-scale conversion between marketplace decimals and base units.
//!
//! The ledger deals in integers of its smallest unit; the marketplace
//! deals in `Decimal` amounts. The scale is fixed at
//! [`constants::BASE_UNIT_SCALE`] (18) and conversion happens only here —
//! checked in both directions, never silently truncating.

use mandi_types::{constants, MandiError, Result};
use rust_decimal::Decimal;

/// Convert a marketplace amount into ledger base units.
///
/// # Errors
/// `AmountOverflow` if the amount is negative, carries more fractional
/// digits than the base-unit scale, or exceeds the representable range.
pub fn to_base_units(amount: Decimal) -> Result<u128> {
    if amount.is_sign_negative() {
        return Err(MandiError::AmountOverflow {
            reason: format!("negative amount {amount}"),
        });
    }
    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > constants::BASE_UNIT_SCALE {
        return Err(MandiError::AmountOverflow {
            reason: format!("{amount} has more than {} fractional digits", constants::BASE_UNIT_SCALE),
        });
    }

    #[allow(clippy::cast_sign_loss)] // non-negative checked above
    let mantissa = normalized.mantissa() as u128;
    let factor = 10u128.pow(constants::BASE_UNIT_SCALE - scale);
    mantissa
        .checked_mul(factor)
        .ok_or_else(|| MandiError::AmountOverflow {
            reason: format!("{amount} does not fit in base units"),
        })
}

/// Convert ledger base units into a marketplace amount.
///
/// # Errors
/// `AmountOverflow` if the value exceeds `Decimal`'s 96-bit mantissa.
pub fn from_base_units(units: u128) -> Result<Decimal> {
    let mantissa = i128::try_from(units).map_err(|_| MandiError::AmountOverflow {
        reason: format!("{units} base units exceed the decimal range"),
    })?;
    Decimal::try_from_i128_with_scale(mantissa, constants::BASE_UNIT_SCALE)
        .map(|amount| amount.normalize())
        .map_err(|e| MandiError::AmountOverflow {
            reason: format!("{units} base units: {e}"),
        })
}
