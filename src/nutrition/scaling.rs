//! Proportional scaling of nutrient compositions
//!
//! Two entry points: normalizing a catalog composition (defined per 100 units)
//! to a consumed amount, and rescaling an existing entry to a new amount.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{LedgerError, LedgerResult};
use crate::models::NutrientComposition;

/// Size every catalog composition is defined for
pub const REFERENCE_BASIS: Decimal = Decimal::ONE_HUNDRED;

/// Fractional digits kept when an entry shrinks
pub const SHRINK_SCALE: u32 = 2;

/// Normalize a reference composition (per 100 units) to `amount`
///
/// Every amount is multiplied by `amount / 100` without rounding.
pub fn normalize_from_reference(
    reference: &NutrientComposition,
    amount: Decimal,
) -> LedgerResult<NutrientComposition> {
    normalize_with_basis(reference, amount, REFERENCE_BASIS)
}

fn normalize_with_basis(
    reference: &NutrientComposition,
    amount: Decimal,
    basis: Decimal,
) -> LedgerResult<NutrientComposition> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation("amount", "must be greater than 0"));
    }
    let multiplier = checked_div(amount, basis, "normalize")?;

    tracing::debug!(
        food = reference.name(),
        %amount,
        %multiplier,
        "Normalizing reference composition"
    );

    multiply_all(reference, amount, multiplier)
}

/// Rescale an existing composition to `target_amount`
///
/// Shrinking computes `amount * target / size` for every field and rounds half-up
/// to two decimals; growing multiplies by `target / size` and keeps full precision.
pub fn rescale_to_amount(
    current: &NutrientComposition,
    target_amount: Decimal,
) -> LedgerResult<NutrientComposition> {
    if target_amount <= Decimal::ZERO || current.size() <= Decimal::ZERO {
        return Err(LedgerError::DivisionByZero { operation: "rescale" });
    }

    let size = current.size();

    if size == target_amount {
        return current.with_size(target_amount);
    }

    if size > target_amount {
        tracing::debug!(food = current.name(), %size, %target_amount, "Shrinking entry");

        let shrink = |amount: Decimal| -> LedgerResult<Decimal> {
            let mut rounded = checked_div(checked_mul(amount, target_amount)?, size, "rescale")?
                .round_dp_with_strategy(SHRINK_SCALE, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(SHRINK_SCALE);
            Ok(rounded)
        };

        let calories = shrink(current.calories())?;
        let nutrients = current.nutrients().try_map(|_, amount| shrink(amount))?;
        NutrientComposition::new(current.name(), target_amount, calories, nutrients)
    } else {
        let multiplier = checked_div(target_amount, size, "rescale")?;
        tracing::debug!(food = current.name(), %size, %target_amount, %multiplier, "Growing entry");

        multiply_all(current, target_amount, multiplier)
    }
}

/// Multiply calories and every nutrient, producing a composition of `size`
fn multiply_all(
    source: &NutrientComposition,
    size: Decimal,
    multiplier: Decimal,
) -> LedgerResult<NutrientComposition> {
    let calories = checked_mul(source.calories(), multiplier)?;
    let nutrients = source
        .nutrients()
        .try_map(|_, amount| checked_mul(amount, multiplier))?;
    NutrientComposition::new(source.name(), size, calories, nutrients)
}

fn checked_div(lhs: Decimal, rhs: Decimal, operation: &'static str) -> LedgerResult<Decimal> {
    if rhs.is_zero() {
        return Err(LedgerError::DivisionByZero { operation });
    }
    lhs.checked_div(rhs)
        .ok_or_else(|| LedgerError::validation("amount", format!("{} / {} overflows", lhs, rhs)))
}

fn checked_mul(lhs: Decimal, rhs: Decimal) -> LedgerResult<Decimal> {
    lhs.checked_mul(rhs)
        .ok_or_else(|| LedgerError::validation("amount", format!("{} * {} overflows", lhs, rhs)))
}
