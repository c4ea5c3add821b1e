//! Additive merge of nutrient compositions

use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};
use crate::models::NutrientComposition;

/// Field-wise sum of two compositions
///
/// Size, calories and every nutrient are added; the name comes from `a`.
/// Whether the two describe the same food is the caller's concern.
pub fn combine(a: &NutrientComposition, b: &NutrientComposition) -> LedgerResult<NutrientComposition> {
    let size = checked_add(a.size(), b.size())?;
    let calories = checked_add(a.calories(), b.calories())?;
    let nutrients = a
        .nutrients()
        .try_zip_with(b.nutrients(), |_, x, y| checked_add(x, y))?;

    NutrientComposition::new(a.name(), size, calories, nutrients)
}

fn checked_add(lhs: Decimal, rhs: Decimal) -> LedgerResult<Decimal> {
    lhs.checked_add(rhs)
        .ok_or_else(|| LedgerError::validation("amount", format!("{} + {} overflows", lhs, rhs)))
}
