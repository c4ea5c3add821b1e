//! Nutrient composition model
//!
//! A named calorie and nutrient profile valid for a given size.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use super::{Nutrient, NutrientAmounts};

/// Immutable nutrient profile of a quantity of food
///
/// Fields are private so every value in circulation has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawComposition")]
pub struct NutrientComposition {
    name: String,
    size: Decimal,
    calories: Decimal,
    nutrients: NutrientAmounts,
}

/// Unvalidated wire form
#[derive(Deserialize)]
struct RawComposition {
    name: String,
    size: Decimal,
    calories: Decimal,
    #[serde(default)]
    nutrients: NutrientAmounts,
}

impl TryFrom<RawComposition> for NutrientComposition {
    type Error = LedgerError;

    fn try_from(raw: RawComposition) -> Result<Self, Self::Error> {
        NutrientComposition::new(raw.name, raw.size, raw.calories, raw.nutrients)
    }
}

impl NutrientComposition {
    /// Create a validated composition
    pub fn new(
        name: impl Into<String>,
        size: Decimal,
        calories: Decimal,
        nutrients: NutrientAmounts,
    ) -> LedgerResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::validation("name", "cannot be empty"));
        }
        if size <= Decimal::ZERO {
            return Err(LedgerError::validation("size", "must be greater than 0"));
        }
        if calories < Decimal::ZERO {
            return Err(LedgerError::validation("calories", "cannot be negative"));
        }
        if let Some((nutrient, _)) = nutrients.first_negative() {
            return Err(LedgerError::validation(nutrient.as_str(), "cannot be negative"));
        }

        Ok(Self {
            name,
            size,
            calories,
            nutrients,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> Decimal {
        self.size
    }

    pub fn calories(&self) -> Decimal {
        self.calories
    }

    pub fn nutrients(&self) -> &NutrientAmounts {
        &self.nutrients
    }

    pub fn nutrient(&self, nutrient: Nutrient) -> Decimal {
        self.nutrients.get(nutrient)
    }

    /// Same profile under a different name, validated
    pub(crate) fn with_name(self, name: &str) -> LedgerResult<Self> {
        if self.name == name {
            return Ok(self);
        }
        Self::new(name, self.size, self.calories, self.nutrients)
    }

    /// Same profile under a different size, validated
    pub(crate) fn with_size(&self, size: Decimal) -> LedgerResult<Self> {
        Self::new(self.name.clone(), size, self.calories, self.nutrients)
    }
}
