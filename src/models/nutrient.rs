//! Nutrient keys and complete nutrient amount sets
//!
//! The key set is closed: every composition carries an amount for every nutrient.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Nutrient grouping used for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NutrientCategory {
    Vitamin,
    Mineral,
    Macronutrient,
}

/// A tracked nutrient
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Nutrient {
    VitaminA,
    VitaminD,
    VitaminE,
    VitaminK,
    VitaminC,
    VitaminB1,
    VitaminB2,
    VitaminB3,
    VitaminB5,
    VitaminB6,
    VitaminB7,
    VitaminB9,
    VitaminB12,
    Calcium,
    Phosphorus,
    Magnesium,
    Sodium,
    Potassium,
    Chloride,
    Iron,
    Zinc,
    Copper,
    Manganese,
    Iodine,
    Selenium,
    Fluoride,
    Chromium,
    Molybdenum,
    Carbohydrates,
    Protein,
    Fat,
    Fiber,
    TransFat,
    SaturatedFat,
    Sugar,
    PolyunsaturatedFat,
    MonounsaturatedFat,
}

impl Nutrient {
    pub const COUNT: usize = 37;

    /// Every nutrient, in declaration order
    pub const ALL: [Nutrient; Nutrient::COUNT] = [
        Nutrient::VitaminA,
        Nutrient::VitaminD,
        Nutrient::VitaminE,
        Nutrient::VitaminK,
        Nutrient::VitaminC,
        Nutrient::VitaminB1,
        Nutrient::VitaminB2,
        Nutrient::VitaminB3,
        Nutrient::VitaminB5,
        Nutrient::VitaminB6,
        Nutrient::VitaminB7,
        Nutrient::VitaminB9,
        Nutrient::VitaminB12,
        Nutrient::Calcium,
        Nutrient::Phosphorus,
        Nutrient::Magnesium,
        Nutrient::Sodium,
        Nutrient::Potassium,
        Nutrient::Chloride,
        Nutrient::Iron,
        Nutrient::Zinc,
        Nutrient::Copper,
        Nutrient::Manganese,
        Nutrient::Iodine,
        Nutrient::Selenium,
        Nutrient::Fluoride,
        Nutrient::Chromium,
        Nutrient::Molybdenum,
        Nutrient::Carbohydrates,
        Nutrient::Protein,
        Nutrient::Fat,
        Nutrient::Fiber,
        Nutrient::TransFat,
        Nutrient::SaturatedFat,
        Nutrient::Sugar,
        Nutrient::PolyunsaturatedFat,
        Nutrient::MonounsaturatedFat,
    ];

    /// Position of this nutrient in `ALL`
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Nutrient::VitaminA => "vitaminA",
            Nutrient::VitaminD => "vitaminD",
            Nutrient::VitaminE => "vitaminE",
            Nutrient::VitaminK => "vitaminK",
            Nutrient::VitaminC => "vitaminC",
            Nutrient::VitaminB1 => "vitaminB1",
            Nutrient::VitaminB2 => "vitaminB2",
            Nutrient::VitaminB3 => "vitaminB3",
            Nutrient::VitaminB5 => "vitaminB5",
            Nutrient::VitaminB6 => "vitaminB6",
            Nutrient::VitaminB7 => "vitaminB7",
            Nutrient::VitaminB9 => "vitaminB9",
            Nutrient::VitaminB12 => "vitaminB12",
            Nutrient::Calcium => "calcium",
            Nutrient::Phosphorus => "phosphorus",
            Nutrient::Magnesium => "magnesium",
            Nutrient::Sodium => "sodium",
            Nutrient::Potassium => "potassium",
            Nutrient::Chloride => "chloride",
            Nutrient::Iron => "iron",
            Nutrient::Zinc => "zinc",
            Nutrient::Copper => "copper",
            Nutrient::Manganese => "manganese",
            Nutrient::Iodine => "iodine",
            Nutrient::Selenium => "selenium",
            Nutrient::Fluoride => "fluoride",
            Nutrient::Chromium => "chromium",
            Nutrient::Molybdenum => "molybdenum",
            Nutrient::Carbohydrates => "carbohydrates",
            Nutrient::Protein => "protein",
            Nutrient::Fat => "fat",
            Nutrient::Fiber => "fiber",
            Nutrient::TransFat => "transFat",
            Nutrient::SaturatedFat => "saturatedFat",
            Nutrient::Sugar => "sugar",
            Nutrient::PolyunsaturatedFat => "polyunsaturatedFat",
            Nutrient::MonounsaturatedFat => "monounsaturatedFat",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Nutrient::ALL.into_iter().find(|n| n.as_str().eq_ignore_ascii_case(s))
    }

    /// Unit the amount is expressed in
    pub fn unit(&self) -> &'static str {
        match self {
            Nutrient::VitaminA
            | Nutrient::VitaminD
            | Nutrient::VitaminK
            | Nutrient::VitaminB7
            | Nutrient::VitaminB9
            | Nutrient::VitaminB12
            | Nutrient::Iodine
            | Nutrient::Selenium
            | Nutrient::Chromium
            | Nutrient::Molybdenum => "µg",
            Nutrient::Carbohydrates
            | Nutrient::Protein
            | Nutrient::Fat
            | Nutrient::Fiber
            | Nutrient::TransFat
            | Nutrient::SaturatedFat
            | Nutrient::Sugar
            | Nutrient::PolyunsaturatedFat
            | Nutrient::MonounsaturatedFat => "g",
            _ => "mg",
        }
    }

    pub fn category(&self) -> NutrientCategory {
        match self.index() {
            i if i <= Nutrient::VitaminB12.index() => NutrientCategory::Vitamin,
            i if i <= Nutrient::Molybdenum.index() => NutrientCategory::Mineral,
            _ => NutrientCategory::Macronutrient,
        }
    }
}

impl fmt::Display for Nutrient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An amount for every nutrient
///
/// Backed by an array indexed by [`Nutrient`], so a partial record cannot exist.
/// Serialized as a map keyed by nutrient name; nutrients missing from the input
/// deserialize as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<Nutrient, Decimal>",
    into = "BTreeMap<Nutrient, Decimal>"
)]
pub struct NutrientAmounts {
    amounts: [Decimal; Nutrient::COUNT],
}

impl NutrientAmounts {
    pub fn zero() -> Self {
        Self {
            amounts: [Decimal::ZERO; Nutrient::COUNT],
        }
    }

    pub fn from_fn(mut f: impl FnMut(Nutrient) -> Decimal) -> Self {
        let mut amounts = [Decimal::ZERO; Nutrient::COUNT];
        for nutrient in Nutrient::ALL {
            amounts[nutrient.index()] = f(nutrient);
        }
        Self { amounts }
    }

    pub fn get(&self, nutrient: Nutrient) -> Decimal {
        self.amounts[nutrient.index()]
    }

    /// Copy with one amount replaced
    pub fn with(mut self, nutrient: Nutrient, amount: Decimal) -> Self {
        self.amounts[nutrient.index()] = amount;
        self
    }

    /// (nutrient, amount) pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, Decimal)> + '_ {
        Nutrient::ALL.into_iter().map(move |n| (n, self.get(n)))
    }

    /// Apply a fallible function to every amount
    pub fn try_map<F>(&self, mut f: F) -> LedgerResult<Self>
    where
        F: FnMut(Nutrient, Decimal) -> LedgerResult<Decimal>,
    {
        let mut amounts = [Decimal::ZERO; Nutrient::COUNT];
        for (nutrient, amount) in self.iter() {
            amounts[nutrient.index()] = f(nutrient, amount)?;
        }
        Ok(Self { amounts })
    }

    /// Combine two amount sets key by key
    pub fn try_zip_with<F>(&self, other: &NutrientAmounts, mut f: F) -> LedgerResult<Self>
    where
        F: FnMut(Nutrient, Decimal, Decimal) -> LedgerResult<Decimal>,
    {
        self.try_map(|nutrient, amount| f(nutrient, amount, other.get(nutrient)))
    }

    /// First nutrient with a negative amount, if any
    pub fn first_negative(&self) -> Option<(Nutrient, Decimal)> {
        self.iter().find(|(_, amount)| amount.is_sign_negative() && !amount.is_zero())
    }

    /// Parse a name → amount map, rejecting unknown nutrient names
    pub fn from_named<'a, I>(entries: I) -> LedgerResult<Self>
    where
        I: IntoIterator<Item = (&'a str, Decimal)>,
    {
        let mut amounts = Self::zero();
        for (name, amount) in entries {
            let nutrient = Nutrient::from_str(name)
                .ok_or_else(|| LedgerError::validation("nutrients", format!("unknown nutrient '{}'", name)))?;
            amounts = amounts.with(nutrient, amount);
        }
        Ok(amounts)
    }
}

impl Default for NutrientAmounts {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<BTreeMap<Nutrient, Decimal>> for NutrientAmounts {
    fn from(map: BTreeMap<Nutrient, Decimal>) -> Self {
        Self::from_fn(|n| map.get(&n).copied().unwrap_or(Decimal::ZERO))
    }
}

impl From<NutrientAmounts> for BTreeMap<Nutrient, Decimal> {
    fn from(amounts: NutrientAmounts) -> Self {
        amounts.iter().collect()
    }
}
