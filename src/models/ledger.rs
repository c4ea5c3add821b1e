//! Aggregation ledger model
//!
//! The per-container collection of food entries and its consumed-calorie total.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::nutrition::{combine, normalize_from_reference, rescale_to_amount};
use super::{NutrientAmounts, NutrientComposition};

/// Food entries of one container plus the derived calorie total
///
/// `consumed_calories` always equals the sum of entry calories. Every mutating
/// operation either fully applies or leaves the ledger untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ledger {
    container_id: i64,
    record_id: i64,
    name: String,
    entries: BTreeMap<String, NutrientComposition>,
    consumed_calories: Decimal,
    version: u64,
}

impl Ledger {
    /// Create an empty ledger for a new container
    pub fn new(container_id: i64, record_id: i64, name: impl Into<String>) -> Self {
        Self {
            container_id,
            record_id,
            name: name.into(),
            entries: BTreeMap::new(),
            consumed_calories: Decimal::ZERO,
            version: 0,
        }
    }

    /// Rebuild a ledger from persisted entries, recomputing the total
    pub fn restore(
        container_id: i64,
        record_id: i64,
        name: impl Into<String>,
        entries: impl IntoIterator<Item = NutrientComposition>,
        version: u64,
    ) -> LedgerResult<Self> {
        let mut ledger = Self::new(container_id, record_id, name);
        for entry in entries {
            let key = entry.name().to_string();
            if ledger.entries.insert(key.clone(), entry).is_some() {
                return Err(LedgerError::validation("entries", format!("duplicate entry '{}'", key)));
            }
        }
        ledger.consumed_calories = sum_calories(ledger.entries.values())?;
        ledger.version = version;
        Ok(ledger)
    }

    pub fn container_id(&self) -> i64 {
        self.container_id
    }

    pub fn record_id(&self) -> i64 {
        self.record_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn consumed_calories(&self) -> Decimal {
        self.consumed_calories
    }

    /// Persistence revision this ledger was loaded at
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, ordered by food name
    pub fn get_all(&self) -> impl Iterator<Item = &NutrientComposition> {
        self.entries.values()
    }

    pub fn get_by_name(&self, name: &str) -> LedgerResult<&NutrientComposition> {
        self.entries
            .get(name)
            .ok_or_else(|| LedgerError::not_found(EntityKind::Entry, name))
    }

    /// Add `amount` of a catalog food under `name`, merging with an existing entry
    ///
    /// `reference` is the catalog composition on the 100-unit basis. The entry is
    /// keyed by the requested name, whatever name the catalog reports.
    pub fn add_or_merge(
        &mut self,
        name: &str,
        reference: &NutrientComposition,
        amount: Decimal,
    ) -> LedgerResult<&NutrientComposition> {
        let to_add = normalize_from_reference(reference, amount)?.with_name(name)?;
        let entry = match self.entries.get(name) {
            Some(existing) => combine(existing, &to_add)?,
            None => to_add,
        };

        tracing::debug!(
            container_id = self.container_id,
            food = entry.name(),
            size = %entry.size(),
            calories = %entry.calories(),
            "Merging entry"
        );
        self.replace_entry(entry)
    }

    /// Replace an entry's amount, rescaling every field
    pub fn change_amount(
        &mut self,
        name: &str,
        new_amount: Decimal,
    ) -> LedgerResult<&NutrientComposition> {
        let current = self.get_by_name(name)?;
        let entry = rescale_to_amount(current, new_amount)?;
        self.replace_entry(entry)
    }

    /// Remove an entry, returning it
    pub fn remove(&mut self, name: &str) -> LedgerResult<NutrientComposition> {
        if !self.entries.contains_key(name) {
            return Err(LedgerError::not_found(EntityKind::Entry, name));
        }
        let total = sum_calories(self.entries.values().filter(|e| e.name() != name))?;

        let removed = self
            .entries
            .remove(name)
            .ok_or_else(|| LedgerError::not_found(EntityKind::Entry, name))?;
        self.consumed_calories = total;
        Ok(removed)
    }

    /// Sum of every nutrient across entries
    pub fn nutrient_totals(&self) -> LedgerResult<NutrientAmounts> {
        self.entries.values().try_fold(NutrientAmounts::zero(), |acc, entry| {
            acc.try_zip_with(entry.nutrients(), |_, x, y| {
                x.checked_add(y)
                    .ok_or_else(|| LedgerError::validation("nutrients", "total overflows"))
            })
        })
    }

    /// Insert or overwrite an entry keyed by its name and refresh the total
    fn replace_entry(&mut self, entry: NutrientComposition) -> LedgerResult<&NutrientComposition> {
        let key = entry.name().to_string();
        let others = self.entries.values().filter(|e| e.name() != key);
        let total = sum_calories(others.chain(std::iter::once(&entry)))?;

        self.entries.insert(key.clone(), entry);
        self.consumed_calories = total;
        self.get_by_name(&key)
    }
}

fn sum_calories<'a>(mut entries: impl Iterator<Item = &'a NutrientComposition>) -> LedgerResult<Decimal> {
    entries.try_fold(Decimal::ZERO, |acc, entry| {
        acc.checked_add(entry.calories())
            .ok_or_else(|| LedgerError::validation("consumed_calories", "total overflows"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Nutrient;
    use rust_decimal_macros::dec;

    fn reference(name: &str, calories: Decimal, protein: Decimal) -> NutrientComposition {
        NutrientComposition::new(
            name,
            dec!(100),
            calories,
            NutrientAmounts::zero().with(Nutrient::Protein, protein),
        )
        .unwrap()
    }

    fn assert_total_consistent(ledger: &Ledger) {
        let sum: Decimal = ledger.get_all().map(|e| e.calories()).sum();
        assert_eq!(ledger.consumed_calories(), sum);
    }

    #[test]
    fn test_new_ledger_is_empty() {
        let ledger = Ledger::new(1, 10, "First Meal");
        assert!(ledger.is_empty());
        assert_eq!(ledger.consumed_calories(), Decimal::ZERO);
        assert_eq!(ledger.version(), 0);
    }

    #[test]
    fn test_chicken_scenario() {
        let chicken = reference("Chicken", dec!(200), dec!(31));
        let mut ledger = Ledger::new(1, 10, "Lunch");

        ledger.add_or_merge("Chicken", &chicken, dec!(100)).unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.consumed_calories(), dec!(200));

        let merged = ledger.add_or_merge("Chicken", &chicken, dec!(50)).unwrap();
        assert_eq!(merged.calories(), dec!(300));
        assert_eq!(merged.size(), dec!(150));
        assert_eq!(merged.nutrient(Nutrient::Protein), dec!(46.5));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.consumed_calories(), dec!(300));

        let removed = ledger.remove("Chicken").unwrap();
        assert_eq!(removed.calories(), dec!(300));
        assert!(ledger.is_empty());
        assert_eq!(ledger.consumed_calories(), Decimal::ZERO);
    }

    #[test]
    fn test_change_amount_rescales_entry() {
        let mut ledger = Ledger::new(1, 10, "Dinner");
        ledger.add_or_merge("Chicken", &reference("Chicken", dec!(200), dec!(31)), dec!(100)).unwrap();
        ledger.add_or_merge("Rice", &reference("Rice", dec!(130), dec!(2.7)), dec!(200)).unwrap();
        assert_eq!(ledger.consumed_calories(), dec!(460));

        let changed = ledger.change_amount("Chicken", dec!(50)).unwrap();
        assert_eq!(changed.calories(), dec!(100.00));
        assert_eq!(ledger.consumed_calories(), dec!(360));

        let changed = ledger.change_amount("Rice", dec!(300)).unwrap();
        assert_eq!(changed.calories(), dec!(390));
        assert_eq!(ledger.consumed_calories(), dec!(490));
    }

    #[test]
    fn test_not_found_operations() {
        let mut ledger = Ledger::new(1, 10, "Snacks");
        let err = ledger.change_amount("Ghost", dec!(10)).unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Entry, "Ghost"));

        let err = ledger.remove("Ghost").unwrap_err();
        assert!(err.is_not_found());

        assert!(ledger.get_by_name("Ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_failed_operations_leave_ledger_unchanged() {
        let mut ledger = Ledger::new(1, 10, "Snacks");
        ledger.add_or_merge("Almonds", &reference("Almonds", dec!(579), dec!(21)), dec!(30)).unwrap();
        let before = ledger.clone();

        assert!(ledger.change_amount("Almonds", dec!(0)).is_err());
        assert!(ledger.add_or_merge("Almonds", &reference("Almonds", dec!(579), dec!(21)), dec!(-5)).is_err());
        assert!(ledger.remove("Cashews").is_err());

        assert_eq!(ledger, before);
    }

    #[test]
    fn test_total_invariant_over_operation_sequence() {
        let foods = [
            reference("Chicken", dec!(200), dec!(31)),
            reference("Rice", dec!(130), dec!(2.7)),
            reference("Broccoli", dec!(34), dec!(2.8)),
            reference("Olive Oil", dec!(884), dec!(0)),
        ];
        let amounts = [dec!(100), dec!(37.5), dec!(12), dec!(250), dec!(3), dec!(80)];

        let mut ledger = Ledger::new(7, 1, "Meal");
        // Deterministic walk over add/change/remove choices
        let mut state: u32 = 17;
        for step in 0..200 {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let food = &foods[(state >> 8) as usize % foods.len()];
            let amount = amounts[(state >> 16) as usize % amounts.len()];

            let result = match step % 3 {
                0 => ledger.add_or_merge(food.name(), food, amount).map(|_| ()),
                1 => ledger.change_amount(food.name(), amount).map(|_| ()),
                _ => ledger.remove(food.name()).map(|_| ()),
            };
            if let Err(err) = result {
                assert!(err.is_not_found(), "unexpected error {:?}", err);
            }
            assert_total_consistent(&ledger);
        }
    }

    #[test]
    fn test_entry_keyed_by_requested_name() {
        let mut ledger = Ledger::new(1, 10, "Lunch");
        let catalog_chicken = reference("Chicken Breast", dec!(165), dec!(31));

        let entry = ledger.add_or_merge("chicken", &catalog_chicken, dec!(100)).unwrap();
        assert_eq!(entry.name(), "chicken");
        ledger.add_or_merge("chicken", &catalog_chicken, dec!(100)).unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get_by_name("chicken").unwrap().calories(), dec!(330));
        assert!(ledger.get_by_name("Chicken Breast").is_err());

        ledger.change_amount("chicken", dec!(100)).unwrap();
        assert_eq!(ledger.consumed_calories(), dec!(165.00));
        assert!(ledger.add_or_merge("  ", &catalog_chicken, dec!(10)).unwrap_err().is_validation());
    }

    #[test]
    fn test_restore_recomputes_total() {
        let entries = vec![
            normalize_from_reference(&reference("Chicken", dec!(200), dec!(31)), dec!(150)).unwrap(),
            normalize_from_reference(&reference("Rice", dec!(130), dec!(2.7)), dec!(100)).unwrap(),
        ];
        let ledger = Ledger::restore(3, 1, "Lunch", entries, 4).unwrap();
        assert_eq!(ledger.consumed_calories(), dec!(430));
        assert_eq!(ledger.version(), 4);
        assert_eq!(
            ledger.get_all().map(|e| e.name()).collect::<Vec<_>>(),
            vec!["Chicken", "Rice"]
        );
    }

    #[test]
    fn test_restore_rejects_duplicates() {
        let rice = normalize_from_reference(&reference("Rice", dec!(130), dec!(2.7)), dec!(100)).unwrap();
        let err = Ledger::restore(3, 1, "Lunch", vec![rice.clone(), rice], 0).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_nutrient_totals() {
        let mut ledger = Ledger::new(1, 1, "Lunch");
        ledger.add_or_merge("Chicken", &reference("Chicken", dec!(200), dec!(31)), dec!(200)).unwrap();
        ledger.add_or_merge("Rice", &reference("Rice", dec!(130), dec!(2.7)), dec!(100)).unwrap();

        let totals = ledger.nutrient_totals().unwrap();
        assert_eq!(totals.get(Nutrient::Protein), dec!(64.7));
        assert_eq!(totals.get(Nutrient::Fat), Decimal::ZERO);
    }
}
