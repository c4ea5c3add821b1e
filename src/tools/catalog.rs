//! Food Catalog MCP Tools
//!
//! Maintain the local reference table and resolve foods through the active catalog.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::SqliteCatalog;
use crate::error::LedgerResult;
use crate::models::{NutrientAmounts, NutrientComposition};
use crate::nutrition::REFERENCE_BASIS;
use crate::service::LedgerService;
use super::containers::EntryView;

/// Response for upsert_catalog_food
#[derive(Debug, Serialize)]
pub struct UpsertCatalogFoodResponse {
    pub success: bool,
    pub message: String,
    pub food: EntryView,
}

/// Insert or replace a food in the local catalog
///
/// Nutrient names follow the wire form ("protein", "vitaminB12", ...).
/// The size defaults to the 100-unit reference basis.
pub async fn upsert_catalog_food(
    catalog: &SqliteCatalog,
    name: &str,
    size: Option<Decimal>,
    calories: Decimal,
    nutrients: &BTreeMap<String, Decimal>,
) -> LedgerResult<UpsertCatalogFoodResponse> {
    let amounts = NutrientAmounts::from_named(nutrients.iter().map(|(k, v)| (k.as_str(), *v)))?;
    let food = NutrientComposition::new(name.trim(), size.unwrap_or(REFERENCE_BASIS), calories, amounts)?;

    if food.size() != REFERENCE_BASIS {
        tracing::warn!(
            food = food.name(),
            size = %food.size(),
            "Catalog food not defined per {}; additions still scale from {}",
            REFERENCE_BASIS,
            REFERENCE_BASIS
        );
    }

    catalog.upsert_food(food.clone()).await?;
    tracing::info!(food = food.name(), calories = %food.calories(), "Upserted catalog food");

    Ok(UpsertCatalogFoodResponse {
        success: true,
        message: format!("Saved '{}' to the catalog", food.name()),
        food: EntryView::from(&food),
    })
}

/// Resolve a food through whichever catalog the service uses
pub async fn get_catalog_food(service: &LedgerService, name: &str) -> LedgerResult<EntryView> {
    let food = service.lookup_food(name).await?;
    Ok(EntryView::from(&food))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::db::migrations::run_migrations;
    use crate::db::{Database, SqliteStore};
    use crate::error::{EntityKind, LedgerError};
    use crate::models::Nutrient;
    use rust_decimal_macros::dec;

    fn setup() -> (SqliteCatalog, LedgerService) {
        let database = Database::in_memory().unwrap();
        database.with_conn(run_migrations).unwrap();
        let catalog = SqliteCatalog::new(database.clone());
        let service = LedgerService::new(
            Arc::new(catalog.clone()),
            Arc::new(SqliteStore::new(database)),
        );
        (catalog, service)
    }

    #[tokio::test]
    async fn test_upsert_then_resolve() {
        let (catalog, service) = setup();
        let nutrients = BTreeMap::from([
            ("protein".to_string(), dec!(10.2)),
            ("calcium".to_string(), dec!(110)),
        ]);

        let response = upsert_catalog_food(&catalog, "Greek Yogurt", None, dec!(97), &nutrients)
            .await
            .unwrap();
        assert_eq!(response.food.size, dec!(100));

        let view = get_catalog_food(&service, "Greek Yogurt").await.unwrap();
        assert_eq!(view.calories, dec!(97));
        assert_eq!(view.nutrients[&Nutrient::Calcium].amount, dec!(110));
        assert_eq!(view.nutrients[&Nutrient::Protein].unit, "g");

        let id = service.create_container(1, None).await.unwrap().container_id();
        let update = service.add_or_merge(id, "Greek Yogurt", dec!(170)).await.unwrap();
        assert_eq!(update.entry.calories(), dec!(164.9));
    }

    #[tokio::test]
    async fn test_rejects_unknown_nutrient_and_bad_values() {
        let (catalog, service) = setup();

        let nutrients = BTreeMap::from([("unobtainium".to_string(), dec!(1))]);
        let err = upsert_catalog_food(&catalog, "Rock", None, dec!(0), &nutrients)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = upsert_catalog_food(&catalog, "Air", None, dec!(-1), &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = get_catalog_food(&service, "Rock").await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Food, "Rock"));
    }
}
