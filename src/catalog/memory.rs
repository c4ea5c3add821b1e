//! In-memory catalog

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::models::NutrientComposition;
use super::Catalog;

/// Catalog held in a map; for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    foods: RwLock<HashMap<String, NutrientComposition>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_foods(foods: impl IntoIterator<Item = NutrientComposition>) -> Self {
        let catalog = Self::new();
        for food in foods {
            catalog.insert(food);
        }
        catalog
    }

    /// Insert or replace a reference composition
    pub fn insert(&self, food: NutrientComposition) {
        let mut foods = self.foods.write().unwrap_or_else(|e| e.into_inner());
        foods.insert(food.name().to_string(), food);
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn lookup(&self, name: &str) -> LedgerResult<NutrientComposition> {
        let foods = self.foods.read().unwrap_or_else(|e| e.into_inner());
        foods
            .get(name)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(EntityKind::Food, name))
    }
}
