//! Food catalog
//!
//! Resolves food names to reference compositions defined per 100 units.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::error::LedgerResult;
use crate::models::NutrientComposition;

pub use http::HttpCatalog;
pub use memory::InMemoryCatalog;

/// Lookup of reference compositions by food name
///
/// Lookups are read-only and safe to retry. Unknown foods fail with
/// `NotFound(Food, name)`; transient failures with `CatalogUnavailable`.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn lookup(&self, name: &str) -> LedgerResult<NutrientComposition>;
}
