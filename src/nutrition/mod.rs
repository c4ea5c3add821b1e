//! Nutrient scaling and aggregation engine
//!
//! Pure functions over [`NutrientComposition`](crate::models::NutrientComposition) values.

pub mod combine;
pub mod scaling;

pub use combine::combine;
pub use scaling::{normalize_from_reference, rescale_to_amount, REFERENCE_BASIS, SHRINK_SCALE};
