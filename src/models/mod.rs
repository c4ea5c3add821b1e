//! Data models
//!
//! Nutrient compositions, the ledgers that aggregate them, and their containers.

mod composition;
mod container;
mod ledger;
mod nutrient;

pub use composition::NutrientComposition;
pub use container::{
    ContainerSummary, FixedName, NameGenerator, SequentialNames, DEFAULT_CONTAINER_NAMES,
};
pub use ledger::Ledger;
pub use nutrient::{Nutrient, NutrientAmounts, NutrientCategory};
