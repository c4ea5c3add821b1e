//! Container model
//!
//! Containers are the meals of a daily record; each one owns a ledger.

use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use serde::Serialize;

use super::Ledger;

/// Containers created for a fresh record
pub const DEFAULT_CONTAINER_NAMES: [&str; 4] = ["First Meal", "Second Meal", "Third Meal", "Snacks"];

/// Lightweight container listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSummary {
    pub id: i64,
    pub record_id: i64,
    pub name: String,
    pub consumed_calories: Decimal,
    pub entry_count: usize,
}

impl From<&Ledger> for ContainerSummary {
    fn from(ledger: &Ledger) -> Self {
        Self {
            id: ledger.container_id(),
            record_id: ledger.record_id(),
            name: ledger.name().to_string(),
            consumed_calories: ledger.consumed_calories(),
            entry_count: ledger.len(),
        }
    }
}

/// Source of names for containers created without one
pub trait NameGenerator: Send + Sync {
    fn next_name(&self) -> String;
}

/// "Default 1", "Default 2", ...
#[derive(Debug)]
pub struct SequentialNames {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialNames {
    fn default() -> Self {
        Self::new("Default")
    }
}

impl NameGenerator for SequentialNames {
    fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{} {}", self.prefix, n)
    }
}

/// Always the same name; useful when callers want predictable output
#[derive(Debug, Clone)]
pub struct FixedName(pub String);

impl NameGenerator for FixedName {
    fn next_name(&self) -> String {
        self.0.clone()
    }
}
