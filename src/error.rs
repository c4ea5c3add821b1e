//! Ledger error types
//!
//! One taxonomy for the engine, the ledger and its collaborators.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;

/// What kind of thing could not be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A food unknown to the catalog
    Food,
    /// A food not present in a container's ledger
    Entry,
    Container,
    Record,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Food => "food",
            EntityKind::Entry => "entry",
            EntityKind::Container => "container",
            EntityKind::Record => "record",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{kind} '{identifier}' not found")]
    NotFound { kind: EntityKind, identifier: String },

    #[error("Division by zero during {operation}")]
    DivisionByZero { operation: &'static str },

    #[error("Food catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Container {container_id} was modified concurrently (expected version {expected_version})")]
    Conflict { container_id: i64, expected_version: u64 },
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LedgerError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(kind: EntityKind, identifier: impl ToString) -> Self {
        LedgerError::NotFound {
            kind,
            identifier: identifier.to_string(),
        }
    }

    /// Transient infrastructure failures and write conflicts; retrying may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::CatalogUnavailable(_)
                | LedgerError::StoreUnavailable(_)
                | LedgerError::Conflict { .. }
        )
    }

    /// Contract violations rejected before any state changes
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation { .. } | LedgerError::DivisionByZero { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        LedgerError::StoreUnavailable(err.to_string())
    }
}
