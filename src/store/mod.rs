//! Ledger persistence
//!
//! Load/save of ledgers by container id, with optimistic concurrency on save.

pub mod memory;

use async_trait::async_trait;

use crate::error::LedgerResult;
use crate::models::Ledger;

pub use memory::InMemoryStore;

/// Persistence boundary for container ledgers
///
/// `save` succeeds only if the stored version still equals `ledger.version()`;
/// otherwise it fails with `Conflict`. The returned ledger carries the new version.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create an empty container
    async fn create(&self, record_id: i64, name: &str) -> LedgerResult<Ledger>;

    async fn load(&self, container_id: i64) -> LedgerResult<Ledger>;

    async fn save(&self, ledger: &Ledger) -> LedgerResult<Ledger>;

    async fn delete(&self, container_id: i64) -> LedgerResult<()>;

    /// Delete every container of a record, returning how many went
    async fn delete_for_record(&self, record_id: i64) -> LedgerResult<usize>;

    /// All containers of a record, ordered by id
    async fn list_for_record(&self, record_id: i64) -> LedgerResult<Vec<Ledger>>;
}
