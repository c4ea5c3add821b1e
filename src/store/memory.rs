//! In-memory ledger store

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::models::Ledger;
use super::Store;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    ledgers: BTreeMap<i64, Ledger>,
}

/// Store that keeps ledgers in a map; for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create(&self, record_id: i64, name: &str) -> LedgerResult<Ledger> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let ledger = Ledger::new(inner.next_id, record_id, name);
        inner.ledgers.insert(ledger.container_id(), ledger.clone());
        Ok(ledger)
    }

    async fn load(&self, container_id: i64) -> LedgerResult<Ledger> {
        self.lock()
            .ledgers
            .get(&container_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(EntityKind::Container, container_id))
    }

    async fn save(&self, ledger: &Ledger) -> LedgerResult<Ledger> {
        let mut inner = self.lock();
        let stored = inner
            .ledgers
            .get_mut(&ledger.container_id())
            .ok_or_else(|| LedgerError::not_found(EntityKind::Container, ledger.container_id()))?;

        if stored.version() != ledger.version() {
            return Err(LedgerError::Conflict {
                container_id: ledger.container_id(),
                expected_version: ledger.version(),
            });
        }

        let mut saved = ledger.clone();
        saved.set_version(ledger.version() + 1);
        *stored = saved.clone();
        Ok(saved)
    }

    async fn delete(&self, container_id: i64) -> LedgerResult<()> {
        self.lock()
            .ledgers
            .remove(&container_id)
            .map(|_| ())
            .ok_or_else(|| LedgerError::not_found(EntityKind::Container, container_id))
    }

    async fn delete_for_record(&self, record_id: i64) -> LedgerResult<usize> {
        let mut inner = self.lock();
        let before = inner.ledgers.len();
        inner.ledgers.retain(|_, l| l.record_id() != record_id);
        Ok(before - inner.ledgers.len())
    }

    async fn list_for_record(&self, record_id: i64) -> LedgerResult<Vec<Ledger>> {
        Ok(self
            .lock()
            .ledgers
            .values()
            .filter(|l| l.record_id() == record_id)
            .cloned()
            .collect())
    }
}
