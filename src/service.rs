//! Ledger service
//!
//! Coordinates catalog lookups, ledger mutations and persistence. Every operation
//! on a container runs under that container's lock, from load to save.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::catalog::Catalog;
use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::models::{
    Ledger, NameGenerator, NutrientComposition, SequentialNames, DEFAULT_CONTAINER_NAMES,
};
use crate::store::Store;

/// Default bound on a single catalog lookup
pub const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_millis(3000);

/// Result of a mutation that touched one entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryUpdate {
    /// Ledger as saved, with its new version
    pub ledger: Ledger,
    pub entry: NutrientComposition,
}

type LockMap = HashMap<i64, Arc<AsyncMutex<()>>>;

/// Exclusive hold on one container
///
/// Dropping it releases the container and removes the map slot once no other
/// task holds or waits for it.
struct ContainerGuard {
    container_id: i64,
    locks: Arc<Mutex<LockMap>>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Release under the map lock so no waiter can clone the slot in between
        self.held.take();
        let unused = locks
            .get(&self.container_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if unused {
            locks.remove(&self.container_id);
        }
    }
}

#[derive(Clone)]
pub struct LedgerService {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn Store>,
    names: Arc<dyn NameGenerator>,
    catalog_timeout: Duration,
    locks: Arc<Mutex<LockMap>>,
}

impl LedgerService {
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn Store>) -> Self {
        Self {
            catalog,
            store,
            names: Arc::new(SequentialNames::default()),
            catalog_timeout: DEFAULT_CATALOG_TIMEOUT,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_names(mut self, names: Arc<dyn NameGenerator>) -> Self {
        self.names = names;
        self
    }

    pub fn with_catalog_timeout(mut self, timeout: Duration) -> Self {
        self.catalog_timeout = timeout;
        self
    }

    async fn lock(&self, container_id: i64) -> ContainerGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(container_id).or_default().clone()
        };
        ContainerGuard {
            container_id,
            locks: Arc::clone(&self.locks),
            held: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Resolve a food through the catalog, bounded by the lookup timeout
    pub async fn lookup_food(&self, name: &str) -> LedgerResult<NutrientComposition> {
        match tokio::time::timeout(self.catalog_timeout, self.catalog.lookup(name)).await {
            Ok(Ok(food)) => Ok(food),
            Ok(Err(err)) => {
                if err.is_retryable() {
                    tracing::warn!(food = name, error = %err, "Catalog lookup failed");
                }
                Err(err)
            }
            Err(_) => {
                tracing::warn!(food = name, timeout = ?self.catalog_timeout, "Catalog lookup timed out");
                Err(LedgerError::CatalogUnavailable(format!(
                    "lookup of '{}' timed out after {} ms",
                    name,
                    self.catalog_timeout.as_millis()
                )))
            }
        }
    }

    /// Persist a working copy, logging retryable failures
    async fn commit(&self, working: &Ledger) -> LedgerResult<Ledger> {
        self.store.save(working).await.map_err(|err| {
            if err.is_retryable() {
                tracing::warn!(container_id = working.container_id(), error = %err, "Save failed");
            }
            err
        })
    }

    // --- Entries ---

    /// Add an amount of a catalog food to a container, merging with an existing entry
    pub async fn add_or_merge(
        &self,
        container_id: i64,
        food: &str,
        amount: Decimal,
    ) -> LedgerResult<EntryUpdate> {
        let _guard = self.lock(container_id).await;

        let mut working = self.store.load(container_id).await?;
        let reference = self.lookup_food(food).await?;
        let entry = working.add_or_merge(food, &reference, amount)?.clone();
        let ledger = self.commit(&working).await?;

        tracing::info!(
            container_id,
            food,
            amount = %amount,
            consumed_calories = %ledger.consumed_calories(),
            "Added food"
        );
        Ok(EntryUpdate { ledger, entry })
    }

    /// Set the amount of an existing entry
    pub async fn change_amount(
        &self,
        container_id: i64,
        food: &str,
        new_amount: Decimal,
    ) -> LedgerResult<EntryUpdate> {
        let _guard = self.lock(container_id).await;

        let mut working = self.store.load(container_id).await?;
        let entry = working.change_amount(food, new_amount)?.clone();
        let ledger = self.commit(&working).await?;

        tracing::info!(
            container_id,
            food,
            amount = %new_amount,
            consumed_calories = %ledger.consumed_calories(),
            "Changed food amount"
        );
        Ok(EntryUpdate { ledger, entry })
    }

    /// Remove an entry; the update carries the removed composition
    pub async fn remove(&self, container_id: i64, food: &str) -> LedgerResult<EntryUpdate> {
        let _guard = self.lock(container_id).await;

        let mut working = self.store.load(container_id).await?;
        let entry = working.remove(food)?;
        let ledger = self.commit(&working).await?;

        tracing::info!(
            container_id,
            food,
            consumed_calories = %ledger.consumed_calories(),
            "Removed food"
        );
        Ok(EntryUpdate { ledger, entry })
    }

    pub async fn get_entry(&self, container_id: i64, food: &str) -> LedgerResult<NutrientComposition> {
        let _guard = self.lock(container_id).await;
        let ledger = self.store.load(container_id).await?;
        ledger.get_by_name(food).cloned()
    }

    // --- Containers ---

    /// Create a container; blank or missing names come from the name generator
    pub async fn create_container(&self, record_id: i64, name: Option<String>) -> LedgerResult<Ledger> {
        let name = match name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => self.names.next_name(),
        };

        let ledger = self.store.create(record_id, &name).await?;
        tracing::info!(record_id, container_id = ledger.container_id(), name = %name, "Created container");
        Ok(ledger)
    }

    /// Create the standard meals of a fresh record
    pub async fn create_default_containers(&self, record_id: i64) -> LedgerResult<Vec<Ledger>> {
        let mut created = Vec::with_capacity(DEFAULT_CONTAINER_NAMES.len());
        for name in DEFAULT_CONTAINER_NAMES {
            created.push(self.store.create(record_id, name).await?);
        }
        tracing::info!(record_id, count = created.len(), "Created default containers");
        Ok(created)
    }

    /// Containers of a record; a record without any is reported as not found
    pub async fn list_containers(&self, record_id: i64) -> LedgerResult<Vec<Ledger>> {
        let containers = self.store.list_for_record(record_id).await?;
        if containers.is_empty() {
            return Err(LedgerError::not_found(EntityKind::Record, record_id));
        }
        Ok(containers)
    }

    pub async fn get_container(&self, container_id: i64) -> LedgerResult<Ledger> {
        let _guard = self.lock(container_id).await;
        self.store.load(container_id).await
    }

    /// Load a container only if it belongs to `record_id`
    pub async fn get_record_container(&self, record_id: i64, container_id: i64) -> LedgerResult<Ledger> {
        let _guard = self.lock(container_id).await;
        self.load_owned(record_id, container_id).await
    }

    pub async fn delete_container(&self, container_id: i64) -> LedgerResult<()> {
        let _guard = self.lock(container_id).await;
        self.store.delete(container_id).await?;
        tracing::info!(container_id, "Deleted container");
        Ok(())
    }

    /// Delete a container only if it belongs to `record_id`
    pub async fn delete_record_container(&self, record_id: i64, container_id: i64) -> LedgerResult<()> {
        let _guard = self.lock(container_id).await;
        self.load_owned(record_id, container_id).await?;
        self.store.delete(container_id).await?;
        tracing::info!(record_id, container_id, "Deleted container");
        Ok(())
    }

    /// Delete every container of a record; a record without any is not an error
    pub async fn delete_containers_for_record(&self, record_id: i64) -> LedgerResult<usize> {
        let deleted = self.store.delete_for_record(record_id).await?;
        tracing::info!(record_id, deleted, "Deleted containers of record");
        Ok(deleted)
    }

    /// A container owned by another record is reported as missing
    async fn load_owned(&self, record_id: i64, container_id: i64) -> LedgerResult<Ledger> {
        let ledger = self.store.load(container_id).await?;
        if ledger.record_id() != record_id {
            tracing::debug!(record_id, container_id, owner = ledger.record_id(), "Container belongs to another record");
            return Err(LedgerError::not_found(EntityKind::Container, container_id));
        }
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::catalog::InMemoryCatalog;
    use crate::models::{FixedName, Nutrient, NutrientAmounts};
    use crate::store::InMemoryStore;
    use rust_decimal_macros::dec;

    fn chicken() -> NutrientComposition {
        NutrientComposition::new(
            "Chicken",
            dec!(100),
            dec!(200),
            NutrientAmounts::zero().with(Nutrient::Protein, dec!(31)),
        )
        .unwrap()
    }

    fn rice() -> NutrientComposition {
        NutrientComposition::new(
            "Rice",
            dec!(100),
            dec!(130),
            NutrientAmounts::zero().with(Nutrient::Carbohydrates, dec!(28.2)),
        )
        .unwrap()
    }

    fn service_with(store: Arc<dyn Store>) -> LedgerService {
        let catalog = Arc::new(InMemoryCatalog::with_foods([chicken(), rice()]));
        LedgerService::new(catalog, store)
    }

    fn service() -> LedgerService {
        service_with(Arc::new(InMemoryStore::new()))
    }

    /// Catalog that answers only after a delay
    struct SlowCatalog {
        delay: Duration,
    }

    #[async_trait]
    impl Catalog for SlowCatalog {
        async fn lookup(&self, _name: &str) -> LedgerResult<NutrientComposition> {
            tokio::time::sleep(self.delay).await;
            Ok(chicken())
        }
    }

    /// Store whose saves always fail
    struct ReadOnlyStore(InMemoryStore);

    #[async_trait]
    impl Store for ReadOnlyStore {
        async fn create(&self, record_id: i64, name: &str) -> LedgerResult<Ledger> {
            self.0.create(record_id, name).await
        }

        async fn load(&self, container_id: i64) -> LedgerResult<Ledger> {
            self.0.load(container_id).await
        }

        async fn save(&self, _ledger: &Ledger) -> LedgerResult<Ledger> {
            Err(LedgerError::StoreUnavailable("disk full".into()))
        }

        async fn delete(&self, container_id: i64) -> LedgerResult<()> {
            self.0.delete(container_id).await
        }

        async fn delete_for_record(&self, record_id: i64) -> LedgerResult<usize> {
            self.0.delete_for_record(record_id).await
        }

        async fn list_for_record(&self, record_id: i64) -> LedgerResult<Vec<Ledger>> {
            self.0.list_for_record(record_id).await
        }
    }

    /// Catalog that stores and matches names in lower case
    struct LowercaseCatalog(InMemoryCatalog);

    #[async_trait]
    impl Catalog for LowercaseCatalog {
        async fn lookup(&self, name: &str) -> LedgerResult<NutrientComposition> {
            self.0.lookup(&name.to_lowercase()).await
        }
    }

    #[tokio::test]
    async fn test_add_merge_remove_scenario() {
        let service = service();
        let meal = service.create_container(1, Some("Lunch".into())).await.unwrap();
        let id = meal.container_id();

        let update = service.add_or_merge(id, "Chicken", dec!(100)).await.unwrap();
        assert_eq!(update.entry.calories(), dec!(200));
        assert_eq!(update.ledger.consumed_calories(), dec!(200));

        let update = service.add_or_merge(id, "Chicken", dec!(50)).await.unwrap();
        assert_eq!(update.entry.size(), dec!(150));
        assert_eq!(update.entry.calories(), dec!(300));
        assert_eq!(update.ledger.len(), 1);

        let update = service.remove(id, "Chicken").await.unwrap();
        assert_eq!(update.entry.calories(), dec!(300));
        assert!(update.ledger.is_empty());
        assert_eq!(update.ledger.consumed_calories(), Decimal::ZERO);

        let stored = service.get_container(id).await.unwrap();
        assert_eq!(stored.version(), 3);
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_change_amount_persists() {
        let service = service();
        let id = service.create_container(1, None).await.unwrap().container_id();

        service.add_or_merge(id, "Rice", dec!(200)).await.unwrap();
        let update = service.change_amount(id, "Rice", dec!(50)).await.unwrap();
        assert_eq!(update.entry.calories(), dec!(65.00));
        assert_eq!(update.entry.nutrient(Nutrient::Carbohydrates), dec!(14.10));

        let entry = service.get_entry(id, "Rice").await.unwrap();
        assert_eq!(entry, update.entry);
    }

    #[tokio::test]
    async fn test_unknown_food_and_entry() {
        let service = service();
        let id = service.create_container(1, None).await.unwrap().container_id();

        let err = service.add_or_merge(id, "Dragonfruit", dec!(10)).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Food, "Dragonfruit"));

        let err = service.change_amount(id, "Chicken", dec!(10)).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Entry, "Chicken"));

        let err = service.remove(id, "Chicken").await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Entry, "Chicken"));

        let err = service.add_or_merge(999, "Chicken", dec!(10)).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Container, 999));

        assert_eq!(service.get_container(id).await.unwrap().version(), 0);
    }

    #[tokio::test]
    async fn test_catalog_timeout_leaves_ledger_unchanged() {
        let store = Arc::new(InMemoryStore::new());
        let slow = Arc::new(SlowCatalog { delay: Duration::from_millis(500) });
        let service = LedgerService::new(slow, store).with_catalog_timeout(Duration::from_millis(20));
        let id = service.create_container(1, None).await.unwrap().container_id();

        let err = service.add_or_merge(id, "Chicken", dec!(100)).await.unwrap_err();
        assert!(matches!(err, LedgerError::CatalogUnavailable(_)));
        assert!(err.is_retryable());

        let stored = service.get_container(id).await.unwrap();
        assert!(stored.is_empty());
        assert_eq!(stored.version(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_is_not_visible() {
        let inner = InMemoryStore::new();
        let id = inner.create(1, "Dinner").await.unwrap().container_id();
        let service = service_with(Arc::new(ReadOnlyStore(inner)));

        let err = service.add_or_merge(id, "Chicken", dec!(100)).await.unwrap_err();
        assert_eq!(err, LedgerError::StoreUnavailable("disk full".into()));

        let stored = service.get_container(id).await.unwrap();
        assert!(stored.is_empty());
        assert_eq!(stored.consumed_calories(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_serialized() {
        let service = Arc::new(service());
        let id = service.create_container(1, None).await.unwrap().container_id();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.add_or_merge(id, "Chicken", dec!(10)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = service.get_container(id).await.unwrap();
        let entry = stored.get_by_name("Chicken").unwrap();
        assert_eq!(entry.size(), dec!(100));
        assert_eq!(stored.consumed_calories(), dec!(200));
        assert_eq!(stored.version(), 10);
    }

    #[tokio::test]
    async fn test_container_lifecycle() {
        let service = service().with_names(Arc::new(FixedName("Unnamed".into())));

        let err = service.list_containers(7).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Record, 7));

        let defaults = service.create_default_containers(7).await.unwrap();
        let names: Vec<_> = defaults.iter().map(|l| l.name().to_string()).collect();
        assert_eq!(names, DEFAULT_CONTAINER_NAMES);

        let extra = service.create_container(7, Some("   ".into())).await.unwrap();
        assert_eq!(extra.name(), "Unnamed");
        assert_eq!(service.list_containers(7).await.unwrap().len(), 5);

        service.delete_container(extra.container_id()).await.unwrap();
        assert_eq!(service.list_containers(7).await.unwrap().len(), 4);

        let err = service.delete_container(extra.container_id()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_generated_names() {
        let service = service();
        let first = service.create_container(2, None).await.unwrap();
        let second = service.create_container(2, None).await.unwrap();
        assert_eq!(first.name(), "Default 1");
        assert_eq!(second.name(), "Default 2");
    }

    #[tokio::test]
    async fn test_entries_use_requested_name() {
        let lower_rice = NutrientComposition::new(
            "rice",
            dec!(100),
            dec!(130),
            NutrientAmounts::zero().with(Nutrient::Carbohydrates, dec!(28.2)),
        )
        .unwrap();
        let catalog = Arc::new(LowercaseCatalog(InMemoryCatalog::with_foods([lower_rice])));
        let service = LedgerService::new(catalog, Arc::new(InMemoryStore::new()));
        let id = service.create_container(1, None).await.unwrap().container_id();

        let update = service.add_or_merge(id, "Rice", dec!(200)).await.unwrap();
        assert_eq!(update.entry.name(), "Rice");

        let entry = service.get_entry(id, "Rice").await.unwrap();
        assert_eq!(entry.calories(), dec!(260));

        let update = service.change_amount(id, "Rice", dec!(100)).await.unwrap();
        assert_eq!(update.entry.calories(), dec!(130.00));

        let update = service.remove(id, "Rice").await.unwrap();
        assert!(update.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_locks_are_released() {
        let service = service();
        for id in 1..=1000 {
            assert!(service.get_container(id).await.unwrap_err().is_not_found());
        }
        assert_eq!(service.lock_count(), 0);

        let id = service.create_container(1, None).await.unwrap().container_id();
        service.add_or_merge(id, "Chicken", dec!(10)).await.unwrap();
        service.delete_container(id).await.unwrap();
        assert_eq!(service.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_lock_survives_waiters() {
        let service = Arc::new(service());
        let id = service.create_container(1, None).await.unwrap().container_id();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.add_or_merge(id, "Rice", dec!(5)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(service.get_container(id).await.unwrap().version(), 20);
        assert_eq!(service.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_record_ownership() {
        let service = service();
        let mine = service.create_container(1, Some("Lunch".into())).await.unwrap();
        let theirs = service.create_container(2, Some("Lunch".into())).await.unwrap();

        let loaded = service.get_record_container(1, mine.container_id()).await.unwrap();
        assert_eq!(loaded, mine);

        let err = service.get_record_container(1, theirs.container_id()).await.unwrap_err();
        assert_eq!(err, LedgerError::not_found(EntityKind::Container, theirs.container_id()));

        let err = service.delete_record_container(1, theirs.container_id()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(service.get_container(theirs.container_id()).await.unwrap(), theirs);

        service.delete_record_container(1, mine.container_id()).await.unwrap();
        assert!(service.get_container(mine.container_id()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_containers_for_record() {
        let service = service();
        service.create_default_containers(3).await.unwrap();
        let other = service.create_container(4, None).await.unwrap();

        assert_eq!(service.delete_containers_for_record(3).await.unwrap(), 4);
        assert!(service.list_containers(3).await.unwrap_err().is_not_found());
        assert_eq!(service.list_containers(4).await.unwrap(), vec![other]);
        assert_eq!(service.delete_containers_for_record(3).await.unwrap(), 0);
    }
}
