//! SQLite-backed ledger store
//!
//! Entries are kept as a JSON array on the container row. Saves compare and swap
//! on the `version` column.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::models::{Ledger, NutrientComposition};
use crate::store::Store;
use super::catalog::parse_decimal;
use super::{Database, DbError, DbResult};

/// Store over the `containers` table
#[derive(Clone)]
pub struct SqliteStore {
    database: Database,
}

impl SqliteStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    fn create_sync(conn: &Connection, record_id: i64, name: &str) -> DbResult<Ledger> {
        conn.execute(
            "INSERT INTO containers (record_id, name) VALUES (?1, ?2)",
            params![record_id, name],
        )?;
        Ok(Ledger::new(conn.last_insert_rowid(), record_id, name))
    }

    fn load_sync(conn: &Connection, container_id: i64) -> LedgerResult<Ledger> {
        let mut stmt = conn
            .prepare("SELECT * FROM containers WHERE id = ?1")
            .map_err(DbError::from)?;
        let raw = stmt
            .query_row([container_id], RawContainer::from_row)
            .optional()
            .map_err(DbError::from)?;

        match raw {
            Some(raw) => Ok(raw.decode()?),
            None => Err(LedgerError::not_found(EntityKind::Container, container_id)),
        }
    }

    fn save_sync(conn: &Connection, ledger: &Ledger) -> LedgerResult<Ledger> {
        let entries: Vec<&NutrientComposition> = ledger.get_all().collect();
        let entries_json = serde_json::to_string(&entries)
            .map_err(|e| DbError::Corrupt(e.to_string()))?;
        let expected = version_to_sql(ledger.version())?;

        let rows = conn
            .execute(
                r#"
                UPDATE containers SET
                    name = ?1,
                    consumed_calories = ?2,
                    entries = ?3,
                    version = version + 1,
                    updated_at = datetime('now')
                WHERE id = ?4 AND version = ?5
                "#,
                params![
                    ledger.name(),
                    ledger.consumed_calories().to_string(),
                    entries_json,
                    ledger.container_id(),
                    expected,
                ],
            )
            .map_err(DbError::from)?;

        if rows == 0 {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM containers WHERE id = ?1)",
                    [ledger.container_id()],
                    |row| row.get(0),
                )
                .map_err(DbError::from)?;

            return Err(if exists {
                LedgerError::Conflict {
                    container_id: ledger.container_id(),
                    expected_version: ledger.version(),
                }
            } else {
                LedgerError::not_found(EntityKind::Container, ledger.container_id())
            });
        }

        let mut saved = ledger.clone();
        saved.set_version(ledger.version() + 1);
        Ok(saved)
    }

    fn delete_sync(conn: &Connection, container_id: i64) -> LedgerResult<()> {
        let rows = conn
            .execute("DELETE FROM containers WHERE id = ?1", [container_id])
            .map_err(DbError::from)?;
        if rows == 0 {
            return Err(LedgerError::not_found(EntityKind::Container, container_id));
        }
        Ok(())
    }

    fn delete_record_sync(conn: &Connection, record_id: i64) -> DbResult<usize> {
        Ok(conn.execute("DELETE FROM containers WHERE record_id = ?1", [record_id])?)
    }

    fn list_sync(conn: &Connection, record_id: i64) -> LedgerResult<Vec<Ledger>> {
        let mut stmt = conn
            .prepare("SELECT * FROM containers WHERE record_id = ?1 ORDER BY id")
            .map_err(DbError::from)?;

        let raws = stmt
            .query_map([record_id], RawContainer::from_row)
            .map_err(DbError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::from)?;

        raws.into_iter().map(|raw| Ok(raw.decode()?)).collect()
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create(&self, record_id: i64, name: &str) -> LedgerResult<Ledger> {
        let name = name.to_string();
        self.database
            .run(move |conn| Self::create_sync(conn, record_id, &name))
            .await
            .map_err(LedgerError::from)
    }

    async fn load(&self, container_id: i64) -> LedgerResult<Ledger> {
        self.database
            .run(move |conn| Self::load_sync(conn, container_id))
            .await
    }

    async fn save(&self, ledger: &Ledger) -> LedgerResult<Ledger> {
        let ledger = ledger.clone();
        self.database
            .run(move |conn| Self::save_sync(conn, &ledger))
            .await
    }

    async fn delete(&self, container_id: i64) -> LedgerResult<()> {
        self.database
            .run(move |conn| Self::delete_sync(conn, container_id))
            .await
    }

    async fn delete_for_record(&self, record_id: i64) -> LedgerResult<usize> {
        self.database
            .run(move |conn| Self::delete_record_sync(conn, record_id))
            .await
            .map_err(LedgerError::from)
    }

    async fn list_for_record(&self, record_id: i64) -> LedgerResult<Vec<Ledger>> {
        self.database
            .run(move |conn| Self::list_sync(conn, record_id))
            .await
    }
}

fn version_to_sql(version: u64) -> DbResult<i64> {
    i64::try_from(version).map_err(|_| DbError::Corrupt(format!("version {} out of range", version)))
}

/// Container row as stored
struct RawContainer {
    id: i64,
    record_id: i64,
    name: String,
    consumed_calories: String,
    entries: String,
    version: i64,
}

impl RawContainer {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            record_id: row.get("record_id")?,
            name: row.get("name")?,
            consumed_calories: row.get("consumed_calories")?,
            entries: row.get("entries")?,
            version: row.get("version")?,
        })
    }

    fn decode(self) -> DbResult<Ledger> {
        let entries: Vec<NutrientComposition> = serde_json::from_str(&self.entries)
            .map_err(|e| DbError::Corrupt(format!("container {}: {}", self.id, e)))?;
        let version = u64::try_from(self.version)
            .map_err(|_| DbError::Corrupt(format!("container {}: negative version", self.id)))?;

        let ledger = Ledger::restore(self.id, self.record_id, self.name, entries, version)
            .map_err(|e| DbError::Corrupt(format!("container {}: {}", self.id, e)))?;

        // The column is denormalized; the entries win, but a mismatch is worth knowing about
        let stored_total = parse_decimal(&self.consumed_calories)?;
        if stored_total != ledger.consumed_calories() {
            tracing::warn!(
                container_id = self.id,
                stored = %stored_total,
                computed = %ledger.consumed_calories(),
                "Stored calorie total disagrees with entries"
            );
        }

        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::{Nutrient, NutrientAmounts};
    use rust_decimal_macros::dec;

    fn store() -> SqliteStore {
        let database = Database::in_memory().unwrap();
        database.with_conn(run_migrations).unwrap();
        SqliteStore::new(database)
    }

    fn chicken() -> NutrientComposition {
        NutrientComposition::new(
            "Chicken",
            dec!(100),
            dec!(200),
            NutrientAmounts::zero().with(Nutrient::Protein, dec!(31)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_preserves_entries() {
        let store = store();
        let mut ledger = store.create(9, "Lunch").await.unwrap();
        ledger.add_or_merge("Chicken", &chicken(), dec!(37.5)).unwrap();
        ledger.add_or_merge("Chicken", &chicken(), dec!(12.345)).unwrap();

        let saved = store.save(&ledger).await.unwrap();
        assert_eq!(saved.version(), 1);

        let loaded = store.load(ledger.container_id()).await.unwrap();
        assert_eq!(loaded, saved);
        let entry = loaded.get_by_name("Chicken").unwrap();
        assert_eq!(entry.size(), dec!(49.845));
        assert_eq!(entry.calories(), dec!(99.69));
        assert_eq!(entry.nutrient(Nutrient::Protein), dec!(15.45195));
    }

    #[tokio::test]
    async fn test_stale_write_conflicts() {
        let store = store();
        let created = store.create(1, "Dinner").await.unwrap();

        let mut first = store.load(created.container_id()).await.unwrap();
        let mut second = store.load(created.container_id()).await.unwrap();

        first.add_or_merge("Chicken", &chicken(), dec!(100)).unwrap();
        store.save(&first).await.unwrap();

        second.add_or_merge("Chicken", &chicken(), dec!(50)).unwrap();
        let err = store.save(&second).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::Conflict { container_id: created.container_id(), expected_version: 0 }
        );
        assert!(err.is_retryable());

        let current = store.load(created.container_id()).await.unwrap();
        assert_eq!(current.consumed_calories(), dec!(200));
    }

    #[tokio::test]
    async fn test_missing_container() {
        let store = store();
        assert!(store.load(404).await.unwrap_err().is_not_found());
        assert!(store.delete(404).await.unwrap_err().is_not_found());

        let ghost = Ledger::new(404, 1, "Ghost");
        assert!(store.save(&ghost).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = store();
        let a = store.create(3, "First Meal").await.unwrap();
        store.create(4, "Elsewhere").await.unwrap();
        let b = store.create(3, "Snacks").await.unwrap();

        let listed = store.list_for_record(3).await.unwrap();
        assert_eq!(
            listed.iter().map(|l| l.container_id()).collect::<Vec<_>>(),
            vec![a.container_id(), b.container_id()]
        );

        store.delete(a.container_id()).await.unwrap();
        assert_eq!(store.list_for_record(3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_for_record_keeps_other_records() {
        let store = store();
        store.create(5, "Breakfast").await.unwrap();
        store.create(5, "Lunch").await.unwrap();
        let kept = store.create(6, "Lunch").await.unwrap();

        assert_eq!(store.delete_for_record(5).await.unwrap(), 2);
        assert!(store.list_for_record(5).await.unwrap().is_empty());
        assert_eq!(store.list_for_record(6).await.unwrap(), vec![kept]);
        assert_eq!(store.delete_for_record(5).await.unwrap(), 0);
    }
}
