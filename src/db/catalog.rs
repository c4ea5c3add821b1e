//! SQLite-backed food catalog

use std::str::FromStr;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::error::{EntityKind, LedgerError, LedgerResult};
use crate::models::{NutrientAmounts, NutrientComposition};
use super::{Database, DbError, DbResult};

/// Catalog stored in the `foods` table
#[derive(Clone)]
pub struct SqliteCatalog {
    database: Database,
}

impl SqliteCatalog {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Insert or replace a reference composition
    pub fn upsert(conn: &Connection, food: &NutrientComposition) -> DbResult<()> {
        let nutrients = serde_json::to_string(food.nutrients())
            .map_err(|e| DbError::Corrupt(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO foods (name, size, calories, nutrients)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                size = excluded.size,
                calories = excluded.calories,
                nutrients = excluded.nutrients,
                updated_at = datetime('now')
            "#,
            params![
                food.name(),
                food.size().to_string(),
                food.calories().to_string(),
                nutrients,
            ],
        )?;
        Ok(())
    }

    /// Get a food by exact name
    pub fn get(conn: &Connection, name: &str) -> DbResult<Option<NutrientComposition>> {
        let mut stmt = conn.prepare("SELECT name, size, calories, nutrients FROM foods WHERE name = ?1")?;
        let raw = stmt.query_row([name], RawFood::from_row).optional()?;
        raw.map(RawFood::decode).transpose()
    }

    /// Number of foods in the catalog
    pub fn count(conn: &Connection) -> DbResult<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM foods", [], |row| row.get(0))?;
        Ok(count)
    }

    pub async fn upsert_food(&self, food: NutrientComposition) -> LedgerResult<()> {
        self.database
            .run(move |conn| Self::upsert(conn, &food))
            .await
            .map_err(|e| LedgerError::StoreUnavailable(e.to_string()))
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn lookup(&self, name: &str) -> LedgerResult<NutrientComposition> {
        let key = name.to_string();
        let found = self
            .database
            .run(move |conn| Self::get(conn, &key))
            .await
            .map_err(|e: DbError| LedgerError::CatalogUnavailable(e.to_string()))?;

        found.ok_or_else(|| LedgerError::not_found(EntityKind::Food, name))
    }
}

/// Row as stored, before decimal and JSON decoding
struct RawFood {
    name: String,
    size: String,
    calories: String,
    nutrients: String,
}

impl RawFood {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get("name")?,
            size: row.get("size")?,
            calories: row.get("calories")?,
            nutrients: row.get("nutrients")?,
        })
    }

    fn decode(self) -> DbResult<NutrientComposition> {
        let size = parse_decimal(&self.size)?;
        let calories = parse_decimal(&self.calories)?;
        let nutrients: NutrientAmounts = serde_json::from_str(&self.nutrients)
            .map_err(|e| DbError::Corrupt(format!("food '{}': {}", self.name, e)))?;

        NutrientComposition::new(self.name.clone(), size, calories, nutrients)
            .map_err(|e| DbError::Corrupt(format!("food '{}': {}", self.name, e)))
    }
}

pub(crate) fn parse_decimal(text: &str) -> DbResult<Decimal> {
    Decimal::from_str(text).map_err(|e| DbError::Corrupt(format!("'{}' is not a decimal: {}", text, e)))
}
