//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
        tracing::info!("Applied schema migration v1");
    }

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Whether the schema is at the version this build expects
pub fn is_current(conn: &Connection) -> DbResult<bool> {
    Ok(get_schema_version(conn)? == SCHEMA_VERSION)
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- FOODS
        -- Reference compositions, per 100 units
        -- ============================================
        CREATE TABLE foods (
            name TEXT PRIMARY KEY,
            size TEXT NOT NULL DEFAULT '100',     -- decimal as text
            calories TEXT NOT NULL DEFAULT '0',   -- decimal as text
            nutrients TEXT NOT NULL DEFAULT '{}', -- JSON map nutrient -> decimal string

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ============================================
        -- CONTAINERS
        -- Meals of a daily record, each holding a ledger
        -- ============================================
        CREATE TABLE containers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id INTEGER NOT NULL,
            name TEXT NOT NULL,

            -- Denormalized total; the entries are authoritative
            consumed_calories TEXT NOT NULL DEFAULT '0',
            entries TEXT NOT NULL DEFAULT '[]',   -- JSON array of compositions

            -- Optimistic concurrency
            version INTEGER NOT NULL DEFAULT 0,

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_containers_record ON containers(record_id);
        "#,
    )?;

    Ok(())
}
