//! Database module
//!
//! SQLite connection, migrations, and the SQLite-backed catalog and store.

pub mod catalog;
pub mod connection;
pub mod migrations;
pub mod store;

pub use catalog::SqliteCatalog;
pub use connection::{Database, DbError, DbResult};
pub use store::SqliteStore;
