//! Nutriledger
//!
//! An MCP server for per-meal nutrient aggregation.

use std::sync::Arc;

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use nutriledger::build_info;
use nutriledger::catalog::{Catalog, HttpCatalog};
use nutriledger::config::{Config, DEFAULT_LOG_DIRECTIVE};
use nutriledger::db::{self, Database, SqliteCatalog, SqliteStore};
use nutriledger::mcp::LedgerMcpService;
use nutriledger::service::LedgerService;
use nutriledger::tools::status::{CatalogSource, StatusTracker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(DEFAULT_LOG_DIRECTIVE.parse()?))
        .with_writer(std::io::stderr)
        .init();

    // Print startup banner to stderr
    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let config = Config::from_env();
    eprintln!("Database path: {}", config.database_path.display());

    // Ensure data directory exists
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    eprintln!("Initializing database...");
    let database = Database::new(&config.database_path)?;

    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        let foods = SqliteCatalog::count(conn)?;
        eprintln!("Database schema version: {} ({} catalog foods)", version, foods);
        if !db::migrations::is_current(conn)? {
            tracing::warn!(
                version,
                expected = db::migrations::SCHEMA_VERSION,
                "Database schema was written by a newer build"
            );
        }
        Ok(())
    })?;

    let local_catalog = SqliteCatalog::new(database.clone());
    let (catalog, source): (Arc<dyn Catalog>, CatalogSource) = match &config.catalog_url {
        Some(url) => {
            eprintln!("Remote catalog: {}", url);
            let remote = HttpCatalog::new(url, config.catalog_timeout)?;
            let source = CatalogSource::Remote {
                url: url.clone(),
                timeout_ms: config.catalog_timeout.as_millis() as u64,
            };
            (Arc::new(remote), source)
        }
        None => (Arc::new(local_catalog.clone()), CatalogSource::Local),
    };

    let ledger = LedgerService::new(catalog, Arc::new(SqliteStore::new(database)))
        .with_catalog_timeout(config.catalog_timeout);

    let service = LedgerMcpService::new(
        StatusTracker::new(config.database_path.clone(), source),
        ledger,
        local_catalog,
    );

    // Create stdio transport
    let transport = (stdin(), stdout());

    // Start the MCP server
    let server = service.serve(transport).await?;

    // Wait for the server to complete
    server.waiting().await?;

    Ok(())
}
