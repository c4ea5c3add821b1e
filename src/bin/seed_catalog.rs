//! Utility to load reference foods into the local catalog
//!
//! Usage: seed_catalog <foods.json>
//!
//! The file holds a JSON array of compositions:
//! `[{"name": "Chicken", "size": "100", "calories": "165", "nutrients": {"protein": "31"}}]`

use nutriledger::config::Config;
use nutriledger::db::{migrations, Database, SqliteCatalog};
use nutriledger::models::NutrientComposition;
use nutriledger::nutrition::REFERENCE_BASIS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: seed_catalog <foods.json>")?;

    let raw = std::fs::read_to_string(&path)?;
    let foods: Vec<NutrientComposition> = serde_json::from_str(&raw)?;
    println!("Read {} foods from {}", foods.len(), path);

    let config = Config::from_env();
    println!("Database path: {}", config.database_path.display());
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let database = Database::new(&config.database_path)?;

    database.with_conn_mut(|conn| {
        migrations::run_migrations(conn)?;

        let tx = conn.transaction()?;
        for food in &foods {
            if food.size() != REFERENCE_BASIS {
                println!("  warning: '{}' has size {}, expected {}", food.name(), food.size(), REFERENCE_BASIS);
            }
            SqliteCatalog::upsert(&tx, food)?;
        }
        tx.commit()?;

        println!("Catalog now holds {} foods", SqliteCatalog::count(conn)?);
        Ok(())
    })?;

    Ok(())
}
