//! Runtime configuration
//!
//! Everything is read from the environment once at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::service::DEFAULT_CATALOG_TIMEOUT;

pub const DATABASE_PATH_VAR: &str = "NUTRILEDGER_DATABASE_PATH";
pub const CATALOG_URL_VAR: &str = "NUTRILEDGER_CATALOG_URL";
pub const CATALOG_TIMEOUT_VAR: &str = "NUTRILEDGER_CATALOG_TIMEOUT_MS";

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_DIRECTIVE: &str = "nutriledger=info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    /// Remote catalog base URL; the local `foods` table is used when absent
    pub catalog_url: Option<String>,
    pub catalog_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup(DATABASE_PATH_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let catalog_url = lookup(CATALOG_URL_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let catalog_timeout = match lookup(CATALOG_TIMEOUT_VAR) {
            None => DEFAULT_CATALOG_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    tracing::warn!(
                        value = %raw,
                        default_ms = DEFAULT_CATALOG_TIMEOUT.as_millis() as u64,
                        "Invalid {}, using default",
                        CATALOG_TIMEOUT_VAR
                    );
                    DEFAULT_CATALOG_TIMEOUT
                }
            },
        };

        Self {
            database_path,
            catalog_url,
            catalog_timeout,
        }
    }
}

/// `<project root>/data/nutriledger.db`, found from the executable location
pub fn default_database_path() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    // Go up from target/release or target/debug to project root
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(parent) = path.parent() {
            if let Some(grandparent) = parent.parent() {
                path = grandparent.to_path_buf();
            }
        }
    }

    path.push("data");
    path.push("nutriledger.db");
    path
}
