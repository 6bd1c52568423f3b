mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, DatabaseConfig, DedupConfig, QueryConfig};
pub use database::{CalendarStore, IgnoredOccurrence, IgnoredSeries};

use std::path::PathBuf;

/// Returns `~/.config/calhub[-dev]/` based on CALHUB_ENV.
///
/// Set CALHUB_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CALHUB_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("calhub-dev")
    } else {
        base_dir.join("calhub")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
