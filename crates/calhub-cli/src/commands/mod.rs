pub mod cleanup;
pub mod events;
pub mod ignore;

use std::path::PathBuf;

use calhub_core::{CalendarStore, Config};

/// Resolve the store path: explicit flag, then config override, then the
/// default location.
pub fn resolve_db_path(db: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match db {
        Some(path) => Ok(path),
        None => {
            let config = Config::load_or_default();
            Ok(config.database_path()?)
        }
    }
}

/// Open the store, creating it if it does not exist yet.
pub fn open_store(db: Option<PathBuf>) -> Result<CalendarStore, Box<dyn std::error::Error>> {
    let path = resolve_db_path(db)?;
    Ok(CalendarStore::open(path)?)
}
