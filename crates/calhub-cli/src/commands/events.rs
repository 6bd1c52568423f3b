use std::path::PathBuf;

use calhub_core::{CalendarStore, Config, DatabaseError, ValidationError};
use clap::Args;

#[derive(Args)]
pub struct EventsArgs {
    /// Days ahead to include, 0-365
    #[arg(long)]
    pub days_ahead: Option<i64>,
    /// Days back to include, 0-365
    #[arg(long)]
    pub days_back: Option<i64>,
    /// Restrict results to one source
    #[arg(long)]
    pub source: Option<String>,
}

pub fn run(args: EventsArgs, db: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let days_ahead = args.days_ahead.unwrap_or(config.query.days_ahead);
    let days_back = args.days_back.unwrap_or(config.query.days_back);

    // Validate before touching storage so a bad parameter is reported as
    // such even when the store is missing.
    validate_days("days_ahead", days_ahead)?;
    validate_days("days_back", days_back)?;

    let path = super::resolve_db_path(db)?;
    if !path.exists() {
        return Err(Box::new(DatabaseError::NotFound(path)));
    }

    let store = CalendarStore::open(&path)?;
    let events = store.query_events(days_back, days_ahead, args.source.as_deref())?;
    println!("{}", serde_json::to_string(&events)?);
    Ok(())
}

fn validate_days(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if !(0..=365).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min: 0,
            max: 365,
        });
    }
    Ok(())
}
