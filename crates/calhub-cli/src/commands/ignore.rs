use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum IgnoreAction {
    /// Recurring-series suppressions, keyed by base id
    Series {
        #[command(subcommand)]
        action: SeriesAction,
    },
    /// Single-occurrence suppressions, keyed by event id
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
}

#[derive(Subcommand)]
pub enum SeriesAction {
    /// List ignored series as JSON
    List,
    /// Add a base id to the ignored list
    Add {
        base_id: String,
        #[arg(default_value = "")]
        subject: String,
        #[arg(default_value = "User ignored")]
        reason: String,
    },
    /// Remove a base id from the ignored list
    Remove { base_id: String },
}

#[derive(Subcommand)]
pub enum EventAction {
    /// List ignored occurrences as JSON
    List,
    /// Add an event id to the ignored list
    Add {
        event_id: String,
        #[arg(default_value = "")]
        subject: String,
        #[arg(default_value = "")]
        start_time: String,
        #[arg(default_value = "User ignored")]
        reason: String,
    },
    /// Remove an event id from the ignored list
    Remove { event_id: String },
}

pub fn run(action: IgnoreAction, db: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(db)?;

    match action {
        IgnoreAction::Series { action } => match action {
            SeriesAction::List => {
                let ignored = store.ignored_base_ids_list()?;
                println!("{}", serde_json::to_string(&ignored)?);
            }
            SeriesAction::Add {
                base_id,
                subject,
                reason,
            } => {
                store.add_ignored_base_id(&base_id, &subject, &reason)?;
                println!("Added {base_id} to ignored list");
            }
            SeriesAction::Remove { base_id } => {
                store.remove_ignored_base_id(&base_id)?;
                println!("Removed {base_id} from ignored list");
            }
        },
        IgnoreAction::Event { action } => match action {
            EventAction::List => {
                let ignored = store.ignored_event_ids_list()?;
                println!("{}", serde_json::to_string(&ignored)?);
            }
            EventAction::Add {
                event_id,
                subject,
                start_time,
                reason,
            } => {
                store.add_ignored_event_id(&event_id, &subject, &start_time, &reason)?;
                println!("Added {event_id} to ignored list");
            }
            EventAction::Remove { event_id } => {
                store.remove_ignored_event_id(&event_id)?;
                println!("Removed {event_id} from ignored list");
            }
        },
    }

    Ok(())
}
