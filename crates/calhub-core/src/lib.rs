//! # Calhub Core Library
//!
//! This library provides the core logic for Calhub, a personal calendar
//! event store. Appointment records arrive from multiple upstream sources
//! (mail/calendar providers, ICS feeds) and are merged into a single local
//! SQLite database; date-filtered queries serve a web front end through the
//! CLI binary.
//!
//! ## Architecture
//!
//! - **Merge-Write Engine**: decides per candidate whether it is new, an
//!   update to an existing record, or a duplicate of a record from another
//!   source, and arbitrates conflicts by per-source precedence
//! - **Duplicate Finder**: tolerance-window matching on subject, start time
//!   and organizer
//! - **Suppression Lists**: user-declared exclusions of recurring series
//!   (by base id) or single occurrences (by event id), applied at query time
//! - **Storage**: one SQLite store with versioned migrations, plus
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`CalendarStore`]: the store handle owning every read and write path
//! - [`IncomingEvent`]: the upstream ingestion contract
//! - [`DedupRules`]: per-batch source precedence configuration
//! - [`Config`]: application configuration management

pub mod dedup;
pub mod error;
pub mod event;
pub mod store;
pub mod time;

pub use dedup::{DedupRules, Resolution};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use event::{base_id_from_event_id, Appointment, IncomingEvent};
pub use store::{data_dir, CalendarStore, Config, IgnoredOccurrence, IgnoredSeries};
