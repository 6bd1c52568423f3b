//! SQLite-backed calendar event store.
//!
//! One `CalendarStore` wraps one connection and owns every read and write
//! path: the merge-write engine with its duplicate finder and precedence
//! arbitration, the two suppression lists, the date-windowed query service,
//! and the one-shot duplicate cleanup pass.
//!
//! Single-writer model: all mutating operations are synchronous and rely on
//! SQLite's per-statement commit for atomicity. No transaction spans a
//! batch: a failure on one candidate must not roll back or abort the rest.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::migrations;
use super::Config;
use crate::dedup::{DedupRules, Resolution};
use crate::error::{CoreError, DatabaseError};
use crate::event::{base_id_from_event_id, Appointment, IncomingEvent};
use crate::time;

/// Pre-filter and fine-check window for duplicate detection, in seconds.
const DUPLICATE_WINDOW_SECS: i64 = 60;

/// A suppressed recurring series, as listed to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoredSeries {
    pub base_id: String,
    pub subject: String,
    pub ignored_at: String,
}

/// A suppressed single occurrence, as listed to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoredOccurrence {
    pub event_id: String,
    pub subject: String,
    pub start_time: String,
    pub ignored_at: String,
}

enum WriteDisposition {
    Inserted,
    Updated,
    Skipped,
}

/// SQLite database for calendar events.
///
/// Explicitly constructed and passed to every caller; there is no
/// process-wide store singleton.
pub struct CalendarStore {
    conn: Connection,
}

impl CalendarStore {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the store at `path` and run migrations.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open the store at the configured location
    /// (`~/.config/calhub/calendar.db` unless overridden).
    ///
    /// # Errors
    /// Returns an error if the path cannot be resolved or the database
    /// cannot be opened.
    pub fn open_default() -> Result<Self, CoreError> {
        let config = Config::load_or_default();
        let path = config.database_path()?;
        Ok(Self::open(path)?)
    }

    /// Open an in-memory store (for tests).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|e| DatabaseError::OpenFailed {
            path: ":memory:".into(),
            source: e,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        migrations::migrate(&self.conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Server-assigned timestamp for created_at / updated_at / ignored_at.
    fn now_string() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
    }

    // === Merge-write engine ===

    /// Save a batch of candidate events, deduplicating as it goes.
    ///
    /// Candidates are processed independently and in input order. Returns
    /// `(inserted, updated)`. A failure on one candidate is logged and does
    /// not abort the remaining candidates; the failed item is simply not
    /// counted.
    pub fn save_appointments(
        &self,
        appointments: &[IncomingEvent],
        rules: &DedupRules,
    ) -> (usize, usize) {
        let mut inserted = 0usize;
        let mut updated = 0usize;

        let now = Self::now_string();

        for event in appointments {
            if event.id.is_empty() {
                continue;
            }
            match self.save_one(event, rules, &now) {
                Ok(WriteDisposition::Inserted) => inserted += 1,
                Ok(WriteDisposition::Updated) => updated += 1,
                Ok(WriteDisposition::Skipped) => {}
                Err(e) => {
                    warn!(event_id = %event.id, error = %e, "failed to save appointment, continuing");
                }
            }
        }

        (inserted, updated)
    }

    fn save_one(
        &self,
        event: &IncomingEvent,
        rules: &DedupRules,
        now: &str,
    ) -> Result<WriteDisposition, DatabaseError> {
        let existing_source: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT source FROM appointments WHERE id = ?1",
                params![event.id],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(existing_source) = existing_source {
            return match rules.resolve(existing_source.as_deref().unwrap_or("")) {
                Resolution::Overwrite => {
                    self.update_appointment(&event.id, event, now)?;
                    Ok(WriteDisposition::Updated)
                }
                Resolution::KeepExisting => {
                    debug!(event_id = %event.id, "existing record outranks candidate, skipping");
                    Ok(WriteDisposition::Skipped)
                }
                Resolution::SkipSameSource => {
                    debug!(event_id = %event.id, "candidate ties with existing record, skipping");
                    Ok(WriteDisposition::Skipped)
                }
            };
        }

        let duplicate_id = self.find_duplicate(
            event.subject.as_deref().unwrap_or(""),
            event.start_time.as_deref().unwrap_or(""),
            event.organizer_email.as_deref().unwrap_or(""),
            event.source.as_deref().unwrap_or(""),
            Some(&event.id),
        );

        match duplicate_id {
            None => {
                self.insert_appointment(event, now)?;
                Ok(WriteDisposition::Inserted)
            }
            Some(duplicate_id) => {
                let duplicate_source: Option<Option<String>> = self
                    .conn
                    .query_row(
                        "SELECT source FROM appointments WHERE id = ?1",
                        params![duplicate_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let duplicate_source = duplicate_source.flatten().unwrap_or_default();

                match rules.resolve(&duplicate_source) {
                    Resolution::Overwrite => {
                        // The duplicate's id survives; the candidate's own
                        // id is discarded.
                        self.update_appointment(&duplicate_id, event, now)?;
                        Ok(WriteDisposition::Updated)
                    }
                    Resolution::KeepExisting | Resolution::SkipSameSource => {
                        debug!(
                            event_id = %event.id,
                            duplicate_id = %duplicate_id,
                            "duplicate outranks or ties with candidate, skipping"
                        );
                        Ok(WriteDisposition::Skipped)
                    }
                }
            }
        }
    }

    fn insert_appointment(&self, event: &IncomingEvent, now: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO appointments
             (id, subject, start_time, end_time, location, organizer_email,
              organizer_name, attendees, body_preview, is_all_day, source,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                event.id,
                event.subject.as_deref().unwrap_or(""),
                event.start_time.as_deref().unwrap_or(""),
                event.end_time.as_deref().unwrap_or(""),
                event.location.as_deref().unwrap_or(""),
                event.organizer_email.as_deref().unwrap_or(""),
                event.organizer_name.as_deref().unwrap_or(""),
                event.attendees.as_deref().unwrap_or("[]"),
                event.body_preview.as_deref().unwrap_or(""),
                event.is_all_day.unwrap_or(0),
                event.source.as_deref().unwrap_or(""),
                now,
                now,
            ],
        )?;
        Ok(())
    }

    fn update_appointment(
        &self,
        id: &str,
        event: &IncomingEvent,
        now: &str,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "UPDATE appointments
             SET subject = ?1, start_time = ?2, end_time = ?3, location = ?4,
                 organizer_email = ?5, organizer_name = ?6, attendees = ?7,
                 body_preview = ?8, is_all_day = ?9, source = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                event.subject.as_deref().unwrap_or(""),
                event.start_time.as_deref().unwrap_or(""),
                event.end_time.as_deref().unwrap_or(""),
                event.location.as_deref().unwrap_or(""),
                event.organizer_email.as_deref().unwrap_or(""),
                event.organizer_name.as_deref().unwrap_or(""),
                event.attendees.as_deref().unwrap_or("[]"),
                event.body_preview.as_deref().unwrap_or(""),
                event.is_all_day.unwrap_or(0),
                event.source.as_deref().unwrap_or(""),
                now,
                id,
            ],
        )?;
        Ok(())
    }

    // === Duplicate finder ===

    /// Find a stored record describing the same real-world event.
    ///
    /// A match shares the exact subject, starts strictly less than 60
    /// seconds away once both times are normalized to UTC, and has the same
    /// organizer (empty organizer equals empty organizer, it is not a
    /// wildcard). The match is not restricted to records from the same
    /// source; `source` feeds the precedence decision and the logs.
    ///
    /// Returns the first match encountered. The window is narrow enough
    /// that multiple true matches do not occur in practice, so no
    /// tie-breaking is attempted.
    ///
    /// An unparsable `start_time` means no duplicate claim can be made and
    /// yields `None`, as does any internal failure.
    pub fn find_duplicate(
        &self,
        subject: &str,
        start_time: &str,
        organizer_email: &str,
        source: &str,
        exclude_id: Option<&str>,
    ) -> Option<String> {
        let start = time::parse_iso_datetime(start_time)?;

        match self.try_find_duplicate(subject, start, organizer_email, exclude_id) {
            Ok(found) => found,
            Err(e) => {
                warn!(subject, source, error = %e, "error finding duplicate");
                None
            }
        }
    }

    fn try_find_duplicate(
        &self,
        subject: &str,
        start: chrono::DateTime<chrono::FixedOffset>,
        organizer_email: &str,
        exclude_id: Option<&str>,
    ) -> Result<Option<String>, DatabaseError> {
        let start_utc = time::normalize_to_utc(start);

        // Coarse pre-filter in SQL on the raw start_time text, fine-grained
        // UTC check below.
        let window_start = (start_utc - Duration::seconds(DUPLICATE_WINDOW_SECS))
            .to_rfc3339_opts(SecondsFormat::AutoSi, false);
        let window_end = (start_utc + Duration::seconds(DUPLICATE_WINDOW_SECS))
            .to_rfc3339_opts(SecondsFormat::AutoSi, false);

        type CandidateRow = (String, Option<String>, Option<String>);
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<CandidateRow> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        };

        // Skip rows the mapper fails on rather than failing the search.
        let candidates: Vec<CandidateRow> = if let Some(exclude_id) = exclude_id {
            let mut stmt = self.conn.prepare(
                "SELECT id, start_time, organizer_email FROM appointments
                 WHERE subject = ?1 AND start_time >= ?2 AND start_time <= ?3
                 AND id != ?4",
            )?;
            let rows = stmt.query_map(
                params![subject, window_start, window_end, exclude_id],
                map_row,
            )?;
            rows.filter_map(|r| r.ok()).collect()
        } else {
            let mut stmt = self.conn.prepare(
                "SELECT id, start_time, organizer_email FROM appointments
                 WHERE subject = ?1 AND start_time >= ?2 AND start_time <= ?3",
            )?;
            let rows = stmt.query_map(params![subject, window_start, window_end], map_row)?;
            rows.filter_map(|r| r.ok()).collect()
        };

        for (row_id, row_start, row_organizer) in candidates {
            // A stored row with an unparsable time cannot be matched; skip
            // it, not the whole search.
            let Some(row_start) = row_start.as_deref().and_then(time::parse_iso_datetime) else {
                continue;
            };
            if !time::within_tolerance(start, row_start, DUPLICATE_WINDOW_SECS) {
                continue;
            }
            if organizer_email == row_organizer.as_deref().unwrap_or("") {
                return Ok(Some(row_id));
            }
        }

        Ok(None)
    }

    // === Query service ===

    /// Query events whose start date falls in the half-open window
    /// `[today - days_back, today + days_ahead + 1)`, suppressions applied.
    ///
    /// Comparison happens on the `YYYY-MM-DD` prefix of the stored start
    /// time, which sidesteps mixed-offset string comparison; events are
    /// therefore filtered by nominal start date, not a precise instant
    /// boundary. Results are ordered by the raw start_time string.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn query_events(
        &self,
        days_back: i64,
        days_ahead: i64,
        source: Option<&str>,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let now = Utc::now();
        let start_date = (now - Duration::try_days(days_back).unwrap_or_default()).date_naive();
        let end_date_exclusive =
            (now + Duration::try_days(days_ahead + 1).unwrap_or_default()).date_naive();

        let start_str = start_date.format("%Y-%m-%d").to_string();
        let end_str = end_date_exclusive.format("%Y-%m-%d").to_string();

        let ignored_event_ids = self.ignored_event_ids()?;
        let ignored_base_ids = self.ignored_base_ids()?;

        let mut sql = String::from(
            "SELECT id, subject, start_time, end_time, location, organizer_email,
                    organizer_name, attendees, body_preview, is_all_day, source
             FROM appointments
             WHERE substr(start_time, 1, 10) >= ?1 AND substr(start_time, 1, 10) < ?2",
        );
        let mut params_vec: Vec<&dyn ToSql> = vec![&start_str, &end_str];
        if let Some(source) = source.as_ref() {
            sql.push_str(" AND source = ?3");
            params_vec.push(source);
        }
        sql.push_str(" ORDER BY start_time ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_vec.as_slice(), |row| {
            Ok(Appointment {
                id: row.get(0)?,
                subject: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                start_time: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                end_time: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                location: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                organizer_email: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                organizer_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                attendees: row
                    .get::<_, Option<String>>(7)?
                    .unwrap_or_else(|| "[]".to_string()),
                body_preview: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                is_all_day: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
                source: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            })
        })?;

        let mut events = Vec::new();
        for row in rows {
            let event = row?;
            if ignored_event_ids.contains(&event.id) {
                continue;
            }
            if ignored_base_ids.contains(base_id_from_event_id(&event.id)) {
                continue;
            }
            events.push(event);
        }

        Ok(events)
    }

    // === Suppression lists ===

    /// Set of suppressed recurring-series base ids (query-path membership test).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn ignored_base_ids(&self) -> Result<HashSet<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT base_id FROM ignored_base_ids")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let ids = rows.collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Suppressed series with display details, most recently added first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn ignored_base_ids_list(&self) -> Result<Vec<IgnoredSeries>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT base_id, subject, ignored_at FROM ignored_base_ids
             ORDER BY ignored_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IgnoredSeries {
                base_id: row.get(0)?,
                subject: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                ignored_at: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?;
        let list = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(list)
    }

    /// Add (or replace) a suppressed recurring series.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn add_ignored_base_id(
        &self,
        base_id: &str,
        subject: &str,
        reason: &str,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO ignored_base_ids (base_id, subject, ignored_at, reason)
             VALUES (?1, ?2, ?3, ?4)",
            params![base_id, subject, Self::now_string(), reason],
        )?;
        Ok(())
    }

    /// Remove a suppressed recurring series.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn remove_ignored_base_id(&self, base_id: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM ignored_base_ids WHERE base_id = ?1",
            params![base_id],
        )?;
        Ok(())
    }

    /// Set of suppressed occurrence ids (query-path membership test).
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn ignored_event_ids(&self) -> Result<HashSet<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT event_id FROM ignored_event_ids")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let ids = rows.collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Suppressed occurrences with display details, most recently added first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn ignored_event_ids_list(&self) -> Result<Vec<IgnoredOccurrence>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, subject, start_time, ignored_at FROM ignored_event_ids
             ORDER BY ignored_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IgnoredOccurrence {
                event_id: row.get(0)?,
                subject: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                start_time: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                ignored_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?;
        let list = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(list)
    }

    /// Add (or replace) a suppressed occurrence.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn add_ignored_event_id(
        &self,
        event_id: &str,
        subject: &str,
        start_time: &str,
        reason: &str,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO ignored_event_ids
             (event_id, subject, start_time, ignored_at, reason)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![event_id, subject, start_time, Self::now_string(), reason],
        )?;
        Ok(())
    }

    /// Remove a suppressed occurrence.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn remove_ignored_event_id(&self, event_id: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "DELETE FROM ignored_event_ids WHERE event_id = ?1",
            params![event_id],
        )?;
        Ok(())
    }

    // === Maintenance ===

    /// Remove duplicate rows that share (subject, UTC start, organizer)
    /// within one source, keeping the earliest created_at row. Rows whose
    /// source is NULL are folded into `ics` first. Returns the number of
    /// rows removed.
    ///
    /// # Errors
    /// Returns an error if a query or delete fails.
    pub fn cleanup_duplicates(&self) -> Result<usize, DatabaseError> {
        let mut sources: Vec<String> = {
            let mut stmt = self
                .conn
                .prepare("SELECT DISTINCT source FROM appointments WHERE source IS NOT NULL")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.filter_map(|r| r.ok()).collect()
        };

        if !sources.is_empty() {
            self.conn.execute(
                "UPDATE appointments SET source = ?1 WHERE source IS NULL",
                params!["ics"],
            )?;
            if !sources.iter().any(|s| s == "ics") {
                sources.push("ics".to_string());
            }
        }

        let mut removed = 0usize;

        for source in &sources {
            type DupRow = (String, Option<String>, Option<String>, Option<String>);
            let rows: Vec<DupRow> = {
                let mut stmt = self.conn.prepare(
                    "SELECT id, subject, start_time, organizer_email FROM appointments
                     WHERE source = ?1 ORDER BY created_at ASC",
                )?;
                let mapped = stmt.query_map(params![source], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?;
                mapped.filter_map(|r| r.ok()).collect()
            };

            let mut seen: HashMap<(String, String, String), String> = HashMap::new();
            for (id, subject, start_time, organizer_email) in rows {
                let Some(start) = start_time.as_deref().and_then(time::parse_iso_datetime) else {
                    continue;
                };
                let key = (
                    subject.unwrap_or_default(),
                    time::normalize_to_utc(start).to_rfc3339_opts(SecondsFormat::AutoSi, false),
                    organizer_email.unwrap_or_default(),
                );
                match seen.entry(key) {
                    Entry::Occupied(kept) => {
                        debug!(
                            source = %source,
                            keeping = %kept.get(),
                            removing = %id,
                            "removing duplicate appointment"
                        );
                        self.conn
                            .execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
                        removed += 1;
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
            }
        }

        Ok(removed)
    }
}
