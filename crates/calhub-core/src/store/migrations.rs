//! Database schema migrations for the calendar store.
//!
//! Migrations are versioned and applied automatically when opening the
//! store. The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current
/// schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: baseline schema.
///
/// The appointments table predating source tracking, both suppression
/// tables, and the time indexes.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS appointments (
            id TEXT PRIMARY KEY,
            subject TEXT,
            start_time TEXT,
            end_time TEXT,
            location TEXT,
            organizer_email TEXT,
            organizer_name TEXT,
            attendees TEXT,
            body_preview TEXT,
            is_all_day INTEGER,
            created_at TEXT,
            updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS ignored_base_ids (
            base_id TEXT PRIMARY KEY,
            subject TEXT,
            ignored_at TEXT,
            reason TEXT
        );

        CREATE TABLE IF NOT EXISTS ignored_event_ids (
            event_id TEXT PRIMARY KEY,
            subject TEXT,
            start_time TEXT,
            ignored_at TEXT,
            reason TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_start_time ON appointments(start_time);
        CREATE INDEX IF NOT EXISTS idx_end_time ON appointments(end_time);",
    )?;

    set_schema_version(conn, 1)
}

/// Migration v2: source tracking for precedence arbitration.
///
/// Adds the `source` column (stores created before multi-source sync lack
/// it) and the indexes the duplicate finder's pre-filter relies on.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    // Stores created before migrations were tracked may already carry the
    // column; ALTER TABLE would fail on those.
    let has_source: bool = tx
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('appointments') WHERE name = 'source'",
            [],
            |row| row.get::<_, i32>(0),
        )
        .unwrap_or(0)
        > 0;

    if !has_source {
        tx.execute_batch("ALTER TABLE appointments ADD COLUMN source TEXT;")?;
    }

    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_source ON appointments(source);
         CREATE INDEX IF NOT EXISTS idx_subject_source_time
             ON appointments(subject, source, start_time);",
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [2])?;

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn), 2);

        // Full column set present, including source.
        let stmt = conn
            .prepare(
                "SELECT id, subject, start_time, end_time, location, organizer_email,
                        organizer_name, attendees, body_preview, is_all_day, source,
                        created_at, updated_at
                 FROM appointments",
            )
            .unwrap();
        drop(stmt);

        let stmt = conn
            .prepare("SELECT base_id, subject, ignored_at, reason FROM ignored_base_ids")
            .unwrap();
        drop(stmt);

        let stmt = conn
            .prepare(
                "SELECT event_id, subject, start_time, ignored_at, reason FROM ignored_event_ids",
            )
            .unwrap();
        drop(stmt);
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);
    }

    #[test]
    fn legacy_store_without_source_gains_column() {
        let conn = Connection::open_in_memory().unwrap();

        // A v1-era store: appointments without source, data present.
        conn.execute_batch(
            "CREATE TABLE appointments (
                id TEXT PRIMARY KEY,
                subject TEXT,
                start_time TEXT,
                end_time TEXT,
                location TEXT,
                organizer_email TEXT,
                organizer_name TEXT,
                attendees TEXT,
                body_preview TEXT,
                is_all_day INTEGER,
                created_at TEXT,
                updated_at TEXT
            );
            CREATE TABLE ignored_base_ids (
                base_id TEXT PRIMARY KEY, subject TEXT, ignored_at TEXT, reason TEXT
            );
            CREATE TABLE ignored_event_ids (
                event_id TEXT PRIMARY KEY, subject TEXT, start_time TEXT,
                ignored_at TEXT, reason TEXT
            );
            CREATE TABLE schema_version (version INTEGER PRIMARY KEY);
            INSERT INTO schema_version (version) VALUES (1);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO appointments (id, subject, start_time, created_at, updated_at)
             VALUES ('legacy1', 'Old Meeting', '2024-01-01T10:00:00Z',
                     '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn), 2);
        let source: Option<String> = conn
            .query_row("SELECT source FROM appointments WHERE id = 'legacy1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(source, None);
    }
}
