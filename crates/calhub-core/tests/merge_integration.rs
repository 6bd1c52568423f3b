//! Integration tests for the merge-write engine.
//!
//! Covers the id-match update path, cross-source duplicate reconciliation,
//! and precedence arbitration end to end against an in-memory store.

use std::collections::HashMap;

use calhub_core::{CalendarStore, DedupRules, IncomingEvent};

fn event(id: &str, subject: &str, start: &str, source: &str) -> IncomingEvent {
    IncomingEvent {
        id: id.to_string(),
        subject: Some(subject.to_string()),
        start_time: Some(start.to_string()),
        end_time: Some("2025-06-02T11:00:00Z".to_string()),
        source: Some(source.to_string()),
        ..IncomingEvent::default()
    }
}

fn rules(source: &str, precedence: &[(&str, i64)]) -> DedupRules {
    DedupRules {
        source: source.to_string(),
        skip_same_source: false,
        precedence: precedence
            .iter()
            .map(|(s, p)| (s.to_string(), *p))
            .collect::<HashMap<_, _>>(),
    }
}

fn row_count(store: &CalendarStore) -> i64 {
    store
        .conn()
        .query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn reinsert_same_id_updates_instead_of_duplicating() {
    let store = CalendarStore::open_memory().unwrap();
    let ev = event("A", "Standup", "2025-01-01T10:00:00Z", "x");

    let first = store.save_appointments(&[ev.clone()], &DedupRules::default());
    let second = store.save_appointments(&[ev], &DedupRules::default());

    assert_eq!(first, (1, 0));
    assert_eq!(second, (0, 1));
    assert_eq!(row_count(&store), 1);

    let id: String = store
        .conn()
        .query_row("SELECT id FROM appointments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(id, "A");
}

#[test]
fn update_bumps_updated_at_but_not_created_at() {
    let store = CalendarStore::open_memory().unwrap();
    let ev = event("A", "Standup", "2025-01-01T10:00:00Z", "x");

    store.save_appointments(&[ev.clone()], &DedupRules::default());
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.save_appointments(&[ev], &DedupRules::default());

    let (created_at, updated_at): (String, String) = store
        .conn()
        .query_row(
            "SELECT created_at, updated_at FROM appointments WHERE id = 'A'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(updated_at > created_at);
}

#[test]
fn precedence_tie_skips_second_candidate() {
    let store = CalendarStore::open_memory().unwrap();
    let precedence = [("cal1", 1), ("cal2", 1)];

    let first = store.save_appointments(
        &[event("A", "Standup", "2025-06-02T10:00:00Z", "cal1")],
        &rules("cal1", &precedence),
    );
    let second = store.save_appointments(
        &[event("B", "Standup", "2025-06-02T10:00:30Z", "cal2")],
        &rules("cal2", &precedence),
    );

    assert_eq!(first, (1, 0));
    assert_eq!(second, (0, 0));
    assert_eq!(row_count(&store), 1);

    let id: String = store
        .conn()
        .query_row("SELECT id FROM appointments", [], |row| row.get(0))
        .unwrap();
    assert_eq!(id, "A");
}

#[test]
fn precedence_override_keeps_duplicate_id_with_new_values() {
    let store = CalendarStore::open_memory().unwrap();
    let precedence = [("cal1", 1), ("cal2", 2)];

    store.save_appointments(
        &[event("A", "Standup", "2025-06-02T10:00:00Z", "cal1")],
        &rules("cal1", &precedence),
    );

    let mut winner = event("B", "Standup", "2025-06-02T10:00:30Z", "cal2");
    winner.location = Some("Room 4".to_string());
    let second = store.save_appointments(&[winner], &rules("cal2", &precedence));

    assert_eq!(second, (0, 1));
    assert_eq!(row_count(&store), 1);

    // cal2's field values survive under cal1's original id.
    let (id, location, source, start_time): (String, String, String, String) = store
        .conn()
        .query_row(
            "SELECT id, location, source, start_time FROM appointments",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(id, "A");
    assert_eq!(location, "Room 4");
    assert_eq!(source, "cal2");
    assert_eq!(start_time, "2025-06-02T10:00:30Z");
}

#[test]
fn lower_priority_duplicate_keeps_existing_record() {
    let store = CalendarStore::open_memory().unwrap();
    let precedence = [("cal1", 2), ("cal2", 1)];

    store.save_appointments(
        &[event("A", "Standup", "2025-06-02T10:00:00Z", "cal1")],
        &rules("cal1", &precedence),
    );
    let second = store.save_appointments(
        &[event("B", "Standup", "2025-06-02T10:00:30Z", "cal2")],
        &rules("cal2", &precedence),
    );

    assert_eq!(second, (0, 0));
    let (id, source): (String, String) = store
        .conn()
        .query_row("SELECT id, source FROM appointments", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(id, "A");
    assert_eq!(source, "cal1");
}

#[test]
fn lower_priority_update_of_same_id_is_ignored() {
    let store = CalendarStore::open_memory().unwrap();
    let precedence = [("cal1", 1), ("cal2", 2)];

    store.save_appointments(
        &[event("A", "Standup", "2025-06-02T10:00:00Z", "cal2")],
        &rules("cal2", &precedence),
    );

    let mut stale = event("A", "Standup (stale)", "2025-06-02T10:00:00Z", "cal1");
    stale.location = Some("Wrong room".to_string());
    let second = store.save_appointments(&[stale], &rules("cal1", &precedence));

    assert_eq!(second, (0, 0));
    let (subject, location): (String, String) = store
        .conn()
        .query_row("SELECT subject, location FROM appointments WHERE id = 'A'", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(subject, "Standup");
    assert_eq!(location, "");
}

#[test]
fn different_organizers_are_not_merged() {
    let store = CalendarStore::open_memory().unwrap();

    let mut ev1 = event("A", "1:1", "2025-06-02T10:00:00Z", "cal1");
    ev1.organizer_email = Some("alice@example.com".to_string());
    let mut ev2 = event("B", "1:1", "2025-06-02T10:00:00Z", "cal2");
    ev2.organizer_email = Some("bob@example.com".to_string());

    store.save_appointments(&[ev1], &rules("cal1", &[]));
    let second = store.save_appointments(&[ev2], &rules("cal2", &[]));

    assert_eq!(second, (1, 0));
    assert_eq!(row_count(&store), 2);
}

#[test]
fn candidates_are_processed_independently() {
    let store = CalendarStore::open_memory().unwrap();

    // A missing id in the middle of the batch must not affect neighbours.
    let batch = vec![
        event("A", "One", "2025-06-02T10:00:00Z", "x"),
        IncomingEvent::default(),
        event("B", "Two", "2025-06-02T12:00:00Z", "x"),
    ];
    let counts = store.save_appointments(&batch, &DedupRules::default());

    assert_eq!(counts, (2, 0));
    assert_eq!(row_count(&store), 2);
}
