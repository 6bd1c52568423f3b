//! Appointment records and the upstream ingestion contract.

use serde::{Deserialize, Serialize};

/// A stored calendar event as served to consumers.
///
/// Every field is non-null: optional upstream fields are normalized to
/// empty-string / `"[]"` / `0` defaults both on write and on the query
/// path, so consumers never deal with nulls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub subject: String,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub organizer_email: String,
    pub organizer_name: String,
    /// Serialized JSON list of attendee names/addresses.
    pub attendees: String,
    pub body_preview: String,
    pub is_all_day: i64,
    /// Upstream origin of the record (e.g. "outlook", "ics").
    pub source: String,
}

/// A candidate event arriving from an upstream sync adapter.
///
/// Everything except `id` is optional; a candidate without an id is
/// dropped by the merge-write engine. Missing fields take the defaults
/// below when the record is written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub organizer_email: Option<String>,
    #[serde(default)]
    pub organizer_name: Option<String>,
    #[serde(default)]
    pub attendees: Option<String>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub is_all_day: Option<i64>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Derive the recurring-series base id from an occurrence id.
///
/// Occurrence ids may carry a trailing `_YYYYMMDDTHHMMSS` suffix (exactly
/// 15 characters: 8 digits, `T`, 6 digits). If present it is stripped;
/// anything else is returned unchanged.
pub fn base_id_from_event_id(event_id: &str) -> &str {
    if let Some((head, tail)) = event_id.rsplit_once('_') {
        if is_occurrence_suffix(tail) {
            return head;
        }
    }
    event_id
}

fn is_occurrence_suffix(tail: &str) -> bool {
    let bytes = tail.as_bytes();
    bytes.len() == 15
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'T'
        && bytes[9..].iter().all(u8::is_ascii_digit)
}
