use chrono::{DateTime, Utc};
use chrono_tz::Tz;

// ============================================================================
// Calendar Event Models
// ============================================================================

/// Event about to be created. Never stored as-is; the store returns a
/// `CalendarEvent` once it is materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub summary: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Display zone for both bounds.
    pub time_zone: Tz,
    pub source_title: String,
    pub source_url: String,
    pub video_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: String,
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Video id stamped into the event's private extended properties, if any.
    pub video_id: Option<String>,
}
