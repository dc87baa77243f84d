//! External collaborators and the synchronization logic built on top of them.
//!
//! `StreamSource` and `EventStore` are the two seams the synchronizer talks
//! to; production code plugs in the YouTube and Google Calendar clients, tests
//! plug in in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{CalendarEvent, EventDraft, StreamAnnouncement};

pub mod calendar;
pub mod dedup;
pub mod event_builder;
pub mod google_auth;
pub mod google_calendar;
pub mod http;
pub mod init;
pub mod youtube;

/// Source of upcoming live streams for a channel.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Upcoming streams with a known scheduled start, soonest-announced first.
    async fn list_upcoming_streams(&self, channel_id: &str) -> AppResult<Vec<StreamAnnouncement>>;
}

/// Target calendar. The synchronizer only reads and creates.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events overlapping `[time_min, time_max]` loosely matching `text_query`,
    /// ordered by start time.
    async fn find_events_in_window(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        text_query: &str,
    ) -> AppResult<Vec<CalendarEvent>>;

    async fn create_event(&self, draft: &EventDraft) -> AppResult<CalendarEvent>;
}
