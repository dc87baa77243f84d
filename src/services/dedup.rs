use chrono::{DateTime, Duration, Utc};

use crate::config::SyncConfig;
use crate::error::AppResult;
use crate::models::{CalendarEvent, StreamAnnouncement};
use crate::services::event_builder::truncate_chars;
use crate::services::EventStore;

/// Search window centered on the announcement's scheduled start.
pub fn dedup_window(
    scheduled_start: DateTime<Utc>,
    settings: &SyncConfig,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let half = Duration::hours(settings.dedup_window_hours);
    (scheduled_start - half, scheduled_start + half)
}

/// Whether `event` represents `announcement`.
///
/// The title query only narrows the candidates; the decision is keyed on the
/// video: either the watch URL appears in the description or the event was
/// stamped with the same video id.
pub fn is_match(event: &CalendarEvent, announcement: &StreamAnnouncement) -> bool {
    event.description.contains(&announcement.url)
        || event.video_id.as_deref() == Some(announcement.video_id.as_str())
}

/// Look for an existing event for `announcement`.
///
/// Store errors are returned as-is. Callers must not treat an error as "no
/// match", or a flaky search would create duplicates.
pub async fn find_match(
    announcement: &StreamAnnouncement,
    store: &dyn EventStore,
    settings: &SyncConfig,
) -> AppResult<Option<CalendarEvent>> {
    let (time_min, time_max) = dedup_window(announcement.scheduled_start_time, settings);
    let query = truncate_chars(&announcement.title, settings.dedup_title_prefix_chars);

    let candidates = store
        .find_events_in_window(time_min, time_max, query)
        .await?;

    tracing::debug!(
        "Dedup search for video {} returned {} candidate(s)",
        announcement.video_id,
        candidates.len()
    );

    Ok(candidates
        .into_iter()
        .find(|event| is_match(event, announcement)))
}
