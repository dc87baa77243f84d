use chrono::Duration;

use crate::config::SyncConfig;
use crate::i18n;
use crate::models::{EventDraft, StreamAnnouncement};

/// Prefix marking an event as a live stream.
pub const LIVE_MARKER: &str = "📺";
pub const SOURCE_TITLE: &str = "YouTube Live";

/// Map an announcement to the event that represents it. Pure.
///
/// The description always ends with the stream URL and channel title on
/// their own lines; the dedup matcher relies on the URL being present
/// verbatim.
pub fn build_event_draft(announcement: &StreamAnnouncement, settings: &SyncConfig) -> EventDraft {
    let lang = Some(settings.lang.as_str());
    let body = truncate_chars(&announcement.description, settings.description_max_chars);

    let description = format!(
        "{}\n\n{}: {}\n{}: {}",
        body,
        i18n::tr(lang, "event.stream_url_label", None),
        announcement.url,
        i18n::tr(lang, "event.channel_label", None),
        announcement.channel_title,
    );

    let start_time = announcement.scheduled_start_time;

    EventDraft {
        summary: format!("{} {}", LIVE_MARKER, announcement.title),
        description,
        start_time,
        end_time: start_time + Duration::minutes(settings.event_duration_minutes),
        time_zone: settings.time_zone,
        source_title: SOURCE_TITLE.to_string(),
        source_url: announcement.url.clone(),
        video_id: announcement.video_id.clone(),
    }
}

/// First `max_chars` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
