use chrono::{DateTime, Utc};

const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch?v=";

// ============================================================================
// Stream Announcement (upcoming live stream reported by the platform)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamAnnouncement {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub scheduled_start_time: DateTime<Utc>,
    pub channel_title: String,
    /// Watch URL derived from `video_id`; embedded into every created event.
    pub url: String,
}

impl StreamAnnouncement {
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        scheduled_start_time: DateTime<Utc>,
        channel_title: impl Into<String>,
    ) -> Self {
        let video_id = video_id.into();
        let url = watch_url(&video_id);
        Self {
            video_id,
            title: title.into(),
            description: description.into(),
            scheduled_start_time,
            channel_title: channel_title.into(),
            url,
        }
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", YOUTUBE_WATCH_URL, video_id)
}
