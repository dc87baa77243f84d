use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::StreamAnnouncement;
use crate::services::http::{self, Upstream};
use crate::services::StreamSource;

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone)]
pub struct YouTubeService {
    client: Client,
    api_key: String,
    api_url: String,
    max_results: usize,
}

// ============================================================================
// Search Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchListResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    pub video_id: Option<String>,
}

// ============================================================================
// Video Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    pub channel_title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStreamingDetails {
    pub scheduled_start_time: Option<String>,
}

impl YouTubeService {
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self {
            client: http::build_client(config.http.timeout_seconds)?,
            api_key: config.youtube.api_key.clone(),
            api_url: YOUTUBE_API_URL.to_string(),
            max_results: config.sync.max_announcements_per_channel,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> AppResult<Url> {
        let base = format!("{}/{}", self.api_url, path);
        Url::parse_with_params(&base, params.iter().chain([("key", self.api_key.as_str())].iter()))
            .map_err(|e| AppError::YouTubeApi(format!("Invalid request URL for {}: {}", path, e)))
    }

    /// Ids of the channel's upcoming live videos, in the API's date order.
    pub async fn search_upcoming(&self, channel_id: &str) -> AppResult<Vec<String>> {
        let max_results = self.max_results.to_string();
        let url = self.endpoint(
            "search",
            &[
                ("part", "snippet"),
                ("channelId", channel_id),
                ("eventType", "upcoming"),
                ("type", "video"),
                ("order", "date"),
                ("maxResults", max_results.as_str()),
            ],
        )?;

        let response =
            http::send_with_backoff(Upstream::YouTube, || self.client.get(url.clone())).await?;

        if !response.status().is_success() {
            return Err(http::error_from_response(
                Upstream::YouTube,
                "Failed to search upcoming streams",
                response,
            )
            .await);
        }

        let search: SearchListResponse = response.json().await.map_err(|e| {
            AppError::YouTubeApi(format!("Failed to parse search response: {}", e))
        })?;

        Ok(video_ids_from_search(search))
    }

    /// Fetch snippet and live details for a single video. `None` when the
    /// video no longer exists.
    pub async fn get_video(&self, video_id: &str) -> AppResult<Option<Video>> {
        let url = self.endpoint(
            "videos",
            &[("part", "snippet,liveStreamingDetails"), ("id", video_id)],
        )?;

        let response =
            http::send_with_backoff(Upstream::YouTube, || self.client.get(url.clone())).await?;

        if !response.status().is_success() {
            return Err(http::error_from_response(
                Upstream::YouTube,
                "Failed to get video details",
                response,
            )
            .await);
        }

        let videos: VideoListResponse = response.json().await.map_err(|e| {
            AppError::YouTubeApi(format!("Failed to parse video response: {}", e))
        })?;

        Ok(videos.items.into_iter().next())
    }
}

#[async_trait]
impl StreamSource for YouTubeService {
    async fn list_upcoming_streams(&self, channel_id: &str) -> AppResult<Vec<StreamAnnouncement>> {
        let video_ids = self.search_upcoming(channel_id).await?;

        let mut announcements = Vec::with_capacity(video_ids.len());
        for video_id in video_ids {
            let Some(video) = self.get_video(&video_id).await? else {
                tracing::debug!("Video {} disappeared between search and detail fetch", video_id);
                continue;
            };

            if let Some(announcement) = announcement_from_video(video) {
                announcements.push(announcement);
            }
        }

        Ok(announcements)
    }
}

fn video_ids_from_search(search: SearchListResponse) -> Vec<String> {
    search
        .items
        .into_iter()
        .filter_map(|item| item.id.video_id)
        .filter(|id| !id.is_empty())
        .collect()
}

/// Convert a video resource into an announcement.
///
/// Videos without a scheduled start, title or channel title are not
/// announcements and are dropped.
pub fn announcement_from_video(video: Video) -> Option<StreamAnnouncement> {
    let scheduled = video
        .live_streaming_details
        .as_ref()
        .and_then(|d| d.scheduled_start_time.as_deref())?;

    let scheduled_start_time = match DateTime::parse_from_rfc3339(scheduled) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            tracing::warn!(
                "Failed to parse scheduledStartTime '{}' for video {}: {}; skipping",
                scheduled,
                video.id,
                e
            );
            return None;
        }
    };

    let snippet = video.snippet?;
    let title = snippet.title?;
    let channel_title = snippet.channel_title?;

    Some(StreamAnnouncement::new(
        video.id,
        title,
        snippet.description,
        scheduled_start_time,
        channel_title,
    ))
}
