use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{CalendarEvent, EventDraft};
use crate::services::google_auth::GoogleAuthService;
use crate::services::http::{self, Upstream};
use crate::services::EventStore;

const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
const MAX_PAGES: usize = 10;

/// Private extended property carrying the source video id on created events.
pub const VIDEO_ID_PROPERTY: &str = "youtubeVideoId";

#[derive(Debug, Clone)]
pub struct GoogleCalendarService {
    client: Client,
    auth: GoogleAuthService,
    calendar_id: String,
    api_url: String,
}

// ============================================================================
// Event Types (Calendar API v3 wire format)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsListResponse {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: Option<EventDateTime>,
    pub end: Option<EventDateTime>,
    pub extended_properties: Option<ExtendedProperties>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// All-day events carry a date instead of a date-time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtendedProperties {
    #[serde(default)]
    pub private: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EventSource {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertEventRequest {
    /// Client-chosen id; a replayed or concurrent insert gets 409 instead of
    /// a second event.
    pub id: String,
    pub summary: String,
    pub description: String,
    pub start: EventDateTime,
    pub end: EventDateTime,
    pub source: EventSource,
    pub extended_properties: ExtendedProperties,
}

impl GoogleCalendarService {
    pub fn new(client: Client, auth: GoogleAuthService, calendar_id: &str) -> Self {
        Self {
            client,
            auth,
            calendar_id: calendar_id.to_string(),
            api_url: CALENDAR_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// Run a request with a bearer token; on 401 refresh the token and retry once.
    async fn send_authorized<F>(&self, make_request: F) -> AppResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let mut refreshed_token = false;
        loop {
            let token = self.auth.get_valid_access_token().await?;
            let response =
                http::send_with_backoff(Upstream::Calendar, || make_request(&token)).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if refreshed_token {
                return Err(http::error_from_response(
                    Upstream::Calendar,
                    "Unauthorized calendar request",
                    response,
                )
                .await);
            }

            tracing::warn!("Unauthorized Google Calendar request. Refreshing token and retrying.");
            self.auth.refresh_access_token().await?;
            refreshed_token = true;
        }
    }

    async fn list_page(
        &self,
        params: &[(&str, String)],
        page_token: Option<&str>,
    ) -> AppResult<EventsListResponse> {
        let url = self.events_url();
        let response = self
            .send_authorized(|token| {
                let mut request = self.client.get(&url).bearer_auth(token).query(params);
                if let Some(page_token) = page_token {
                    request = request.query(&[("pageToken", page_token)]);
                }
                request
            })
            .await?;

        if !response.status().is_success() {
            return Err(http::error_from_response(
                Upstream::Calendar,
                "Failed to list events",
                response,
            )
            .await);
        }

        response
            .json::<EventsListResponse>()
            .await
            .map_err(|e| AppError::CalendarApi(format!("Failed to parse events response: {}", e)))
    }
}

#[async_trait]
impl EventStore for GoogleCalendarService {
    async fn find_events_in_window(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        text_query: &str,
    ) -> AppResult<Vec<CalendarEvent>> {
        let mut params = vec![
            ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("timeMax", time_max.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        if !text_query.is_empty() {
            params.push(("q", text_query.to_string()));
        }

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.list_page(&params, page_token.as_deref()).await?;
            events.extend(page.items.into_iter().filter_map(calendar_event_from_google));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => return Ok(events),
            }
        }

        // A match could sit on a page we never read.
        Err(AppError::CalendarApi(format!(
            "Page limit of {} reached listing events for query '{}'",
            MAX_PAGES, text_query
        )))
    }

    async fn create_event(&self, draft: &EventDraft) -> AppResult<CalendarEvent> {
        let url = self.events_url();
        let body = insert_request_from_draft(draft);

        let response = self
            .send_authorized(|token| self.client.post(&url).bearer_auth(token).json(&body))
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(AppError::EventExists { id: body.id });
        }

        if !response.status().is_success() {
            return Err(http::error_from_response(
                Upstream::Calendar,
                "Failed to create event",
                response,
            )
            .await);
        }

        let created: GoogleEvent = response
            .json()
            .await
            .map_err(|e| AppError::CalendarApi(format!("Failed to parse created event: {}", e)))?;

        calendar_event_from_google(created).ok_or_else(|| {
            AppError::CalendarApi("Calendar returned a created event without an id".to_string())
        })
    }
}

/// Render the draft in the wire shape; bounds are expressed in the display zone.
pub fn insert_request_from_draft(draft: &EventDraft) -> InsertEventRequest {
    let zone = draft.time_zone;
    let bound = |instant: DateTime<Utc>| EventDateTime {
        date_time: Some(
            instant
                .with_timezone(&zone)
                .to_rfc3339_opts(SecondsFormat::Secs, false),
        ),
        date: None,
        time_zone: Some(zone.name().to_string()),
    };

    let mut private = HashMap::new();
    private.insert(VIDEO_ID_PROPERTY.to_string(), draft.video_id.clone());

    InsertEventRequest {
        id: event_id_for_video(&draft.video_id),
        summary: draft.summary.clone(),
        description: draft.description.clone(),
        start: bound(draft.start_time),
        end: bound(draft.end_time),
        source: EventSource {
            title: draft.source_title.clone(),
            url: draft.source_url.clone(),
        },
        extended_properties: ExtendedProperties { private },
    }
}

/// Calendar event id for a video. Event ids must be base32hex (`a-v`, `0-9`)
/// and at least 5 characters long; lowercase hex of the video id always is.
pub fn event_id_for_video(video_id: &str) -> String {
    hex::encode(video_id.as_bytes())
}

/// Convert a wire event; events without an id are not usable and are dropped.
pub fn calendar_event_from_google(event: GoogleEvent) -> Option<CalendarEvent> {
    let id = event.id.filter(|id| !id.is_empty())?;

    Some(CalendarEvent {
        id,
        summary: event.summary.unwrap_or_default(),
        description: event.description.unwrap_or_default(),
        start_time: event.start.as_ref().and_then(parse_event_instant),
        end_time: event.end.as_ref().and_then(parse_event_instant),
        video_id: event
            .extended_properties
            .and_then(|mut p| p.private.remove(VIDEO_ID_PROPERTY)),
    })
}

fn parse_event_instant(value: &EventDateTime) -> Option<DateTime<Utc>> {
    value
        .date_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::google_auth::{ServiceAccountKey, CALENDAR_SCOPE};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn draft() -> EventDraft {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        EventDraft {
            summary: "📺 Morning stream".to_string(),
            description: "Hello\n\n配信URL: https://www.youtube.com/watch?v=abc\nチャンネル: Ch".to_string(),
            start_time: start,
            end_time: start + chrono::Duration::hours(2),
            time_zone: chrono_tz::Asia::Tokyo,
            source_title: "YouTube Live".to_string(),
            source_url: "https://www.youtube.com/watch?v=abc".to_string(),
            video_id: "abc".to_string(),
        }
    }

    #[test]
    fn insert_request_uses_display_zone_for_bounds() {
        let body = serde_json::to_value(insert_request_from_draft(&draft())).unwrap();
        assert_eq!(body["start"]["dateTime"], "2024-03-01T19:00:00+09:00");
        assert_eq!(body["start"]["timeZone"], "Asia/Tokyo");
        assert_eq!(body["end"]["dateTime"], "2024-03-01T21:00:00+09:00");
        assert_eq!(body["end"]["timeZone"], "Asia/Tokyo");
        assert!(body["start"].get("date").is_none());
        assert_eq!(body["source"]["title"], "YouTube Live");
        assert_eq!(body["source"]["url"], "https://www.youtube.com/watch?v=abc");
        assert_eq!(body["extendedProperties"]["private"]["youtubeVideoId"], "abc");
        assert_eq!(body["summary"], "📺 Morning stream");
        assert_eq!(body["id"], "616263");
    }

    #[test]
    fn event_ids_are_valid_base32hex() {
        let id = event_id_for_video("dQw4w9WgXcQ");
        assert_eq!(id, "6451773477395767586351");
        assert!(id.len() >= 5);
        assert!(id.chars().all(|c| matches!(c, '0'..='9' | 'a'..='v')));
        assert_ne!(id, event_id_for_video("dQw4w9WgXcR"));
    }

    #[test]
    fn parses_listed_event() {
        let event: GoogleEvent = serde_json::from_value(serde_json::json!({
            "kind": "calendar#event",
            "id": "evt1",
            "summary": "📺 Morning stream",
            "description": "body\n\n配信URL: https://www.youtube.com/watch?v=abc",
            "start": { "dateTime": "2024-03-01T19:00:00+09:00", "timeZone": "Asia/Tokyo" },
            "end": { "dateTime": "2024-03-01T21:00:00+09:00", "timeZone": "Asia/Tokyo" },
            "extendedProperties": { "private": { "youtubeVideoId": "abc" } }
        }))
        .unwrap();

        let parsed = calendar_event_from_google(event).unwrap();
        assert_eq!(parsed.id, "evt1");
        assert_eq!(
            parsed.start_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            parsed.end_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(parsed.video_id.as_deref(), Some("abc"));
    }

    #[test]
    fn all_day_event_without_description_still_parses() {
        let event: GoogleEvent = serde_json::from_value(serde_json::json!({
            "id": "evt2",
            "start": { "date": "2024-03-01" },
            "end": { "date": "2024-03-02" }
        }))
        .unwrap();

        let parsed = calendar_event_from_google(event).unwrap();
        assert_eq!(parsed.description, "");
        assert_eq!(parsed.start_time, None);
        assert_eq!(parsed.video_id, None);
    }

    #[test]
    fn event_without_id_is_dropped() {
        let event: GoogleEvent =
            serde_json::from_value(serde_json::json!({ "summary": "ghost" })).unwrap();
        assert!(calendar_event_from_google(event).is_none());
    }

    #[test]
    fn list_response_pages() {
        let page: EventsListResponse = serde_json::from_value(serde_json::json!({
            "items": [{ "id": "a" }, { "id": "b" }],
            "nextPageToken": "tok"
        }))
        .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
    }

    // ------------------------------------------------------------------
    // Against a local HTTP server
    // ------------------------------------------------------------------

    struct Reply {
        status: &'static str,
        body: String,
        delay: Duration,
    }

    impl Reply {
        fn ok(body: serde_json::Value) -> Self {
            Self {
                status: "200 OK",
                body: body.to_string(),
                delay: Duration::ZERO,
            }
        }
    }

    /// Read one request; returns the request line and the body.
    async fn read_request(stream: &mut TcpStream) -> (String, String) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let mut expected_len = None;

        loop {
            if expected_len.is_none() {
                if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..end]).to_string();
                    let content_length = head
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    expected_len = Some((end + 4, content_length));
                }
            }
            if let Some((body_start, len)) = expected_len {
                if buf.len() >= body_start + len {
                    let head = String::from_utf8_lossy(&buf[..body_start]).to_string();
                    let request_line = head.lines().next().unwrap_or_default().to_string();
                    let body = String::from_utf8_lossy(&buf[body_start..]).to_string();
                    return (request_line, body);
                }
            }
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return (String::new(), String::new()),
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// Serve every connection with `handler(request_index, request_line, body)`.
    async fn spawn_server<H>(handler: H) -> String
    where
        H: Fn(usize, &str, &str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handler = Arc::new(handler);
        let counter = Arc::new(AtomicUsize::new(0));

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let handler = handler.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    let (request_line, body) = read_request(&mut stream).await;
                    let index = counter.fetch_add(1, Ordering::SeqCst);
                    let reply = (*handler)(index, &request_line, &body);
                    tokio::time::sleep(reply.delay).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        reply.status,
                        reply.body.len(),
                        reply.body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        base
    }

    fn service(base: &str, timeout_seconds: u64) -> GoogleCalendarService {
        let client = http::build_client(timeout_seconds).unwrap();
        let key = ServiceAccountKey::from_json(
            &serde_json::json!({
                "client_email": "sync@demo.iam.gserviceaccount.com",
                "private_key": "unused"
            })
            .to_string(),
        )
        .unwrap();
        let auth =
            GoogleAuthService::new(client.clone(), key, CALENDAR_SCOPE).with_cached_token("tok");
        GoogleCalendarService::new(client, auth, "cal@example.com").with_api_url(base)
    }

    #[tokio::test]
    async fn insert_replayed_after_a_lost_reply_creates_one_event() {
        let stored: Arc<Mutex<Vec<String>>> = Arc::default();
        let base = {
            let stored = stored.clone();
            spawn_server(move |index, _, body| {
                let body: serde_json::Value = serde_json::from_str(body).unwrap();
                let id = body["id"].as_str().unwrap_or_default().to_string();
                let mut stored = stored.lock().unwrap();
                if stored.contains(&id) {
                    return Reply {
                        status: "409 Conflict",
                        body: r#"{"error":{"code":409,"message":"The requested identifier already exists."}}"#.to_string(),
                        delay: Duration::ZERO,
                    };
                }
                stored.push(id.clone());
                let mut reply = Reply::ok(serde_json::json!({ "id": id }));
                if index == 0 {
                    // Stored, but the reply only arrives after the client gave up.
                    reply.delay = Duration::from_secs(3);
                }
                reply
            })
            .await
        };

        let result = service(&base, 1).create_event(&draft()).await;

        match result {
            Err(AppError::EventExists { id }) => assert_eq!(id, event_id_for_video("abc")),
            other => panic!("expected the replay to hit the existing event, got {:?}", other),
        }
        assert_eq!(stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn created_event_is_returned() {
        let base = spawn_server(|_, request_line, body| {
            assert!(request_line.starts_with("POST /calendars/cal%40example.com/events"));
            let body: serde_json::Value = serde_json::from_str(body).unwrap();
            Reply::ok(serde_json::json!({
                "id": body["id"],
                "summary": body["summary"],
                "description": body["description"],
                "start": body["start"],
                "end": body["end"],
                "extendedProperties": body["extendedProperties"]
            }))
        })
        .await;

        let created = service(&base, 5).create_event(&draft()).await.unwrap();

        assert_eq!(created.id, "616263");
        assert_eq!(created.video_id.as_deref(), Some("abc"));
        assert_eq!(
            created.start_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn listing_follows_page_tokens() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let base = {
            let seen = seen.clone();
            spawn_server(move |_, request_line, _| {
                seen.lock().unwrap().push(request_line.to_string());
                if request_line.contains("pageToken=p2") {
                    Reply::ok(serde_json::json!({ "items": [{ "id": "b" }] }))
                } else {
                    Reply::ok(serde_json::json!({
                        "items": [{ "id": "a" }],
                        "nextPageToken": "p2"
                    }))
                }
            })
            .await
        };

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let events = service(&base, 5)
            .find_events_in_window(
                start - chrono::Duration::days(1),
                start + chrono::Duration::days(1),
                "Morning",
            )
            .await
            .unwrap();

        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].contains("q=Morning"));
        assert!(seen[0].contains("singleEvents=true"));
        assert!(seen[0].contains("orderBy=startTime"));
    }

    #[tokio::test]
    async fn listing_that_hits_the_page_limit_is_an_error() {
        let requests = Arc::new(AtomicUsize::new(0));
        let base = {
            let requests = requests.clone();
            spawn_server(move |_, _, _| {
                requests.fetch_add(1, Ordering::SeqCst);
                Reply::ok(serde_json::json!({
                    "items": [{ "id": "unrelated", "description": "other stream" }],
                    "nextPageToken": "more"
                }))
            })
            .await
        };

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let result = service(&base, 5)
            .find_events_in_window(
                start - chrono::Duration::days(1),
                start + chrono::Duration::days(1),
                "Morning",
            )
            .await;

        assert!(matches!(result, Err(AppError::CalendarApi(_))));
        assert_eq!(requests.load(Ordering::SeqCst), MAX_PAGES);
    }
}
