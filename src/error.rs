#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("YouTube API error: {0}")]
    YouTubeApi(String),

    #[error("Google Calendar API error: {0}")]
    CalendarApi(String),

    #[error("Google auth error: {0}")]
    Auth(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// The calendar already holds an event with the id derived for this stream.
    #[error("Calendar event {id} already exists")]
    EventExists { id: String },

    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },
}

impl AppError {
    /// Short machine-friendly code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Request(_) => "EXTERNAL_REQUEST_FAILED",
            AppError::YouTubeApi(_) => "YOUTUBE_API_ERROR",
            AppError::CalendarApi(_) => "CALENDAR_API_ERROR",
            AppError::Auth(_) | AppError::Jwt(_) => "AUTH_ERROR",
            AppError::EventExists { .. } => "EVENT_EXISTS",
            AppError::Timeout { .. } => "TIMEOUT",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
