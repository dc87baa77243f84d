use std::env;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::i18n;

#[derive(Debug, Clone)]
pub struct Config {
    pub youtube: YouTubeConfig,
    pub google: GoogleConfig,
    pub http: HttpConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_key: String,
    /// Channels to watch, in processing order. Read from `YOUTUBE_CHANNEL_IDS`
    /// as a comma separated list.
    pub channel_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Raw service account key file contents (`GOOGLE_SERVICE_ACCOUNT_JSON`).
    pub service_account_json: String,
    pub calendar_id: String,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout applied by the HTTP client.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Zone used to label created events. Display only; instants are unchanged.
    pub time_zone: Tz,
    pub event_duration_minutes: i64,
    /// Half-width of the dedup search window around the scheduled start.
    pub dedup_window_hours: i64,
    /// Number of title characters sent as the calendar text query.
    pub dedup_title_prefix_chars: usize,
    pub description_max_chars: usize,
    pub max_announcements_per_channel: usize,
    /// Upper bound for a single collaborator call (fetch, search or create),
    /// retries included.
    pub call_timeout_seconds: u64,
    /// When set, the batch is repeated on this interval until shutdown.
    pub interval_seconds: Option<u64>,
    /// Language for status lines and event description labels.
    pub lang: String,
}

/// 30 days either side of the scheduled start.
const MAX_DEDUP_WINDOW_HOURS: i64 = 30 * 24;
/// One week.
const MAX_EVENT_DURATION_MINUTES: i64 = 7 * 24 * 60;

const REQUIRED_VARS: [&str; 4] = [
    "YOUTUBE_API_KEY",
    "GOOGLE_SERVICE_ACCOUNT_JSON",
    "GOOGLE_CALENDAR_ID",
    "YOUTUBE_CHANNEL_IDS",
];

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as missing.
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing.join(", ")));
        }

        let channel_ids = parse_channel_ids(&get("YOUTUBE_CHANNEL_IDS").unwrap_or_default());
        if channel_ids.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        let defaults = SyncConfig::default();

        let time_zone = match get("SYNC_TIME_ZONE") {
            Some(v) => Tz::from_str(v.trim())
                .map_err(|_| ConfigError::InvalidValue("SYNC_TIME_ZONE".to_string()))?,
            None => defaults.time_zone,
        };

        let lang = match get("SYNC_LANG") {
            Some(v) => {
                let lang = i18n::normalize_language(v.trim());
                if !i18n::is_supported_language(&lang) {
                    return Err(ConfigError::InvalidValue("SYNC_LANG".to_string()));
                }
                lang
            }
            None => defaults.lang,
        };

        let interval_seconds = match get("SYNC_INTERVAL_SECONDS") {
            Some(v) => {
                let secs: u64 = v
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("SYNC_INTERVAL_SECONDS".to_string()))?;
                (secs > 0).then_some(secs)
            }
            None => None,
        };

        Ok(Config {
            youtube: YouTubeConfig {
                api_key: get("YOUTUBE_API_KEY").unwrap_or_default(),
                channel_ids,
            },
            google: GoogleConfig {
                service_account_json: get("GOOGLE_SERVICE_ACCOUNT_JSON").unwrap_or_default(),
                calendar_id: get("GOOGLE_CALENDAR_ID").unwrap_or_default(),
            },
            http: HttpConfig {
                timeout_seconds: parse_positive(&get, "HTTP_TIMEOUT_SECONDS", 30)?,
            },
            sync: SyncConfig {
                time_zone,
                event_duration_minutes: parse_bounded(
                    &get,
                    "EVENT_DURATION_MINUTES",
                    defaults.event_duration_minutes,
                    MAX_EVENT_DURATION_MINUTES,
                )?,
                dedup_window_hours: parse_bounded(
                    &get,
                    "DEDUP_WINDOW_HOURS",
                    defaults.dedup_window_hours,
                    MAX_DEDUP_WINDOW_HOURS,
                )?,
                dedup_title_prefix_chars: parse_positive(
                    &get,
                    "DEDUP_TITLE_PREFIX_CHARS",
                    defaults.dedup_title_prefix_chars,
                )?,
                description_max_chars: parse_positive(
                    &get,
                    "DESCRIPTION_MAX_CHARS",
                    defaults.description_max_chars,
                )?,
                max_announcements_per_channel: parse_positive(
                    &get,
                    "MAX_ANNOUNCEMENTS_PER_CHANNEL",
                    defaults.max_announcements_per_channel,
                )?,
                call_timeout_seconds: parse_positive(
                    &get,
                    "SYNC_CALL_TIMEOUT_SECONDS",
                    defaults.call_timeout_seconds,
                )?,
                interval_seconds,
                lang,
            },
        })
    }
}

/// Split a comma separated channel list, trimming entries and dropping blanks.
pub fn parse_channel_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_positive<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => match v.trim().parse::<T>() {
            Ok(parsed) if parsed > T::default() => Ok(parsed),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        },
        None => Ok(default),
    }
}

/// Like `parse_positive`, with an inclusive upper bound. Used for values that
/// end up in date arithmetic.
fn parse_bounded<G>(get: &G, key: &str, default: i64, max: i64) -> Result<i64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_positive(get, key, default)?;
    if value > max {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable(s): {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),

    #[error("No channel IDs configured (YOUTUBE_CHANNEL_IDS)")]
    NoChannels,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            time_zone: chrono_tz::Asia::Tokyo,
            event_duration_minutes: 120,
            dedup_window_hours: 24,
            dedup_title_prefix_chars: 50,
            description_max_chars: 500,
            max_announcements_per_channel: 10,
            call_timeout_seconds: 120,
            interval_seconds: None,
            lang: i18n::DEFAULT_LANG.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            youtube: YouTubeConfig {
                api_key: String::new(),
                channel_ids: Vec::new(),
            },
            google: GoogleConfig {
                service_account_json: String::new(),
                calendar_id: String::new(),
            },
            http: HttpConfig {
                timeout_seconds: 30,
            },
            sync: SyncConfig::default(),
        }
    }
}
