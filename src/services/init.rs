//! Initialization helpers for the application:
//! - construction of the YouTube and Google Calendar clients
//! - single batch runs
//! - the periodic sync worker
//!
//! This keeps `main.rs` down to logging setup and signal handling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{Config, ConfigError};
use crate::error::AppResult;
use crate::i18n;
use crate::models::ChannelSyncResult;
use crate::services::calendar::CalendarSyncManager;
use crate::services::google_auth::{GoogleAuthService, ServiceAccountKey, CALENDAR_SCOPE};
use crate::services::google_calendar::GoogleCalendarService;
use crate::services::youtube::YouTubeService;
use crate::services::{http, EventStore, StreamSource};

/// The two collaborators a sync pass needs.
#[derive(Clone)]
pub struct SyncServices {
    pub source: Arc<dyn StreamSource>,
    pub store: Arc<dyn EventStore>,
}

/// Build the production services from configuration.
///
/// Fails when the service account key cannot be parsed or an HTTP client
/// cannot be constructed. No network call is made here; the first access
/// token is fetched lazily by the first calendar request.
pub fn init_services(config: &Config) -> Result<SyncServices> {
    let youtube = YouTubeService::new(config).context("Failed to initialize YouTube client")?;

    let key = ServiceAccountKey::from_json(&config.google.service_account_json)
        .context("Failed to load Google service account key")?;
    let client = http::build_client(config.http.timeout_seconds)
        .context("Failed to initialize Google Calendar HTTP client")?;
    let auth = GoogleAuthService::new(client.clone(), key, CALENDAR_SCOPE);
    tracing::info!(
        "Using service account {} for calendar {}",
        auth.client_email(),
        config.google.calendar_id
    );
    let calendar = GoogleCalendarService::new(client, auth, &config.google.calendar_id);

    Ok(SyncServices {
        source: Arc::new(youtube),
        store: Arc::new(calendar),
    })
}

/// Run one batch over every configured channel.
pub async fn run_once(services: &SyncServices, config: &Config) -> AppResult<Vec<ChannelSyncResult>> {
    let manager = CalendarSyncManager::new(
        services.source.as_ref(),
        services.store.as_ref(),
        &config.sync,
    );
    manager.sync_all(&config.youtube.channel_ids).await
}

/// Spawn the periodic sync worker.
///
/// The first pass starts immediately. A shutdown notification ends the worker
/// while it sleeps, or drops the in-flight pass at its next await point.
pub fn spawn_sync_worker(
    services: SyncServices,
    config: Arc<Config>,
    interval: Duration,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<()> {
    let mut shutdown_rx = shutdown.subscribe();

    tokio::spawn(async move {
        loop {
            tracing::info!("Starting periodic calendar synchronization");

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Calendar sync worker interrupted by shutdown");
                    break;
                }
                res = run_once(&services, &config) => {
                    if let Err(e) = res {
                        tracing::warn!("Calendar sync failed: {}", e);
                    }
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Calendar sync worker shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}

/// Localized, human-readable text for a configuration failure.
pub fn describe_config_error(err: &ConfigError, lang: Option<&str>) -> String {
    match err {
        ConfigError::MissingEnv(vars) => {
            i18n::tr(lang, "config.missing_env", Some(&[("vars", vars.as_str())]))
        }
        ConfigError::InvalidValue(var) => {
            i18n::tr(lang, "config.invalid_value", Some(&[("var", var.as_str())]))
        }
        ConfigError::NoChannels => i18n::tr(lang, "config.no_channels", None),
    }
}
