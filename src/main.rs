use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod i18n;
mod models;
mod services;

use config::Config;
use services::init;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    dotenvy::dotenv().ok();
    init_tracing();

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            let lang = std::env::var("SYNC_LANG").ok().map(|l| i18n::normalize_language(&l));
            tracing::error!("{}", init::describe_config_error(&e, lang.as_deref()));
            return Err(e.into());
        }
    };
    let lang = Some(config.sync.lang.as_str());

    tracing::info!(
        "{}: {}",
        i18n::tr(lang, "app.name", None),
        i18n::tr(
            lang,
            "app.starting",
            Some(&[("count", config.youtube.channel_ids.len().to_string().as_str())]),
        )
    );

    let services = init::init_services(&config)?;

    let Some(interval) = config.sync.interval_seconds else {
        // One-shot: per-channel failures are logged by the synchronizer and do
        // not change the exit status.
        init::run_once(&services, &config).await?;
        return Ok(());
    };

    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let worker = init::spawn_sync_worker(
        services,
        Arc::new(config),
        Duration::from_secs(interval),
        shutdown_tx.clone(),
    );

    wait_for_signal().await?;
    tracing::info!("Shutdown signal received, notifying sync worker");
    let _ = shutdown_tx.send(());

    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for the sync worker to exit",
        shutdown_wait.as_secs()
    );
    if tokio::time::timeout(shutdown_wait, worker).await.is_err() {
        tracing::warn!("Sync worker did not exit in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stream_calendar_sync=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}
