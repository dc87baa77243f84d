use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{AppError, AppResult};
use crate::i18n;
use crate::models::{BatchTotals, ChannelSyncResult, SyncSummary};
use crate::services::dedup::find_match;
use crate::services::event_builder::build_event_draft;
use crate::services::{EventStore, StreamSource};

/// Calendar sync manager:
///
/// - Fetches the upcoming streams announced on each configured channel.
/// - For every announcement, searches the calendar around its start time for
///   an event that already carries its URL.
/// - Creates an event for announcements with no match.
///
/// Nothing is remembered between runs; the calendar itself records what has
/// been synced. The store rejects a second insert for the same video, which
/// is counted as skipped.
pub struct CalendarSyncManager<'a> {
    source: &'a dyn StreamSource,
    store: &'a dyn EventStore,
    settings: &'a SyncConfig,
}

impl<'a> CalendarSyncManager<'a> {
    pub fn new(
        source: &'a dyn StreamSource,
        store: &'a dyn EventStore,
        settings: &'a SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            settings,
        }
    }

    fn lang(&self) -> Option<&str> {
        Some(self.settings.lang.as_str())
    }

    fn message(&self, key: &str, params: &[(&str, &str)]) -> String {
        i18n::tr(self.lang(), key, Some(params))
    }

    /// Synchronize every channel in order. One channel failing never stops the
    /// others; an empty list is a configuration error and touches nothing.
    pub async fn sync_all(&self, channel_ids: &[String]) -> AppResult<Vec<ChannelSyncResult>> {
        if channel_ids.is_empty() {
            return Err(AppError::Config(i18n::tr(
                self.lang(),
                "config.no_channels",
                None,
            )));
        }

        let mut results = Vec::with_capacity(channel_ids.len());

        for channel_id in channel_ids {
            let result = self.sync_channel(channel_id).await;

            match &result {
                Ok(summary) => {
                    let (created, skipped, failed) = (
                        summary.created.to_string(),
                        summary.skipped.to_string(),
                        summary.failed.to_string(),
                    );
                    info!(
                        "{}",
                        self.message(
                            "sync.channel_done",
                            &[
                                ("channel", channel_id.as_str()),
                                ("created", created.as_str()),
                                ("skipped", skipped.as_str()),
                                ("failed", failed.as_str()),
                            ],
                        )
                    )
                }
                Err(e) => {
                    let err = e.to_string();
                    error!(
                        code = e.code(),
                        "{}",
                        self.message(
                            "sync.channel_error",
                            &[("channel", channel_id.as_str()), ("err", err.as_str())],
                        )
                    )
                }
            }

            results.push(ChannelSyncResult {
                channel_id: channel_id.clone(),
                result,
            });
        }

        let totals = BatchTotals::from_results(&results);
        let counts = [
            totals.channels_ok.to_string(),
            totals.channels_failed.to_string(),
            totals.created.to_string(),
            totals.skipped.to_string(),
            totals.failed.to_string(),
        ];
        info!(
            "{}",
            self.message(
                "sync.batch_done",
                &[
                    ("ok", counts[0].as_str()),
                    ("errors", counts[1].as_str()),
                    ("created", counts[2].as_str()),
                    ("skipped", counts[3].as_str()),
                    ("failed", counts[4].as_str()),
                ],
            )
        );

        Ok(results)
    }

    /// Synchronize a single channel.
    ///
    /// A failed announcement fetch fails the whole channel. Past that point
    /// errors are per announcement: a failed dedup search means no create for
    /// that announcement, a failed create moves on to the next one.
    pub async fn sync_channel(&self, channel_id: &str) -> AppResult<SyncSummary> {
        info!(
            "{}",
            self.message("sync.channel_fetching", &[("channel", channel_id)])
        );

        let mut announcements = self
            .bounded(
                "list upcoming streams",
                self.source.list_upcoming_streams(channel_id),
            )
            .await?;
        announcements.truncate(self.settings.max_announcements_per_channel);

        let count = announcements.len().to_string();
        info!(
            "{}",
            self.message("sync.channel_fetched", &[("count", count.as_str())])
        );

        let mut summary = SyncSummary::default();

        for announcement in &announcements {
            let title = announcement.title.as_str();
            info!("{}", self.message("sync.processing", &[("title", title)]));

            let existing = self
                .bounded(
                    "search existing events",
                    find_match(announcement, self.store, self.settings),
                )
                .await;

            match existing {
                Ok(Some(event)) => {
                    info!(
                        "  → {}",
                        self.message("sync.existing_found", &[("summary", event.summary.as_str())])
                    );
                    summary.skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    let err = e.to_string();
                    warn!(
                        "  → {}",
                        self.message("sync.match_error", &[("title", title), ("err", err.as_str())])
                    );
                    summary.failed += 1;
                    continue;
                }
            }

            let draft = build_event_draft(announcement, self.settings);
            match self
                .bounded("create event", self.store.create_event(&draft))
                .await
            {
                Ok(created) => {
                    info!(
                        "  → {} (id: {})",
                        self.message("sync.event_created", &[("title", title)]),
                        created.id
                    );
                    summary.created += 1;
                }
                Err(AppError::EventExists { id }) => {
                    info!(
                        "  → {} (id: {})",
                        self.message("sync.existing_found", &[("summary", draft.summary.as_str())]),
                        id
                    );
                    summary.skipped += 1;
                }
                Err(e) => {
                    let err = e.to_string();
                    warn!(
                        "  → {}",
                        self.message("sync.create_error", &[("title", title), ("err", err.as_str())])
                    );
                    summary.failed += 1;
                }
            }
        }

        debug!(
            "Channel {} processed {} announcement(s)",
            channel_id,
            summary.processed()
        );

        Ok(summary)
    }

    /// Run a collaborator call under the configured time limit.
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let seconds = self.settings.call_timeout_seconds;
        match tokio::time::timeout(Duration::from_secs(seconds), fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout {
                operation: operation.to_string(),
                seconds,
            }),
        }
    }
}
