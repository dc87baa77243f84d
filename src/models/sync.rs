use crate::error::AppResult;

/// Per-channel counters produced by one synchronizer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub skipped: usize,
    /// Announcements whose dedup query or create call failed.
    pub failed: usize,
}

impl SyncSummary {
    pub fn processed(&self) -> usize {
        self.created + self.skipped + self.failed
    }
}

#[derive(Debug)]
pub struct ChannelSyncResult {
    pub channel_id: String,
    pub result: AppResult<SyncSummary>,
}

/// Totals across one batch, used for the closing status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTotals {
    pub channels_ok: usize,
    pub channels_failed: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchTotals {
    pub fn from_results(results: &[ChannelSyncResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            match &r.result {
                Ok(summary) => {
                    acc.channels_ok += 1;
                    acc.created += summary.created;
                    acc.skipped += summary.skipped;
                    acc.failed += summary.failed;
                }
                Err(_) => acc.channels_failed += 1,
            }
            acc
        })
    }
}
