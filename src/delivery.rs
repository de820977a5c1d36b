use crate::store::{ResultStore, StoredAnalysis};
use anyhow::Result;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Outcome of waiting for a result. Timing out is not an error: the underlying
/// analysis may still complete later and be visible on the next lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed(StoredAnalysis),
    TimedOut,
}

/// Polls the result store until an analysis newer than a given point appears.
///
/// The requesting client and the pipeline have separate lifetimes: analysis
/// started by a client that has since been torn down still lands in the store,
/// and a recreated client discovers it here. Cancellation is dropping the
/// future (e.g. via `tokio::select!`); the pipeline itself keeps running.
#[derive(Debug, Clone)]
pub struct ResultPoller {
    interval: Duration,
    max_attempts: u32,
}

impl Default for ResultPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ResultPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Sample the store every interval until a record with a timestamp greater
    /// than `newer_than` appears, or the attempt budget runs out.
    pub async fn wait_for_result(
        &self,
        store: &ResultStore,
        newer_than: u64,
    ) -> Result<PollOutcome> {
        let mut ticker = tokio::time::interval(self.interval);
        for attempt in 1..=self.max_attempts {
            ticker.tick().await;
            if let Some(record) = store.latest().await? {
                if record.timestamp > newer_than {
                    log::debug!("result delivery: found record on attempt {attempt}");
                    return Ok(PollOutcome::Completed(record));
                }
            }
        }
        log::debug!(
            "result delivery: no new record after {} attempts",
            self.max_attempts
        );
        Ok(PollOutcome::TimedOut)
    }
}
