use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::store::DecisionMemory;

/// Periodic compaction of a shared decision memory, separate from recall.
pub struct MaintenanceLoop {
    memory: Arc<DecisionMemory>,
    interval: Duration,
    cancel: CancellationToken,
}

impl MaintenanceLoop {
    pub fn new(memory: Arc<DecisionMemory>) -> Self {
        let interval = Duration::from_secs(memory.config().compaction_interval_seconds.max(1));
        Self {
            memory,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns a CancellationToken that can be used to trigger shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Compact once per interval until cancelled. Returns the number of
    /// passes that ran.
    pub async fn run(&self) -> usize {
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "Memory maintenance starting");
        let mut passes = 0;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(passes, "Memory maintenance shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.run_once();
                    passes += 1;
                }
            }
        }
        passes
    }

    fn run_once(&self) {
        match self.memory.compact(Utc::now()) {
            Ok(stats) if stats.is_empty() => {
                tracing::debug!(items = stats.processed, "Nothing to compact");
            }
            Ok(stats) => {
                tracing::info!(summary = %stats.summary(), "Compaction pass complete");
            }
            Err(e) => {
                tracing::error!(error = %e, "Compaction pass failed");
            }
        }
    }
}
