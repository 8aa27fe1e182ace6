//! Pass scheduler
//!
//! Yields one tick per discovery pass. The first tick is immediate; each later
//! tick waits `interval` after the previous pass finished. Cancellation ends
//! the sequence.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct PassScheduler {
    interval: Duration,
    cancel: CancellationToken,
    ticks: u64,
}

impl PassScheduler {
    pub fn new(interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            interval,
            cancel,
            ticks: 0,
        }
    }

    /// Wait for the next pass; `None` once shutdown was requested
    pub async fn tick(&mut self) -> Option<u64> {
        if self.cancel.is_cancelled() {
            return None;
        }

        if self.ticks > 0 {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.ticks += 1;
        Some(self.ticks)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
