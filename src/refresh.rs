//! Last-write-wins bookkeeping for record-set refreshes.
//!
//! A refresh (user switch or date-range change) fetches a whole new record
//! set asynchronously. The user may trigger another refresh before the first
//! resolves; correctness comes from discarding completions that carry a stale
//! token, not from cancelling requests. The engine hands out a token when a
//! fetch starts and only applies results that still carry the latest one.

use log::info;

/// Token identifying one refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshToken(u64);

/// Monotonic refresh epoch; the newest `begin` wins.
pub struct DataRefresher {
    epoch: u64,
}

impl DataRefresher {
    pub fn new() -> Self {
        Self { epoch: 0 }
    }

    /// Start a refresh attempt, invalidating every earlier token.
    pub fn begin(&mut self) -> RefreshToken {
        self.epoch += 1;
        RefreshToken(self.epoch)
    }

    /// Check whether a completing fetch is still the latest one. Logs and
    /// reports `false` for stale tokens; the caller discards those results.
    pub fn is_current(&self, token: RefreshToken) -> bool {
        let current = token.0 == self.epoch;
        if !current {
            info!(
                "[DataRefresher] Discarding stale refresh {} (current epoch {})",
                token.0, self.epoch
            );
        }
        current
    }
}

impl Default for DataRefresher {
    fn default() -> Self {
        Self::new()
    }
}
