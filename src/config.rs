//! Harness configuration types.
//!
//! [`SettleConfig`] controls how often registered waiters are polled and how
//! long the harness keeps polling before giving up.

use std::time::Duration;

/// Default interval between two polls of the waiter registry.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polling policy used when waiting for the application to settle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettleConfig {
    /// Delay between two evaluations of every registered waiter.
    ///
    /// A zero interval is clamped to one millisecond so the loop always
    /// yields to the application between polls.
    pub poll_interval: Duration,
    /// Give up after this long. `None` polls until every waiter settles or
    /// the harness is torn down.
    pub timeout: Option<Duration>,
}

impl SettleConfig {
    /// Poll every `interval`.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Stop polling after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Interval actually used by the polling loop.
    #[must_use]
    pub fn effective_interval(&self) -> Duration { self.poll_interval.max(Duration::from_millis(1)) }
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}
