//! Capture of chain diagnostics through the global `logtest` logger.
//!
//! `helperchain` builds `tracing` with `log-always`, so rejection reports
//! and pointer diagnostics arrive here as `log` records even without a
//! subscriber. Acquiring a [`LoggerHandle`] drains records left by earlier
//! tests, and [`LoggerHandle::records`] keeps each record's [`Level`] so
//! tests can tell a reported rejection (`Error`) from an ignored navigation
//! abort (`Debug`).

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use log::Level;
use logtest::Logger;
use rstest::fixture;

/// Handle to the global logger with exclusive access.
///
/// Holding the handle keeps other tests from draining records this test is
/// about to assert on.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl LoggerHandle {
    /// Acquire the global [`Logger`] instance and discard stale records.
    #[must_use]
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let mut guard = logger.lock().unwrap_or_else(PoisonError::into_inner);
        while guard.pop().is_some() {}

        Self { guard }
    }

    /// Drain captured records as `(level, message)` pairs, oldest first.
    pub fn records(&mut self) -> Vec<(Level, String)> {
        let mut records = Vec::new();
        while let Some(record) = self.guard.pop() {
            records.push((record.level(), record.args().to_owned()));
        }
        records
    }

    /// Drain captured messages, oldest first.
    pub fn messages(&mut self) -> Vec<String> { self.records().into_iter().map(|(_, message)| message).collect() }

    /// Drain captured records and return those logged at `level`.
    pub fn at_level(&mut self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|(at, message)| (at == level).then_some(message))
            .collect()
    }

    /// Drain captured messages and report whether any contains `needle`.
    pub fn contains(&mut self, needle: &str) -> bool { self.messages().iter().any(|m| m.contains(needle)) }
}

impl Default for LoggerHandle {
    fn default() -> Self { Self::new() }
}

impl std::ops::Deref for LoggerHandle {
    type Target = Logger;

    fn deref(&self) -> &Self::Target { &self.guard }
}

impl std::ops::DerefMut for LoggerHandle {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.guard }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }
