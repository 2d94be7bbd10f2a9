//! Test adapter that records every notification.

use std::sync::{
    Mutex,
    PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use helperchain::{HelperError, TestAdapter};

/// Adapter counting async scopes and collecting reported exceptions.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    starts: AtomicUsize,
    ends: AtomicUsize,
    exceptions: Mutex<Vec<HelperError>>,
}

impl RecordingAdapter {
    /// Number of `async_start` notifications.
    #[must_use]
    pub fn starts(&self) -> usize { self.starts.load(Ordering::SeqCst) }

    /// Number of `async_end` notifications.
    #[must_use]
    pub fn ends(&self) -> usize { self.ends.load(Ordering::SeqCst) }

    /// Returns true when every started scope has ended.
    #[must_use]
    pub fn is_balanced(&self) -> bool { self.starts() == self.ends() }

    /// Exceptions reported so far, oldest first.
    #[must_use]
    pub fn exceptions(&self) -> Vec<HelperError> {
        self.exceptions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl TestAdapter for RecordingAdapter {
    fn async_start(&self) { self.starts.fetch_add(1, Ordering::SeqCst); }

    fn async_end(&self) { self.ends.fetch_add(1, Ordering::SeqCst); }

    fn exception(&self, error: &HelperError) {
        self.exceptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }
}
