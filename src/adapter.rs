//! Test adapter boundary.
//!
//! [`TestAdapter`] is the seam between helper chaining and whatever test
//! framework runs the tests: it is told when chained work starts and ends
//! and receives every rejection that should fail the test.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::HelperError;

/// Trait implemented by test frameworks integrating with the harness.
///
/// `async_start`/`async_end` bracket the wait for an appended helper's
/// turn on the chain, not the helper's own asynchronous work. A framework
/// that needs to wait for a helper to settle should await its promise or
/// [`Harness::settled`](crate::Harness::settled).
pub trait TestAdapter: Send + Sync + 'static {
    /// Called when a waiting helper is appended to a pending chain.
    fn async_start(&self) {}

    /// Called when the appended helper's method returns, or when a rejection
    /// earlier in the chain skips it.
    ///
    /// If the method returns a future or promise, this fires before that
    /// result settles.
    fn async_end(&self) {}

    /// Called with every unhandled rejection that is not an aborted
    /// navigation.
    fn exception(&self, error: &HelperError);
}

/// Adapter that logs rejections through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAdapter;

impl TestAdapter for TracingAdapter {
    fn exception(&self, error: &HelperError) {
        error!(%error, "helper chain rejected");
    }
}

/// Forward `error` to `adapter` unless it is an aborted navigation.
pub fn report_rejection(adapter: &dyn TestAdapter, error: &HelperError) {
    if error.is_navigation_abort() {
        debug!(%error, "ignoring aborted navigation");
        return;
    }
    crate::metrics::inc_rejections();
    adapter.exception(error);
}

/// RAII guard pairing [`TestAdapter::async_start`] with
/// [`TestAdapter::async_end`].
pub(crate) struct AsyncScope(Arc<dyn TestAdapter>);

impl AsyncScope {
    pub(crate) fn start(adapter: Arc<dyn TestAdapter>) -> Self {
        adapter.async_start();
        Self(adapter)
    }
}

impl Drop for AsyncScope {
    fn drop(&mut self) { self.0.async_end(); }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use rstest::rstest;
    use tracing_test::traced_test;

    use super::*;

    #[derive(Default)]
    struct Counting {
        starts: AtomicUsize,
        ends: AtomicUsize,
        errors: Mutex<Vec<HelperError>>,
    }

    impl TestAdapter for Counting {
        fn async_start(&self) { self.starts.fetch_add(1, Ordering::SeqCst); }

        fn async_end(&self) { self.ends.fetch_add(1, Ordering::SeqCst); }

        fn exception(&self, error: &HelperError) {
            self.errors.lock().expect("errors lock").push(error.clone());
        }
    }

    #[rstest]
    #[case::failure(HelperError::failed("visit", "404"), 1)]
    #[case::panic(HelperError::Panicked { context: "click".into(), message: "boom".into() }, 1)]
    #[case::navigation(HelperError::navigation_aborted("redirected"), 0)]
    fn navigation_aborts_are_swallowed(#[case] error: HelperError, #[case] expected: usize) {
        let adapter = Counting::default();
        report_rejection(&adapter, &error);
        assert_eq!(adapter.errors.lock().expect("errors lock").len(), expected);
    }

    #[test]
    fn async_scope_balances_start_and_end() {
        let adapter = Arc::new(Counting::default());
        let scope = AsyncScope::start(Arc::clone(&adapter) as Arc<dyn TestAdapter>);
        assert_eq!(adapter.starts.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.ends.load(Ordering::SeqCst), 0);
        drop(scope);
        assert_eq!(adapter.ends.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn tracing_adapter_logs_rejections() {
        TracingAdapter.exception(&HelperError::failed("visit", "404"));
        assert!(logs_contain("helper chain rejected"));
    }
}
