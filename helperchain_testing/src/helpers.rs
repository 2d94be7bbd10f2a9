//! Call log, helper constructors and fixtures shared by integration tests.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use helperchain::{App, Harness, HelperError, HelperOutput};
use rstest::fixture;
use serde_json::Value;

use crate::adapter::RecordingAdapter;

/// Result type used by fallible tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Ordered record of helper side effects.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(entry.into());
    }

    /// Entries in the order they were pushed.
    #[must_use]
    pub fn entries(&self) -> Vec<String> { self.0.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize { self.0.lock().unwrap_or_else(PoisonError::into_inner).len() }

    /// Returns true if nothing was logged.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

fn entry(label: &str, args: &[Value]) -> String {
    match args {
        [] => label.to_owned(),
        [single] => format!("{label}({single})"),
        many => format!("{label}({})", Value::Array(many.to_vec())),
    }
}

/// Helper that logs `label` (with its arguments) and resolves with `null`.
pub fn recording_helper(
    log: &CallLog,
    label: impl Into<String>,
) -> impl Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static {
    let log = log.clone();
    let label = label.into();
    move |_: &App, args: Vec<Value>| {
        log.push(entry(&label, &args));
        HelperOutput::null()
    }
}

/// Helper that sleeps for `delay` before logging `label` and resolving.
///
/// Useful for proving that later links wait for slow earlier ones.
pub fn deferred_helper(
    log: &CallLog,
    label: impl Into<String>,
    delay: Duration,
) -> impl Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static {
    let log = log.clone();
    let label = label.into();
    move |_: &App, args: Vec<Value>| {
        let log = log.clone();
        let line = entry(&label, &args);
        HelperOutput::future(async move {
            tokio::time::sleep(delay).await;
            log.push(line);
            Ok(Value::Null)
        })
    }
}

/// Helper that logs `name` and then fails with `message`.
pub fn failing_helper(
    log: &CallLog,
    name: impl Into<String>,
    message: impl Into<String>,
) -> impl Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static {
    let log = log.clone();
    let name = name.into();
    let message = message.into();
    move |_: &App, _: Vec<Value>| {
        log.push(name.clone());
        HelperError::failed(name.clone(), message.clone()).into()
    }
}

/// Helper whose method panics with `message`.
pub fn panicking_helper(message: &'static str) -> impl Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static {
    move |_: &App, _: Vec<Value>| -> HelperOutput { panic!("{message}") }
}

/// A harness reporting to a [`RecordingAdapter`], an app and a call log.
pub struct TestBed {
    /// Harness under test.
    pub harness: Harness,
    /// Adapter receiving scope notifications and exceptions.
    pub adapter: Arc<RecordingAdapter>,
    /// Application helpers are injected into.
    pub app: App,
    /// Log shared with helpers built by this module.
    pub log: CallLog,
}

impl Default for TestBed {
    fn default() -> Self { Self::new() }
}

impl TestBed {
    /// Build a harness with a recording adapter. Nothing is injected yet.
    #[must_use]
    pub fn new() -> Self {
        let adapter = Arc::new(RecordingAdapter::default());
        let harness = Harness::builder().adapter(Arc::clone(&adapter)).build();
        Self {
            harness,
            adapter,
            app: App::named("test-app"),
            log: CallLog::new(),
        }
    }

    /// Inject every registered helper into the app.
    pub fn inject(&self) { self.harness.inject_helpers(&self.app); }

    /// Register a waiting helper that logs its own name.
    pub fn recording(&self, name: &str) { self.harness.register_async_helper(name, recording_helper(&self.log, name)); }
}

impl Drop for TestBed {
    fn drop(&mut self) { self.harness.teardown(); }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn test_bed() -> TestBed { TestBed::new() }
