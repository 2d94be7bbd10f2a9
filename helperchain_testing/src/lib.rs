//! Utilities for testing code built on [`helperchain`].
//!
//! Provides a recording [`TestAdapter`](helperchain::TestAdapter), a shared
//! call log with helper constructors that write to it, `rstest` fixtures
//! and assertion macros.
//!
//! ```rust
//! use helperchain_testing::{TestBed, recording_helper};
//!
//! # async fn example() {
//! let bed = TestBed::new();
//! bed.harness.register_async_helper("visit", recording_helper(&bed.log, "visit"));
//! bed.inject();
//! bed.app.invoke("visit", Vec::new());
//! helperchain_testing::settle_expect!(bed.harness);
//! assert_eq!(bed.log.entries(), ["visit"]);
//! # }
//! ```

pub mod adapter;
pub mod helpers;
pub mod logging;
pub mod macros;
pub mod recorder;

pub use adapter::RecordingAdapter;
pub use helpers::{
    CallLog,
    TestBed,
    TestResult,
    deferred_helper,
    failing_helper,
    panicking_helper,
    recording_helper,
    test_bed,
};
pub use log::Level;
pub use logging::{LoggerHandle, logger};
pub use recorder::{CounterSnapshot, record_metrics};
