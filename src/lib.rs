#![doc(html_root_url = "https://docs.rs/helperchain/latest")]
//! Public API for the `helperchain` library.
//!
//! This crate orders asynchronous test helpers. Helpers registered with a
//! [`Harness`] are injected into an [`App`]; waiting helpers called in
//! sequence run in call order because each one is chained after the
//! promise created by the previous call. Helpers invoked from inside a
//! chained continuation form an isolated sub-chain, so they never wait on
//! the link that is running them.

pub mod adapter;
pub mod app;
pub mod builtins;
pub mod chain;
pub mod config;
pub mod error;
pub mod harness;
pub mod helper;
pub mod invoker;
pub mod metrics;
pub mod prelude;
pub mod registry;
pub mod run_bridge;
pub mod settle;
pub mod waiter;

pub use adapter::{TestAdapter, TracingAdapter};
pub use app::{App, AppId};
pub use builtins::register_builtins;
pub use chain::{Chain, ChainedPromise, PromiseId, RejectionSink};
pub use config::SettleConfig;
pub use error::{HelperError, Result};
pub use harness::{Harness, HarnessBuilder};
pub use helper::{Helper, HelperOptions, HelperOutput, HelperResult};
pub use invoker::HelperInvoker;
pub use registry::HelperRegistry;
pub use run_bridge::RunBridge;
pub use waiter::{Waiter, WaiterContext, WaiterPredicate, WaiterRegistry, predicate};
