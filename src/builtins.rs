//! Helpers every harness can install.
//!
//! `wait` is the only built-in registered by name. Chaining an arbitrary
//! callback is [`App::and_then`], since closures cannot travel as helper
//! arguments.

use serde_json::Value;
use tracing::debug;

use crate::{
    app::App,
    error::HelperError,
    harness::Harness,
    helper::{HelperOptions, HelperOutput},
};

/// Name of the built-in waiter helper.
pub const WAIT: &str = "wait";

/// Register the built-in helpers on `harness`.
///
/// `wait` is a waiting helper that resolves once every registered waiter
/// reports settled, yielding its first argument or `null`.
pub fn register_builtins(harness: &Harness) {
    let weak = harness.downgrade();
    harness.register_helper(
        WAIT,
        move |_: &App, args: Vec<Value>| {
            let Some(harness) = weak.upgrade() else {
                return HelperOutput::Failed(HelperError::Cancelled);
            };
            let value = args.into_iter().next().unwrap_or(Value::Null);
            HelperOutput::future(async move {
                harness.wait_for_waiters().await?;
                debug!("wait helper resolved");
                Ok(value)
            })
        },
        HelperOptions::waiting(),
    );
}
