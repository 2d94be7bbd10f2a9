//! Optional convenience imports for writing helper-driven tests.
//!
//! Only the types nearly every test touches live here. Import the rest from
//! their owning modules.
//!
//! # Examples
//!
//! ```rust
//! use helperchain::prelude::*;
//!
//! let harness = Harness::new();
//! harness.register_async_helper("visit", |_: &App, _| HelperOutput::null());
//! ```

pub use crate::{
    app::App,
    chain::ChainedPromise,
    error::{HelperError, Result},
    harness::Harness,
    helper::{HelperOptions, HelperOutput},
    waiter::{WaiterContext, predicate},
};
