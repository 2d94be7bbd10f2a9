//! Metric helpers for `helperchain`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking helper invocations.
pub const HELPER_INVOCATIONS: &str = "helperchain_helper_invocations_total";
/// Name of the counter tracking chained promises created.
pub const CHAIN_LINKS: &str = "helperchain_chain_links_total";
/// Name of the counter tracking rejections forwarded to the test adapter.
pub const REJECTIONS_REPORTED: &str = "helperchain_rejections_reported_total";

/// How a helper was dispatched.
#[derive(Clone, Copy, Debug)]
pub enum HelperKind {
    /// Serialized onto the chain.
    Waiting,
    /// Called synchronously, outside the chain.
    Immediate,
}

impl HelperKind {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            HelperKind::Waiting => "waiting",
            HelperKind::Immediate => "immediate",
        }
    }
}

/// Record a helper invocation of the given kind.
pub fn inc_invocations(kind: HelperKind) {
    #[cfg(feature = "metrics")]
    counter!(HELPER_INVOCATIONS, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record the construction of a chained promise.
pub fn inc_chain_links() {
    #[cfg(feature = "metrics")]
    counter!(CHAIN_LINKS).increment(1);
}

/// Record a rejection forwarded to the test adapter.
pub fn inc_rejections() {
    #[cfg(feature = "metrics")]
    counter!(REJECTIONS_REPORTED).increment(1);
}
