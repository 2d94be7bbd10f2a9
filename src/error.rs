//! Canonical error and result types for the crate.
//!
//! Every link in a helper chain settles with a [`HelperError`] on failure.
//! Chained promises are shared between several awaiters, so the error is
//! `Clone` and carries rendered messages rather than boxed sources.

use std::{any::Any, time::Duration};

use thiserror::Error;

/// Failure produced while invoking or settling a helper.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HelperError {
    /// A helper's underlying function reported a failure.
    #[error("helper `{helper}` failed: {message}")]
    Failed {
        /// Name of the helper that failed.
        helper: String,
        /// Human-readable failure description.
        message: String,
    },
    /// The application deliberately aborted a navigation.
    ///
    /// These are an expected side effect of navigating during tests and are
    /// never forwarded to the test adapter.
    #[error("navigation aborted: {reason}")]
    NavigationAborted {
        /// Why the navigation was abandoned.
        reason: String,
    },
    /// No helper with this name is injected into the application.
    #[error("no helper named `{0}` is injected")]
    UnknownHelper(String),
    /// A helper or continuation panicked.
    #[error("`{context}` panicked: {message}")]
    Panicked {
        /// The helper name or continuation label that panicked.
        context: String,
        /// Rendered panic payload.
        message: String,
    },
    /// Registered waiters did not settle within the configured timeout.
    #[error("waiters did not settle within {0:?}")]
    SettleTimeout(Duration),
    /// Settling was cancelled by harness teardown.
    #[error("settling cancelled")]
    Cancelled,
}

impl HelperError {
    /// Build a [`HelperError::Failed`] for `helper`.
    #[must_use]
    pub fn failed(helper: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            helper: helper.into(),
            message: message.into(),
        }
    }

    /// Build a [`HelperError::NavigationAborted`].
    #[must_use]
    pub fn navigation_aborted(reason: impl Into<String>) -> Self {
        Self::NavigationAborted {
            reason: reason.into(),
        }
    }

    /// Build a [`HelperError::Panicked`] from a `catch_unwind` payload.
    ///
    /// The payload is downcast to `String` or `&'static str` if possible and
    /// falls back to `Debug` formatting otherwise.
    ///
    /// ```
    /// use helperchain::HelperError;
    ///
    /// let error = HelperError::panicked("visit", &*Box::new("boom"));
    /// assert_eq!(error.to_string(), "`visit` panicked: boom");
    /// ```
    #[must_use]
    pub fn panicked(context: impl Into<String>, payload: &(dyn Any + Send)) -> Self {
        Self::Panicked {
            context: context.into(),
            message: panic_message(payload),
        }
    }

    /// Returns true for errors the reporting boundary must swallow.
    #[must_use]
    pub fn is_navigation_abort(&self) -> bool { matches!(self, Self::NavigationAborted { .. }) }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else {
        format!("{payload:?}")
    }
}

/// Canonical result alias used by `helperchain` public APIs.
pub type Result<T> = std::result::Result<T, HelperError>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::static_str(Box::new("boom") as Box<dyn Any + Send>, "boom")]
    #[case::owned(Box::new(String::from("bang")) as Box<dyn Any + Send>, "bang")]
    fn panic_payloads_render_as_text(#[case] payload: Box<dyn Any + Send>, #[case] expected: &str) {
        let error = HelperError::panicked("click", &*payload);
        assert_eq!(
            error,
            HelperError::Panicked {
                context: "click".into(),
                message: expected.into(),
            }
        );
    }

    #[test]
    fn opaque_panic_payloads_fall_back_to_debug() {
        let payload: Box<dyn Any + Send> = Box::new(5_u32);
        let error = HelperError::panicked("click", &*payload);
        assert!(error.to_string().contains("Any"));
    }

    #[test]
    fn only_navigation_aborts_are_flagged() {
        assert!(HelperError::navigation_aborted("redirect").is_navigation_abort());
        assert!(!HelperError::failed("visit", "404").is_navigation_abort());
        assert!(!HelperError::Cancelled.is_navigation_abort());
    }
}
