//! Helper definitions and the values they produce.
//!
//! A [`Helper`] pairs a name with a method and a wait flag. Methods receive
//! the [`App`] they were injected into followed by the caller's arguments and
//! return a [`HelperOutput`], which is either a plain value, a synchronous
//! failure, or something awaitable.

use std::{fmt, future::Future, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use serde_json::Value;

use crate::{
    app::App,
    chain::{Chain, ChainedPromise},
    error::HelperError,
};

/// Result produced when a helper or chained promise settles.
pub type HelperResult = Result<Value, HelperError>;

/// Callable stored for every registered helper.
pub trait HelperFn: Send + Sync {
    /// Invoke the helper with its application context and arguments.
    fn call(&self, app: &App, args: Vec<Value>) -> HelperOutput;
}

impl<F> HelperFn for F
where
    F: Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static,
{
    fn call(&self, app: &App, args: Vec<Value>) -> HelperOutput { (self)(app, args) }
}

/// Options accepted when registering a helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HelperOptions {
    /// Serialize calls onto the chain. When false the helper runs
    /// synchronously and its output is returned unchanged.
    pub wait: bool,
}

impl HelperOptions {
    /// Options for a helper serialized onto the chain.
    #[must_use]
    pub const fn waiting() -> Self { Self { wait: true } }

    /// Options for a helper that answers in the same turn.
    #[must_use]
    pub const fn immediate() -> Self { Self { wait: false } }
}

impl Default for HelperOptions {
    fn default() -> Self { Self::waiting() }
}

struct HelperEntry {
    name: String,
    method: Arc<dyn HelperFn>,
    wait: bool,
}

/// A registered helper.
#[derive(Clone)]
pub struct Helper(Arc<HelperEntry>);

impl Helper {
    /// Create a helper from a method and its options.
    pub fn new<F>(name: impl Into<String>, method: F, options: HelperOptions) -> Self
    where
        F: Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static,
    {
        Self(Arc::new(HelperEntry {
            name: name.into(),
            method: Arc::new(method),
            wait: options.wait,
        }))
    }

    /// Name the helper was registered under.
    #[must_use]
    pub fn name(&self) -> &str { &self.0.name }

    /// Whether calls are serialized onto the chain.
    #[must_use]
    pub fn wait(&self) -> bool { self.0.wait }

    /// Run the underlying method.
    pub fn call(&self, app: &App, args: Vec<Value>) -> HelperOutput { self.0.method.call(app, args) }

    /// Returns true when both handles refer to the same registration.
    #[must_use]
    pub fn same_registration(&self, other: &Helper) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper")
            .field("name", &self.0.name)
            .field("wait", &self.0.wait)
            .finish_non_exhaustive()
    }
}

/// Value returned by a helper method or a chained continuation.
pub enum HelperOutput {
    /// A plain value available immediately.
    Value(Value),
    /// A failure raised synchronously.
    Failed(HelperError),
    /// A link of the helper chain.
    Promise(ChainedPromise),
    /// Foreign asynchronous work that settles later.
    Future(BoxFuture<'static, HelperResult>),
}

impl HelperOutput {
    /// Output carrying `null`.
    #[must_use]
    pub fn null() -> Self { Self::Value(Value::Null) }

    /// Wrap asynchronous work.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = HelperResult> + Send + 'static,
    {
        Self::Future(future.boxed())
    }

    /// Returns true when the output must be awaited before its value is known.
    #[must_use]
    pub fn is_thenable(&self) -> bool { matches!(self, Self::Promise(_) | Self::Future(_)) }

    /// Borrow the plain value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Take the plain value, if any.
    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Take the chained promise, if any.
    #[must_use]
    pub fn into_promise(self) -> Option<ChainedPromise> {
        match self {
            Self::Promise(promise) => Some(promise),
            _ => None,
        }
    }

    /// Wait for the output to settle.
    ///
    /// # Errors
    ///
    /// Returns the [`HelperError`] the output failed or rejected with.
    pub async fn settle(self) -> HelperResult {
        match self {
            Self::Value(value) => Ok(value),
            Self::Failed(error) => Err(error),
            Self::Promise(promise) => promise.settle().await,
            Self::Future(future) => future.await,
        }
    }

    /// Settle the output as the result of an enclosing link.
    ///
    /// An adopted promise counts as handled: its rejection surfaces through
    /// the enclosing link instead of being reported twice.
    pub(crate) fn adopt(self) -> impl Future<Output = HelperResult> + Send {
        if let Self::Promise(promise) = &self {
            promise.mark_handled();
        }
        self.settle()
    }

    /// Adopt the output as a link of `chain`, making it the chain pointer.
    pub(crate) fn into_chained(self, chain: &Chain) -> ChainedPromise {
        match self {
            Self::Promise(promise) => {
                chain.record(promise.clone());
                promise
            }
            Self::Value(value) => ChainedPromise::resolved(chain, value),
            Self::Failed(error) => ChainedPromise::rejected(chain, error),
            Self::Future(future) => ChainedPromise::new(chain, future),
        }
    }
}

impl fmt::Debug for HelperOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            Self::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Self::Future(_) => f.write_str("Future(..)"),
        }
    }
}

impl From<Value> for HelperOutput {
    fn from(value: Value) -> Self { Self::Value(value) }
}

impl From<HelperError> for HelperOutput {
    fn from(error: HelperError) -> Self { Self::Failed(error) }
}

impl From<ChainedPromise> for HelperOutput {
    fn from(promise: ChainedPromise) -> Self { Self::Promise(promise) }
}

impl From<HelperResult> for HelperOutput {
    fn from(result: HelperResult) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(error) => Self::Failed(error),
        }
    }
}
