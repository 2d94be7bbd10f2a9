//! Promise type whose construction moves the chain pointer.
//!
//! A [`ChainedPromise`] is a shared, boxed future. Clones share a single
//! evaluation, so every awaiter observes the same result. Two behaviours set
//! it apart from a plain shared future:
//!
//! - every construction records the new promise as the chain pointer, which
//!   is how the next waiting helper finds the promise it must wait on;
//! - success continuations registered with [`ChainedPromise::then`] run inside
//!   an isolation frame, so helpers invoked from them form their own
//!   sub-chain instead of appending to the chain that contains this promise.
//!
//! On a current-thread tokio runtime each promise is spawned on creation so
//! the chain makes progress even if nobody awaits an intermediate link. On
//! other runtimes, or without one, promises are lazy and advance only when
//! awaited.

use std::{
    fmt,
    future::{Future, IntoFuture},
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use serde_json::Value;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

use super::{Chain, WeakChain, isolate};
use crate::{
    error::HelperError,
    helper::{HelperOutput, HelperResult},
};

static NEXT_PROMISE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to every chained promise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(u64);

impl PromiseId {
    fn next() -> Self { Self(NEXT_PROMISE_ID.fetch_add(1, Ordering::Relaxed)) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for PromiseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "PromiseId({})", self.0) }
}

type SharedResult = Shared<BoxFuture<'static, HelperResult>>;

struct PromiseInner {
    id: PromiseId,
    future: SharedResult,
    chain: WeakChain,
    handled: Arc<AtomicBool>,
}

/// A link of the helper chain.
#[derive(Clone)]
pub struct ChainedPromise(Arc<PromiseInner>);

impl ChainedPromise {
    /// Create a promise settling with `future` and make it the chain pointer.
    pub fn new<F>(chain: &Chain, future: F) -> Self
    where
        F: Future<Output = HelperResult> + Send + 'static,
    {
        Self::on(chain.downgrade(), future)
    }

    /// Create an already-resolved promise.
    pub fn resolved(chain: &Chain, value: Value) -> Self { Self::new(chain, async move { Ok(value) }) }

    /// Create an already-rejected promise.
    pub fn rejected(chain: &Chain, error: HelperError) -> Self {
        Self::new(chain, async move { Err(error) })
    }

    fn on<F>(chain: WeakChain, future: F) -> Self
    where
        F: Future<Output = HelperResult> + Send + 'static,
    {
        let id = PromiseId::next();
        let handled = Arc::new(AtomicBool::new(false));
        let future = settle_link(id, chain.clone(), Arc::clone(&handled), future)
            .boxed()
            .shared();
        let promise = Self(Arc::new(PromiseInner {
            id,
            future,
            chain: chain.clone(),
            handled,
        }));
        crate::metrics::inc_chain_links();
        if let Some(chain) = chain.upgrade() {
            chain.record(promise.clone());
        }
        promise.drive();
        promise
    }

    /// Identifier of this promise.
    #[must_use]
    pub fn id(&self) -> PromiseId { self.0.id }

    /// Returns true once a continuation has been attached.
    #[must_use]
    pub fn is_handled(&self) -> bool { self.0.handled.load(Ordering::Acquire) }

    /// Returns true once the promise has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool { self.0.future.peek().is_some() }

    /// Result of the promise if it has already settled.
    #[must_use]
    pub fn peek(&self) -> Option<HelperResult> { self.0.future.peek().cloned() }

    /// Wait for the promise to settle.
    ///
    /// Awaiting does not count as handling a rejection; only continuations
    /// do.
    ///
    /// # Errors
    ///
    /// Returns the [`HelperError`] this link rejected with.
    pub async fn settle(&self) -> HelperResult { self.0.future.clone().await }

    /// Run `on_success` with the resolved value inside an isolation frame.
    ///
    /// Rejections skip `on_success` and propagate unchanged.
    pub fn then<F>(&self, on_success: F) -> ChainedPromise
    where
        F: FnOnce(Value) -> HelperOutput + Send + 'static,
    {
        self.mark_handled();
        let parent = self.0.future.clone();
        let chain = self.0.chain.clone();
        Self::on(self.0.chain.clone(), async move {
            let value = parent.await?;
            isolate(&chain, "continuation", move || on_success(value))
                .adopt()
                .await
        })
    }

    /// Like [`then`](Self::then), with a failure continuation.
    ///
    /// The failure continuation runs without isolation.
    pub fn then_or_else<F, R>(&self, on_success: F, on_failure: R) -> ChainedPromise
    where
        F: FnOnce(Value) -> HelperOutput + Send + 'static,
        R: FnOnce(HelperError) -> HelperOutput + Send + 'static,
    {
        self.mark_handled();
        let parent = self.0.future.clone();
        let chain = self.0.chain.clone();
        Self::on(self.0.chain.clone(), async move {
            match parent.await {
                Ok(value) => {
                    isolate(&chain, "continuation", move || on_success(value))
                        .adopt()
                        .await
                }
                Err(error) => on_failure(error).adopt().await,
            }
        })
    }

    /// Handle a rejection without isolation; resolved values pass through.
    pub fn catch<R>(&self, on_failure: R) -> ChainedPromise
    where
        R: FnOnce(HelperError) -> HelperOutput + Send + 'static,
    {
        self.mark_handled();
        let parent = self.0.future.clone();
        Self::on(self.0.chain.clone(), async move {
            match parent.await {
                Ok(value) => Ok(value),
                Err(error) => on_failure(error).adopt().await,
            }
        })
    }

    /// Invoke the helper `name` of the application currently injected into
    /// this promise's chain.
    ///
    /// The call is chained through the chain pointer like any other helper
    /// call, not onto this particular promise.
    pub fn invoke_helper(&self, name: &str, args: Vec<Value>) -> HelperOutput {
        match self.0.chain.upgrade().and_then(|chain| chain.capabilities()) {
            Some(app) => app.invoke(name, args),
            None => HelperOutput::Failed(HelperError::UnknownHelper(name.to_owned())),
        }
    }

    pub(crate) fn mark_handled(&self) { self.0.handled.store(true, Ordering::Release); }

    /// Spawn the link on a current-thread runtime.
    ///
    /// Links are never handed to worker threads: an isolation frame clears
    /// the shared pointer while a continuation runs, so links must advance
    /// only on the task that also issues helper calls. Elsewhere they stay
    /// lazy and are driven by whoever awaits the chain.
    fn drive(&self) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        if !matches!(handle.runtime_flavor(), RuntimeFlavor::CurrentThread) {
            return;
        }
        let future = self.0.future.clone();
        handle.spawn(async move {
            let _ = future.await;
        });
    }
}

/// Evaluate a link, converting panics into rejections and reporting
/// rejections nobody handled. Runs once per promise, whoever polls first.
async fn settle_link<F>(id: PromiseId, chain: WeakChain, handled: Arc<AtomicBool>, future: F) -> HelperResult
where
    F: Future<Output = HelperResult> + Send + 'static,
{
    let result = match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(HelperError::panicked(id.to_string(), &*panic)),
    };
    if let Err(error) = &result {
        if handled.load(Ordering::Acquire) {
            debug!(promise = %id, %error, "rejection handled by continuation");
        } else if let Some(chain) = chain.upgrade() {
            chain.report_unhandled(error);
        }
    }
    result
}

impl PartialEq for ChainedPromise {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl Eq for ChainedPromise {}

impl fmt::Debug for ChainedPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedPromise")
            .field("id", &self.0.id)
            .field("settled", &self.is_settled())
            .finish_non_exhaustive()
    }
}

impl IntoFuture for ChainedPromise {
    type Output = HelperResult;
    type IntoFuture = SharedResult;

    fn into_future(self) -> Self::IntoFuture { self.0.future.clone() }
}
