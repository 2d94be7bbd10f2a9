//! The helper chain coordinator.
//!
//! [`Chain`] owns the chain pointer: the most recently created
//! [`ChainedPromise`], which the next waiting helper call must wait on. Every
//! read and write of the pointer goes through this type. Mutations are
//! published through a [`RunBridge`], so observers see one update per batch.
//!
//! The chain also carries the capability set used by
//! [`ChainedPromise::invoke_helper`] and the sink that receives rejections no
//! continuation handled.

mod isolation;
mod promise;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

pub(crate) use isolation::isolate;
pub use promise::{ChainedPromise, PromiseId};
use tokio::sync::watch;
use tracing::warn;

use crate::{
    app::{App, WeakApp},
    error::HelperError,
    run_bridge::RunBridge,
};

/// Callback receiving rejections that no continuation handled.
pub type RejectionSink = Arc<dyn Fn(&HelperError) + Send + Sync>;

pub(crate) struct ChainInner {
    pointer: Mutex<Option<ChainedPromise>>,
    bridge: RunBridge,
    capabilities: RwLock<Option<WeakApp>>,
    sink: RejectionSink,
}

/// Coordinator owning the chain pointer. Clones share one pointer.
#[derive(Clone)]
pub struct Chain(Arc<ChainInner>);

impl Default for Chain {
    fn default() -> Self {
        Self::new(Arc::new(|error: &HelperError| {
            warn!(%error, "unhandled rejection on detached chain");
        }))
    }
}

impl Chain {
    /// Create a chain reporting unhandled rejections to `sink`.
    #[must_use]
    pub fn new(sink: RejectionSink) -> Self {
        Self(Arc::new(ChainInner {
            pointer: Mutex::new(None),
            bridge: RunBridge::new(),
            capabilities: RwLock::new(None),
            sink,
        }))
    }

    /// The promise the next waiting helper call will wait on.
    #[must_use]
    pub fn pointer(&self) -> Option<ChainedPromise> { self.lock().clone() }

    /// Returns true when no chain is pending.
    #[must_use]
    pub fn is_idle(&self) -> bool { self.lock().is_none() }

    /// Clear the pointer so the next waiting helper call starts a fresh chain.
    pub fn reset(&self) { self.replace(None); }

    /// Clear the pointer only if it still names `promise`.
    ///
    /// Returns true if the pointer was cleared.
    pub fn clear_if(&self, promise: &ChainedPromise) -> bool {
        let cleared = {
            let mut pointer = self.lock();
            if pointer.as_ref() == Some(promise) {
                pointer.take()
            } else {
                None
            }
        };
        let changed = cleared.is_some();
        if changed {
            self.0.bridge.notify();
        }
        changed
    }

    /// Run `f` inside the chain's batching boundary.
    pub fn run_batched<R>(&self, f: impl FnOnce() -> R) -> R { self.0.bridge.run_batched(f) }

    /// Observe pointer changes; the value is a generation counter.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.0.bridge.subscribe() }

    /// Number of published pointer changes so far.
    #[must_use]
    pub fn generation(&self) -> u64 { self.0.bridge.generation() }

    /// The application whose helpers chained promises dispatch to.
    #[must_use]
    pub fn capabilities(&self) -> Option<App> {
        self.0
            .capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(WeakApp::upgrade)
    }

    pub(crate) fn set_capabilities(&self, app: &App) {
        *self.0.capabilities.write().unwrap_or_else(PoisonError::into_inner) = Some(app.downgrade());
    }

    /// Drop the capability set if it belongs to `app`.
    pub(crate) fn clear_capabilities_for(&self, app: &App) {
        let mut slot = self.0.capabilities.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|weak| weak.points_to(app)) {
            *slot = None;
        }
    }

    pub(crate) fn clear_capabilities(&self) {
        *self.0.capabilities.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Make `promise` the chain pointer.
    pub(crate) fn record(&self, promise: ChainedPromise) { self.replace(Some(promise)); }

    /// Swap the pointer, publishing a change when the promise differs.
    pub(crate) fn replace(&self, next: Option<ChainedPromise>) -> Option<ChainedPromise> {
        let (previous, changed) = {
            let mut pointer = self.lock();
            let changed = pointer.as_ref().map(ChainedPromise::id) != next.as_ref().map(ChainedPromise::id);
            (std::mem::replace(&mut *pointer, next), changed)
        };
        if changed {
            self.0.bridge.notify();
        }
        previous
    }

    pub(crate) fn report_unhandled(&self, error: &HelperError) { (self.0.sink)(error); }

    pub(crate) fn downgrade(&self) -> WeakChain { WeakChain(Arc::downgrade(&self.0)) }

    fn lock(&self) -> MutexGuard<'_, Option<ChainedPromise>> {
        self.0.pointer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("pointer", &self.pointer().map(|p| p.id()))
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

/// Non-owning handle kept by promises so the chain can be dropped while
/// links are still pending.
#[derive(Clone)]
pub(crate) struct WeakChain(Weak<ChainInner>);

impl WeakChain {
    pub(crate) fn upgrade(&self) -> Option<Chain> { self.0.upgrade().map(Chain) }
}
