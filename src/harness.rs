//! The test-helper subsystem.
//!
//! A [`Harness`] owns the helper and waiter registries, the chain
//! coordinator and the test adapter. It exposes the registration API used by
//! test authors, the injection boundary used by application setup, the
//! rejection reporting boundary and the settle entry points.
//!
//! ```
//! use helperchain::{App, Harness, HelperOutput};
//! use serde_json::{Value, json};
//!
//! let harness = Harness::new();
//! harness.register_sync_helper("double", |_: &App, args: Vec<Value>| {
//!     json!(args[0].as_i64().unwrap_or_default() * 2).into()
//! });
//!
//! let app = App::named("blog");
//! harness.inject_helpers(&app);
//! assert_eq!(app.invoke("double", vec![json!(5)]).into_value(), Some(json!(10)));
//! assert!(harness.chain_pointer().is_none());
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    adapter::{TestAdapter, TracingAdapter, report_rejection},
    app::{App, AppId, WeakApp},
    chain::{Chain, ChainedPromise},
    config::SettleConfig,
    error::{HelperError, Result},
    helper::{HelperOptions, HelperOutput},
    invoker::{HelperInvoker, Injection},
    registry::HelperRegistry,
    settle,
    waiter::{WaiterContext, WaiterPredicate, WaiterRegistry},
};

struct HarnessInner {
    registry: HelperRegistry,
    waiters: WaiterRegistry,
    chain: Chain,
    adapter: Arc<dyn TestAdapter>,
    settle: SettleConfig,
    injected: DashMap<AppId, WeakApp>,
    shutdown: Mutex<CancellationToken>,
}

/// Builder for [`Harness`].
///
/// Defaults to a [`TracingAdapter`] and [`SettleConfig::default`].
pub struct HarnessBuilder {
    adapter: Arc<dyn TestAdapter>,
    settle: SettleConfig,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            adapter: Arc::new(TracingAdapter),
            settle: SettleConfig::default(),
        }
    }
}

impl HarnessBuilder {
    /// Report to `adapter` instead of the tracing adapter.
    #[must_use]
    pub fn adapter<A: TestAdapter>(mut self, adapter: Arc<A>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Poll waiters according to `config`.
    #[must_use]
    pub fn settle(mut self, config: SettleConfig) -> Self {
        self.settle = config;
        self
    }

    /// Build the harness.
    #[must_use]
    pub fn build(self) -> Harness {
        let reporter = Arc::clone(&self.adapter);
        let chain = Chain::new(Arc::new(move |error: &HelperError| {
            report_rejection(reporter.as_ref(), error);
        }));
        Harness(Arc::new(HarnessInner {
            registry: HelperRegistry::new(),
            waiters: WaiterRegistry::new(),
            chain,
            adapter: self.adapter,
            settle: self.settle,
            injected: DashMap::new(),
            shutdown: Mutex::new(CancellationToken::new()),
        }))
    }
}

/// Process-level test-helper subsystem. Clones share all state.
#[derive(Clone)]
pub struct Harness(Arc<HarnessInner>);

impl Default for Harness {
    fn default() -> Self { Self::new() }
}

impl Harness {
    /// Create a harness with default settings.
    #[must_use]
    pub fn new() -> Self { HarnessBuilder::default().build() }

    /// Start configuring a harness.
    #[must_use]
    pub fn builder() -> HarnessBuilder { HarnessBuilder::default() }

    /// Register `method` under `name`. Later registrations win.
    ///
    /// Apps injected earlier keep the previous binding until re-injected.
    pub fn register_helper<F>(&self, name: impl Into<String>, method: F, options: HelperOptions)
    where
        F: Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static,
    {
        self.0.registry.register(name, method, options);
    }

    /// Register a helper serialized onto the chain.
    pub fn register_async_helper<F>(&self, name: impl Into<String>, method: F)
    where
        F: Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static,
    {
        self.register_helper(name, method, HelperOptions::waiting());
    }

    /// Register a helper that answers synchronously.
    pub fn register_sync_helper<F>(&self, name: impl Into<String>, method: F)
    where
        F: Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static,
    {
        self.register_helper(name, method, HelperOptions::immediate());
    }

    /// Remove helper `name` from the registry and from every injected app.
    ///
    /// Unknown names are ignored.
    pub fn unregister_helper(&self, name: &str) {
        self.0.registry.unregister(name);
        self.0.injected.retain(|id, weak| match weak.upgrade() {
            Some(app) => {
                if app.strip(name) {
                    debug!(helper = %name, app = %id, "helper stripped from app");
                }
                true
            }
            None => false,
        });
    }

    /// Run `callback` after every future injection.
    pub fn on_inject_helpers<F>(&self, callback: F)
    where
        F: Fn(&App) + Send + Sync + 'static,
    {
        self.0.registry.on_inject(callback);
    }

    /// Register a context-free waiter.
    pub fn register_waiter(&self, predicate: WaiterPredicate) { self.0.waiters.register(predicate); }

    /// Register a waiter evaluated against `context`.
    pub fn register_waiter_with_context(&self, context: WaiterContext, predicate: WaiterPredicate) {
        self.0.waiters.register_with_context(context, predicate);
    }

    /// Remove a context-free waiter. Returns true if one was removed.
    pub fn unregister_waiter(&self, predicate: &WaiterPredicate) -> bool { self.0.waiters.unregister(predicate) }

    /// Remove a contextual waiter. Returns true if one was removed.
    pub fn unregister_waiter_with_context(&self, context: &WaiterContext, predicate: &WaiterPredicate) -> bool {
        self.0.waiters.unregister_with_context(context, predicate)
    }

    /// Bind every registered helper into `app`.
    ///
    /// `app` becomes the capability set of chained promises, then every
    /// injection callback runs with it.
    pub fn inject_helpers(&self, app: &App) {
        let injection = Injection::new(self.0.chain.clone(), Arc::clone(&self.0.adapter));
        let invokers = self
            .0
            .registry
            .snapshot()
            .into_iter()
            .map(|helper| HelperInvoker::new(helper, injection.clone()))
            .collect::<Vec<_>>();
        let count = invokers.len();
        app.install(injection, invokers);
        self.0.chain.set_capabilities(app);
        self.0.injected.insert(app.id(), app.downgrade());
        debug!(app = %app.id(), helpers = count, "helpers injected");

        for callback in self.0.registry.inject_callbacks() {
            callback(app);
        }
    }

    /// Undo [`inject_helpers`](Self::inject_helpers) and reset the chain.
    pub fn remove_helpers(&self, app: &App) {
        app.uninstall();
        self.0.chain.clear_capabilities_for(app);
        self.0.injected.remove(&app.id());
        self.0.chain.reset();
        debug!(app = %app.id(), "helpers removed");
    }

    /// Reporting boundary for rejected helper chains.
    ///
    /// Aborted navigations are ignored; everything else reaches the adapter.
    pub fn on_promise_rejection(&self, error: &HelperError) { report_rejection(self.0.adapter.as_ref(), error); }

    /// Wait for the current chain to settle, then clear the pointer.
    ///
    /// Links appended while waiting are awaited as well. Resolves with
    /// `null` when no chain is pending.
    ///
    /// # Errors
    ///
    /// Returns the error the chain's tail rejected with.
    pub async fn settled(&self) -> Result<Value> {
        loop {
            let Some(tail) = self.0.chain.pointer() else {
                return Ok(Value::Null);
            };
            let result = tail.settle().await;
            if self.0.chain.clear_if(&tail) {
                return result;
            }
        }
    }

    /// Poll registered waiters until they all settle.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::SettleTimeout`] or [`HelperError::Cancelled`]
    /// as described in [`settle::wait_for`].
    pub async fn wait_for_waiters(&self) -> Result<()> {
        let cancel = self.shutdown_token().clone();
        settle::wait_for(&self.0.waiters, &self.0.settle, &cancel).await
    }

    /// Clear waiters, the chain pointer and every injection.
    ///
    /// In-flight settle loops are cancelled.
    pub fn teardown(&self) {
        self.0.waiters.clear();
        self.0.chain.reset();
        self.0.chain.clear_capabilities();
        self.0.injected.retain(|_, weak| {
            if let Some(app) = weak.upgrade() {
                app.uninstall();
            }
            false
        });
        let previous = std::mem::take(&mut *self.shutdown_token());
        previous.cancel();
        debug!("harness torn down");
    }

    /// Chain coordinator shared by every injected app.
    #[must_use]
    pub fn chain(&self) -> &Chain { &self.0.chain }

    /// Current chain pointer.
    #[must_use]
    pub fn chain_pointer(&self) -> Option<ChainedPromise> { self.0.chain.pointer() }

    /// Observe chain pointer changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.0.chain.subscribe() }

    /// Helper registry.
    #[must_use]
    pub fn helpers(&self) -> &HelperRegistry { &self.0.registry }

    /// Waiter registry.
    #[must_use]
    pub fn waiters(&self) -> &WaiterRegistry { &self.0.waiters }

    /// Polling policy used by [`wait_for_waiters`](Self::wait_for_waiters).
    #[must_use]
    pub fn settle_config(&self) -> SettleConfig { self.0.settle }

    fn shutdown_token(&self) -> MutexGuard<'_, CancellationToken> {
        self.0.shutdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn downgrade(&self) -> WeakHarness { WeakHarness(Arc::downgrade(&self.0)) }
}

/// Non-owning harness handle captured by built-in helpers.
#[derive(Clone)]
pub(crate) struct WeakHarness(std::sync::Weak<HarnessInner>);

impl WeakHarness {
    pub(crate) fn upgrade(&self) -> Option<Harness> { self.0.upgrade().map(Harness) }
}
