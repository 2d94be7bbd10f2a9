//! Registry of helpers available for injection.
//!
//! `HelperRegistry` maps helper names to [`Helper`]s and keeps the callbacks
//! run after every injection. It is pure data: registering never touches apps
//! that were already injected, and removing a missing name is a no-op.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde_json::Value;
use tracing::debug;

use crate::{
    app::App,
    helper::{Helper, HelperOptions, HelperOutput},
};

/// Callback invoked with every freshly injected application.
pub type InjectCallback = Arc<dyn Fn(&App) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    helpers: HashMap<String, Helper>,
    on_inject: Vec<InjectCallback>,
}

/// Shared helper registry. Clones refer to the same storage.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl HelperRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `method` under `name`, replacing any previous registration.
    pub fn register<F>(&self, name: impl Into<String>, method: F, options: HelperOptions)
    where
        F: Fn(&App, Vec<Value>) -> HelperOutput + Send + Sync + 'static,
    {
        self.insert(Helper::new(name, method, options));
    }

    /// Store an already-built helper, replacing any previous registration.
    pub fn insert(&self, helper: Helper) {
        let name = helper.name().to_owned();
        let replaced = self.write().helpers.insert(name.clone(), helper).is_some();
        debug!(helper = %name, replaced, "helper registered");
    }

    /// Remove the helper registered under `name`.
    ///
    /// Returns the removed helper; unknown names yield `None`.
    pub fn unregister(&self, name: &str) -> Option<Helper> {
        let removed = self.write().helpers.remove(name);
        if removed.is_some() {
            debug!(helper = %name, "helper unregistered");
        }
        removed
    }

    /// Look up the helper registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Helper> { self.read().helpers.get(name).cloned() }

    /// Registered helpers at this instant.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Helper> { self.read().helpers.values().cloned().collect() }

    /// Registered helper names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().helpers.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered helpers.
    #[must_use]
    pub fn len(&self) -> usize { self.read().helpers.len() }

    /// Returns true when no helper is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.read().helpers.is_empty() }

    /// Add a callback run after every injection.
    pub fn on_inject<F>(&self, callback: F)
    where
        F: Fn(&App) + Send + Sync + 'static,
    {
        self.write().on_inject.push(Arc::new(callback));
    }

    /// Injection callbacks in registration order.
    #[must_use]
    pub fn inject_callbacks(&self) -> Vec<InjectCallback> { self.read().on_inject.clone() }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
