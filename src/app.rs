//! Application context handed to helpers.
//!
//! An [`App`] carries arbitrary application state plus the helper mapping
//! injected into it by [`crate::Harness::inject_helpers`]. Helpers look each
//! other up through this mapping instead of a shared global namespace, so
//! removing a helper is just removing its entry.

use std::{
    any::Any,
    fmt,
    sync::{
        Arc,
        PoisonError,
        RwLock,
        Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use serde_json::Value;

use crate::{
    error::HelperError,
    helper::HelperOutput,
    invoker::{HelperInvoker, Injection},
};

static NEXT_APP_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to an application context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AppId(u64);

impl AppId {
    /// Return the inner `u64` representation.
    #[must_use]
    pub fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "AppId({})", self.0) }
}

struct AppInner {
    id: AppId,
    name: String,
    state: Box<dyn Any + Send + Sync>,
    helpers: DashMap<String, HelperInvoker>,
    injection: RwLock<Option<Injection>>,
}

/// Application context passed as the first argument of every helper.
#[derive(Clone)]
pub struct App(Arc<AppInner>);

impl App {
    /// Create a context holding `state`.
    pub fn new<S>(name: impl Into<String>, state: S) -> Self
    where
        S: Any + Send + Sync,
    {
        Self(Arc::new(AppInner {
            id: AppId(NEXT_APP_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            state: Box::new(state),
            helpers: DashMap::new(),
            injection: RwLock::new(None),
        }))
    }

    /// Create a context without application state.
    pub fn named(name: impl Into<String>) -> Self { Self::new(name, ()) }

    /// Identifier of this context.
    #[must_use]
    pub fn id(&self) -> AppId { self.0.id }

    /// Name given at construction.
    #[must_use]
    pub fn name(&self) -> &str { &self.0.name }

    /// Borrow the application state if it has type `S`.
    #[must_use]
    pub fn state<S: Any>(&self) -> Option<&S> { self.0.state.downcast_ref::<S>() }

    /// Invoke the injected helper `name`.
    ///
    /// Unknown names produce a [`HelperError::UnknownHelper`] failure.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> HelperOutput {
        match self.helper(name) {
            Some(invoker) => invoker.invoke(self, args),
            None => HelperOutput::Failed(HelperError::UnknownHelper(name.to_owned())),
        }
    }

    /// Serialize `callback` onto the chain like a waiting helper.
    ///
    /// Helpers called from `callback` form their own sub-chain, which settles
    /// before the returned promise does.
    pub fn and_then<F>(&self, callback: F) -> HelperOutput
    where
        F: FnOnce(&App) -> HelperOutput + Send + 'static,
    {
        let Some(injection) = self.injection() else {
            return HelperOutput::Failed(HelperError::UnknownHelper("and_then".to_owned()));
        };
        let app = self.clone();
        HelperOutput::Promise(injection.schedule("and_then", move || callback(&app)))
    }

    /// Invoker bound to helper `name`, if injected.
    #[must_use]
    pub fn helper(&self, name: &str) -> Option<HelperInvoker> {
        self.0.helpers.get(name).map(|entry| entry.value().clone())
    }

    /// Returns true if helper `name` is injected.
    #[must_use]
    pub fn has_helper(&self, name: &str) -> bool { self.0.helpers.contains_key(name) }

    /// Injected helper names, sorted.
    #[must_use]
    pub fn helper_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.helpers.iter().map(|entry| entry.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Returns true while helpers are injected.
    #[must_use]
    pub fn is_injected(&self) -> bool { self.injection().is_some() }

    pub(crate) fn install(&self, injection: Injection, invokers: Vec<HelperInvoker>) {
        self.0.helpers.clear();
        for invoker in invokers {
            self.0.helpers.insert(invoker.name().to_owned(), invoker);
        }
        *self.0.injection.write().unwrap_or_else(PoisonError::into_inner) = Some(injection);
    }

    pub(crate) fn strip(&self, name: &str) -> bool { self.0.helpers.remove(name).is_some() }

    pub(crate) fn uninstall(&self) {
        self.0.helpers.clear();
        *self.0.injection.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn downgrade(&self) -> WeakApp { WeakApp(Arc::downgrade(&self.0)) }

    fn injection(&self) -> Option<Injection> {
        self.0.injection.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("helpers", &self.helper_names())
            .finish_non_exhaustive()
    }
}

/// Non-owning application handle.
#[derive(Clone)]
pub(crate) struct WeakApp(Weak<AppInner>);

impl WeakApp {
    pub(crate) fn upgrade(&self) -> Option<App> { self.0.upgrade().map(App) }

    pub(crate) fn points_to(&self, app: &App) -> bool { std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(&app.0)) }
}
