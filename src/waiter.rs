//! Idle-detection predicates polled before a test proceeds.
//!
//! Waiters are kept in registration order. Removal is structural: a pair is
//! removed when its context equals the requested context by value and its
//! predicate is the same `Arc` allocation, regardless of which handle was
//! used to register it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// Receiver passed to a waiter predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct WaiterContext(Value);

impl WaiterContext {
    /// Wrap a context value.
    #[must_use]
    pub fn new(value: Value) -> Self { Self(value) }

    /// Borrow the wrapped value.
    #[must_use]
    pub fn value(&self) -> &Value { &self.0 }
}

impl From<Value> for WaiterContext {
    fn from(value: Value) -> Self { Self(value) }
}

/// Predicate returning true once the application is idle.
pub type WaiterPredicate = Arc<dyn Fn(Option<&WaiterContext>) -> bool + Send + Sync>;

/// Build a [`WaiterPredicate`] from a closure.
pub fn predicate<F>(f: F) -> WaiterPredicate
where
    F: Fn(Option<&WaiterContext>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A registered (context, predicate) pair.
#[derive(Clone)]
pub struct Waiter {
    context: Option<WaiterContext>,
    predicate: WaiterPredicate,
}

impl Waiter {
    /// Context passed to the predicate, if any.
    #[must_use]
    pub fn context(&self) -> Option<&WaiterContext> { self.context.as_ref() }

    /// Evaluate the predicate against its context.
    #[must_use]
    pub fn is_settled(&self) -> bool { (self.predicate)(self.context.as_ref()) }

    fn matches(&self, context: Option<&WaiterContext>, predicate: &WaiterPredicate) -> bool {
        self.context.as_ref() == context
            && std::ptr::addr_eq(Arc::as_ptr(&self.predicate), Arc::as_ptr(predicate))
    }
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of waiters. Clones refer to the same storage.
#[derive(Clone, Default)]
pub struct WaiterRegistry(Arc<Mutex<Vec<Waiter>>>);

impl WaiterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append a predicate evaluated without a context.
    pub fn register(&self, predicate: WaiterPredicate) { self.push(None, predicate); }

    /// Append a predicate evaluated against `context`.
    pub fn register_with_context(&self, context: WaiterContext, predicate: WaiterPredicate) {
        self.push(Some(context), predicate);
    }

    /// Remove the first context-free pair using `predicate`.
    ///
    /// Returns true if a waiter was removed.
    pub fn unregister(&self, predicate: &WaiterPredicate) -> bool { self.remove(None, predicate) }

    /// Remove the first pair whose context equals `context` and whose
    /// predicate is `predicate`.
    ///
    /// Returns true if a waiter was removed.
    pub fn unregister_with_context(&self, context: &WaiterContext, predicate: &WaiterPredicate) -> bool {
        self.remove(Some(context), predicate)
    }

    /// Registered waiters at this instant.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Waiter> { self.lock().clone() }

    /// Poll every waiter; true only if each one reports settled.
    ///
    /// Predicates run outside the registry lock so they may register or
    /// remove waiters themselves.
    #[must_use]
    pub fn all_settled(&self) -> bool { self.snapshot().iter().all(Waiter::is_settled) }

    /// Number of registered waiters.
    #[must_use]
    pub fn len(&self) -> usize { self.lock().len() }

    /// Returns true when no waiter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    /// Drop every waiter.
    pub fn clear(&self) { self.lock().clear(); }

    fn push(&self, context: Option<WaiterContext>, predicate: WaiterPredicate) {
        self.lock().push(Waiter { context, predicate });
    }

    fn remove(&self, context: Option<&WaiterContext>, predicate: &WaiterPredicate) -> bool {
        let mut waiters = self.lock();
        match waiters.iter().position(|w| w.matches(context, predicate)) {
            Some(index) => {
                waiters.remove(index);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Waiter>> { self.0.lock().unwrap_or_else(PoisonError::into_inner) }
}
