//! Helper invocation and the chaining algorithm.
//!
//! A [`HelperInvoker`] binds one registered helper to the chain of the
//! harness that injected it. Immediate helpers run synchronously and return
//! their output untouched. Waiting helpers are serialized: the first call on
//! an idle chain runs at once and becomes the chain pointer; later calls are
//! appended after the current pointer and only run once it has settled.

use std::{fmt, sync::Arc};

use serde_json::Value;
use tracing::debug;

use crate::{
    adapter::{AsyncScope, TestAdapter},
    app::App,
    chain::{Chain, ChainedPromise, isolate},
    helper::{Helper, HelperOutput},
    metrics::{self, HelperKind},
};

/// Chain and adapter an application's helpers are bound to.
#[derive(Clone)]
pub(crate) struct Injection {
    chain: Chain,
    adapter: Arc<dyn TestAdapter>,
}

impl Injection {
    pub(crate) fn new(chain: Chain, adapter: Arc<dyn TestAdapter>) -> Self { Self { chain, adapter } }

    /// Serialize `call` onto the chain and return the resulting pointer.
    pub(crate) fn schedule<F>(&self, name: &str, call: F) -> ChainedPromise
    where
        F: FnOnce() -> HelperOutput + Send + 'static,
    {
        match self.chain.pointer() {
            None => {
                debug!(helper = %name, "starting chain");
                isolate(&self.chain.downgrade(), name, call).into_chained(&self.chain)
            }
            Some(last) => {
                debug!(helper = %name, after = %last.id(), "appending to chain");
                let scope = AsyncScope::start(Arc::clone(&self.adapter));
                self.chain.run_batched(|| {
                    last.then(move |_| {
                        let _scope = scope;
                        call()
                    })
                })
            }
        }
    }
}

/// Callable binding a helper to its chain.
#[derive(Clone)]
pub struct HelperInvoker {
    helper: Helper,
    injection: Injection,
}

impl HelperInvoker {
    pub(crate) fn new(helper: Helper, injection: Injection) -> Self { Self { helper, injection } }

    /// Name of the bound helper.
    #[must_use]
    pub fn name(&self) -> &str { self.helper.name() }

    /// Whether calls are serialized onto the chain.
    #[must_use]
    pub fn wait(&self) -> bool { self.helper.wait() }

    /// Invoke the helper with `app` prepended to `args`.
    ///
    /// Immediate helpers return their output directly and never touch the
    /// chain pointer. Waiting helpers always return
    /// [`HelperOutput::Promise`] naming the new chain pointer.
    pub fn invoke(&self, app: &App, args: Vec<Value>) -> HelperOutput {
        if !self.helper.wait() {
            metrics::inc_invocations(HelperKind::Immediate);
            debug!(helper = %self.helper.name(), "invoking immediate helper");
            return self.helper.call(app, args);
        }
        metrics::inc_invocations(HelperKind::Waiting);
        let helper = self.helper.clone();
        let app = app.clone();
        HelperOutput::Promise(
            self.injection
                .schedule(self.helper.name(), move || helper.call(&app, args)),
        )
    }
}

impl fmt::Debug for HelperInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperInvoker")
            .field("helper", &self.helper)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::{adapter::TracingAdapter, helper::HelperOptions};

    #[derive(Default)]
    struct Balance {
        starts: AtomicUsize,
        ends: AtomicUsize,
    }

    impl TestAdapter for Balance {
        fn async_start(&self) { self.starts.fetch_add(1, Ordering::SeqCst); }

        fn async_end(&self) { self.ends.fetch_add(1, Ordering::SeqCst); }

        fn exception(&self, _error: &crate::HelperError) {}
    }

    #[fixture]
    fn injection() -> Injection { Injection::new(Chain::default(), Arc::new(TracingAdapter)) }

    #[rstest]
    fn immediate_helpers_bypass_the_chain(injection: Injection) {
        let invoker = HelperInvoker::new(
            Helper::new(
                "double",
                |_: &App, args: Vec<Value>| json!(args[0].as_i64().unwrap_or_default() * 2).into(),
                HelperOptions::immediate(),
            ),
            injection.clone(),
        );

        let output = invoker.invoke(&App::named("test"), vec![json!(5)]);
        assert_eq!(output.value(), Some(&json!(10)));
        assert!(injection.chain.is_idle());
    }

    #[rstest]
    fn first_waiting_call_runs_at_once(injection: Injection) {
        let calls = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&calls);
        let invoker = HelperInvoker::new(
            Helper::new(
                "visit",
                move |_: &App, _| {
                    *seen.lock().expect("calls lock") += 1;
                    HelperOutput::null()
                },
                HelperOptions::waiting(),
            ),
            injection.clone(),
        );

        let promise = invoker
            .invoke(&App::named("test"), Vec::new())
            .into_promise()
            .expect("waiting helpers return promises");
        assert_eq!(*calls.lock().expect("calls lock"), 1);
        assert_eq!(injection.chain.pointer(), Some(promise));
    }

    #[rstest]
    fn appended_calls_wait_for_the_pointer(injection: Injection) {
        let calls = Arc::new(Mutex::new(0));
        let seen = Arc::clone(&calls);
        let invoker = HelperInvoker::new(
            Helper::new(
                "click",
                move |_: &App, _| {
                    *seen.lock().expect("calls lock") += 1;
                    HelperOutput::null()
                },
                HelperOptions::waiting(),
            ),
            injection.clone(),
        );
        let app = App::named("test");

        let _first = invoker.invoke(&app, Vec::new());
        let second = invoker.invoke(&app, Vec::new()).into_promise().expect("promise");
        assert_eq!(*calls.lock().expect("calls lock"), 1);

        assert_eq!(futures::executor::block_on(second.settle()), Ok(Value::Null));
        assert_eq!(*calls.lock().expect("calls lock"), 2);
    }

    #[test]
    fn appended_links_balance_the_adapter_even_on_rejection() {
        let adapter = Arc::new(Balance::default());
        let injection = Injection::new(Chain::default(), Arc::clone(&adapter) as Arc<dyn TestAdapter>);

        let failing = injection.schedule("fail", || HelperOutput::Failed(crate::HelperError::Cancelled));
        let after = injection.schedule("after", HelperOutput::null);
        assert_eq!(adapter.starts.load(Ordering::SeqCst), 1);

        let result = futures::executor::block_on(after.settle());
        assert_eq!(result, Err(crate::HelperError::Cancelled));
        assert!(failing.is_settled());
        assert_eq!(adapter.ends.load(Ordering::SeqCst), 1);
    }
}
