//! Isolation frames around chained continuations.
//!
//! While a continuation runs, the chain pointer still names the tail of the
//! outer chain, which already contains the continuation's own promise.
//! Appending nested helper calls there would make them wait on themselves.
//! An [`IsolationFrame`] therefore saves and clears the pointer for the
//! duration of the continuation, lets nested helpers build a sub-chain, and
//! restores the saved pointer when dropped. Restoration happens on every exit
//! path, unwinding included.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value;

use super::{Chain, ChainedPromise, WeakChain};
use crate::{error::HelperError, helper::HelperOutput};

/// Guard holding the outer chain pointer for the lifetime of a continuation.
pub(crate) struct IsolationFrame<'a> {
    chain: &'a Chain,
    outer: Option<ChainedPromise>,
}

impl<'a> IsolationFrame<'a> {
    /// Save and clear the pointer.
    pub(crate) fn enter(chain: &'a Chain) -> Self {
        let outer = chain.replace(None);
        Self { chain, outer }
    }

    /// Pointer left behind by helpers invoked inside the frame.
    pub(crate) fn inner(&self) -> Option<ChainedPromise> { self.chain.pointer() }
}

impl Drop for IsolationFrame<'_> {
    fn drop(&mut self) { self.chain.replace(self.outer.take()); }
}

/// Run `f` inside an isolation frame and collapse any sub-chain it started.
///
/// A thenable output, or a plain output when no nested helper ran, is
/// returned as-is. A plain value produced while nested helpers left a
/// sub-chain behind is deferred until that sub-chain settles. Panics become
/// [`HelperError::Panicked`] rejections labelled with `context`.
pub(crate) fn isolate<F>(chain: &WeakChain, context: &str, f: F) -> HelperOutput
where
    F: FnOnce() -> HelperOutput,
{
    let Some(chain) = chain.upgrade() else {
        return guarded(context, f);
    };
    chain.run_batched(|| {
        let frame = IsolationFrame::enter(&chain);
        let output = guarded(context, f);
        let output = match (output, frame.inner()) {
            (HelperOutput::Value(value), Some(inner)) => HelperOutput::Promise(collapse(&inner, value)),
            (output, _) => output,
        };
        drop(frame);
        output
    })
}

/// Resolve with `value` once the sub-chain ending at `inner` settles.
///
/// Kept out of the generic `isolate` so `then` is not instantiated with a
/// closure type that depends on the continuation type.
fn collapse(inner: &ChainedPromise, value: Value) -> ChainedPromise {
    inner.then(move |_| HelperOutput::Value(value))
}

fn guarded<F>(context: &str, f: F) -> HelperOutput
where
    F: FnOnce() -> HelperOutput,
{
    catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|panic| HelperOutput::Failed(HelperError::panicked(context, &*panic)))
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    #[fixture]
    fn chain() -> Chain { Chain::default() }

    #[rstest]
    fn frame_restores_the_outer_pointer(chain: Chain) {
        let outer = ChainedPromise::resolved(&chain, json!("outer"));
        {
            let frame = IsolationFrame::enter(&chain);
            assert!(chain.is_idle());
            let nested = ChainedPromise::resolved(&chain, json!("nested"));
            assert_eq!(frame.inner(), Some(nested));
        }
        assert_eq!(chain.pointer(), Some(outer));
    }

    #[rstest]
    fn plain_value_without_nested_helpers_passes_through(chain: Chain) {
        let outer = ChainedPromise::resolved(&chain, Value::Null);
        let output = isolate(&chain.downgrade(), "test", || HelperOutput::Value(json!(7)));

        assert_eq!(output.value(), Some(&json!(7)));
        assert_eq!(chain.pointer(), Some(outer));
    }

    #[rstest]
    #[tokio::test]
    async fn plain_value_waits_for_the_sub_chain(chain: Chain) {
        let outer = ChainedPromise::resolved(&chain, Value::Null);
        let weak = chain.downgrade();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let output = isolate(&weak, "test", || {
            ChainedPromise::new(&chain, async move {
                rx.await.map_err(|_| HelperError::Cancelled)?;
                Ok(Value::Null)
            });
            HelperOutput::Value(json!("done"))
        });

        let collapsed = output.into_promise().expect("sub-chain collapses into a promise");
        assert_eq!(chain.pointer(), Some(outer));
        assert!(!collapsed.is_settled());

        tx.send(()).expect("receiver alive");
        assert_eq!(collapsed.await, Ok(json!("done")));
    }

    #[rstest]
    fn panics_restore_the_pointer_and_reject(chain: Chain) {
        let outer = ChainedPromise::resolved(&chain, Value::Null);
        let output = isolate(&chain.downgrade(), "click", || {
            ChainedPromise::resolved(&chain, Value::Null);
            panic!("boom")
        });

        assert!(matches!(
            output,
            HelperOutput::Failed(HelperError::Panicked { ref context, ref message })
                if context == "click" && message == "boom"
        ));
        assert_eq!(chain.pointer(), Some(outer));
    }

    #[rstest]
    fn nested_frames_restore_in_order(chain: Chain) {
        let outer = ChainedPromise::resolved(&chain, Value::Null);
        let weak = chain.downgrade();
        let output = isolate(&weak, "outer", || {
            let middle = ChainedPromise::resolved(&chain, Value::Null);
            let inner_output = isolate(&weak, "inner", || HelperOutput::Value(json!(1)));
            assert_eq!(chain.pointer(), Some(middle.clone()));
            assert_eq!(inner_output.value(), Some(&json!(1)));
            HelperOutput::Promise(middle)
        });

        assert!(output.is_thenable());
        assert_eq!(chain.pointer(), Some(outer));
    }

    #[rstest]
    fn an_isolated_continuation_publishes_once(chain: Chain) {
        ChainedPromise::resolved(&chain, Value::Null);
        let before = chain.generation();
        let _ = isolate(&chain.downgrade(), "test", || {
            ChainedPromise::resolved(&chain, Value::Null);
            ChainedPromise::resolved(&chain, Value::Null);
            HelperOutput::null()
        });
        assert_eq!(chain.generation(), before + 1);
    }

    #[rstest]
    #[tokio::test]
    async fn then_collapses_nested_links_into_the_continuation_value(chain: Chain) {
        let nested = chain.clone();
        let link = ChainedPromise::resolved(&chain, json!(1)).then(move |_| {
            ChainedPromise::resolved(&nested, json!("nested"));
            HelperOutput::Value(json!("outer"))
        });
        let recovered = ChainedPromise::rejected(&chain, HelperError::Cancelled).then_or_else(
            |_| HelperOutput::null(),
            |_| HelperOutput::Value(json!("recovered")),
        );

        assert_eq!(link.await, Ok(json!("outer")));
        assert_eq!(recovered.await, Ok(json!("recovered")));
    }
}
