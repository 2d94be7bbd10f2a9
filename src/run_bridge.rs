//! Batching boundary for chain mutations.
//!
//! [`RunBridge::run_batched`] opens a batch unless one is already open, so
//! nested calls run inline instead of re-entering. Change notifications
//! raised while a batch is open are coalesced into a single publication when
//! the outermost batch closes; observers subscribed through
//! [`RunBridge::subscribe`] therefore see one update per batch.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Batching boundary with coalesced change notification.
#[derive(Debug)]
pub struct RunBridge {
    active: AtomicBool,
    dirty: AtomicBool,
    generation: watch::Sender<u64>,
}

impl Default for RunBridge {
    fn default() -> Self { Self::new() }
}

impl RunBridge {
    /// Create a bridge with no open batch.
    #[must_use]
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            active: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            generation,
        }
    }

    /// Returns true while a batch is open.
    #[must_use]
    pub fn is_active(&self) -> bool { self.active.load(Ordering::Acquire) }

    /// Run `f` inside a batch, opening one only if none is active.
    ///
    /// The batch closes when `f` returns or unwinds.
    pub fn run_batched<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.active.swap(true, Ordering::AcqRel) {
            return f();
        }
        let _batch = Batch { bridge: self };
        f()
    }

    /// Signal that observed state changed.
    ///
    /// Inside a batch the change is deferred until the batch closes.
    pub fn notify(&self) {
        if self.is_active() {
            self.dirty.store(true, Ordering::Release);
        } else {
            self.publish();
        }
    }

    /// Current generation; bumped once per published change.
    #[must_use]
    pub fn generation(&self) -> u64 { *self.generation.borrow() }

    /// Observe published changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.generation.subscribe() }

    fn publish(&self) { self.generation.send_modify(|generation| *generation += 1); }
}

struct Batch<'a> {
    bridge: &'a RunBridge,
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        self.bridge.active.store(false, Ordering::Release);
        if self.bridge.dirty.swap(false, Ordering::AcqRel) {
            self.bridge.publish();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn bridge() -> RunBridge { RunBridge::new() }

    #[rstest]
    fn notifications_outside_a_batch_publish_immediately(bridge: RunBridge) {
        bridge.notify();
        bridge.notify();
        assert_eq!(bridge.generation(), 2);
    }

    #[rstest]
    fn notifications_inside_a_batch_coalesce(bridge: RunBridge) {
        let mut rx = bridge.subscribe();
        bridge.run_batched(|| {
            bridge.notify();
            bridge.notify();
            bridge.notify();
            assert_eq!(bridge.generation(), 0);
        });
        assert_eq!(bridge.generation(), 1);
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[rstest]
    fn nested_batches_run_inline(bridge: RunBridge) {
        let depth = bridge.run_batched(|| {
            bridge.notify();
            bridge.run_batched(|| {
                bridge.notify();
                bridge.is_active()
            })
        });
        assert!(depth);
        assert!(!bridge.is_active());
        assert_eq!(bridge.generation(), 1);
    }

    #[rstest]
    fn quiet_batches_do_not_publish(bridge: RunBridge) {
        bridge.run_batched(|| ());
        assert_eq!(bridge.generation(), 0);
    }

    #[rstest]
    fn unwinding_closes_the_batch(bridge: RunBridge) {
        let result = catch_unwind(AssertUnwindSafe(|| {
            bridge.run_batched(|| {
                bridge.notify();
                panic!("boom");
            });
        }));
        assert!(result.is_err());
        assert!(!bridge.is_active());
        assert_eq!(bridge.generation(), 1);
    }
}
