//! Waiter polling loop.
//!
//! The loop re-evaluates every registered waiter on a fixed interval until
//! all of them report settled, the configured timeout elapses, or the
//! cancellation token fires.

use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::SettleConfig,
    error::{HelperError, Result},
    waiter::WaiterRegistry,
};

/// Poll `waiters` until they all settle.
///
/// The first poll happens immediately.
///
/// # Errors
///
/// Returns [`HelperError::SettleTimeout`] once `config.timeout` elapses and
/// [`HelperError::Cancelled`] if `cancel` fires first.
pub async fn wait_for(waiters: &WaiterRegistry, config: &SettleConfig, cancel: &CancellationToken) -> Result<()> {
    let started = Instant::now();
    let mut ticker = interval(config.effective_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls: u64 = 0;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(polls, "settle loop cancelled");
                return Err(HelperError::Cancelled);
            }
            _ = ticker.tick() => {}
        }
        polls += 1;
        if waiters.all_settled() {
            debug!(polls, "waiters settled");
            return Ok(());
        }
        if let Some(limit) = config.timeout
            && started.elapsed() >= limit
        {
            warn!(polls, ?limit, "waiters did not settle in time");
            return Err(HelperError::SettleTimeout(limit));
        }
    }
}
