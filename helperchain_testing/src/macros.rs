//! Assertion macros shared by integration tests.

/// Await [`Harness::settled`](helperchain::Harness::settled) and panic with
/// the call site if the chain rejected.
#[macro_export]
macro_rules! settle_expect {
    ($harness:expr) => {{
        $harness
            .settled()
            .await
            .expect(concat!("chain rejected at ", file!(), ":", line!()))
    }};
    ($harness:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $harness.settled().await.expect(&m)
    }};
}

/// Await a promise or helper output and panic with the call site if it
/// rejected.
#[macro_export]
macro_rules! resolve_expect {
    ($output:expr) => {{
        $output
            .settle()
            .await
            .expect(concat!("helper rejected at ", file!(), ":", line!()))
    }};
    ($output:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $output.settle().await.expect(&m)
    }};
}

pub use crate::{resolve_expect, settle_expect};
