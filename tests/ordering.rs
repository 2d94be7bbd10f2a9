//! Waiting helpers run in call order.
//!
//! Each waiting call is chained after the promise created by the previous
//! call, so slow helpers hold back fast ones queued behind them.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use helperchain::{App, HelperError, HelperOutput};
use helperchain_testing::{TestBed, deferred_helper, recording_helper, settle_expect, test_bed};
use proptest::prelude::*;
use rstest::rstest;
use serde_json::{Value, json};

#[rstest]
#[tokio::test(start_paused = true)]
async fn slow_helpers_hold_back_later_calls(test_bed: TestBed) {
    let harness = &test_bed.harness;
    harness.register_async_helper("slow", deferred_helper(&test_bed.log, "slow", Duration::from_millis(50)));
    harness.register_async_helper("fast", recording_helper(&test_bed.log, "fast"));
    test_bed.inject();

    test_bed.app.invoke("slow", Vec::new());
    test_bed.app.invoke("fast", Vec::new());
    test_bed.app.invoke("slow", Vec::new());
    test_bed.app.invoke("fast", Vec::new());
    settle_expect!(harness);

    assert_eq!(test_bed.log.entries(), ["slow", "fast", "slow", "fast"]);
    assert!(test_bed.adapter.is_balanced());
    assert_eq!(test_bed.adapter.starts(), 3);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn set_then_assert_observes_the_flag(test_bed: TestBed) {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);
    test_bed.harness.register_async_helper("set_flag", move |_: &App, _: Vec<Value>| {
        let setter = Arc::clone(&setter);
        HelperOutput::future(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            setter.store(true, Ordering::SeqCst);
            Ok(Value::Null)
        })
    });
    let reader = Arc::clone(&flag);
    test_bed.harness.register_async_helper("assert_flag", move |_: &App, _: Vec<Value>| {
        if reader.load(Ordering::SeqCst) {
            json!(true).into()
        } else {
            HelperError::failed("assert_flag", "flag not set").into()
        }
    });
    test_bed.inject();

    test_bed.app.invoke("set_flag", Vec::new());
    test_bed.app.invoke("assert_flag", Vec::new());

    assert_eq!(settle_expect!(test_bed.harness), json!(true));
    assert!(test_bed.adapter.exceptions().is_empty());
}

#[rstest]
#[tokio::test]
async fn each_waiting_call_moves_the_pointer(test_bed: TestBed) {
    test_bed.recording("visit");
    test_bed.inject();

    let first = test_bed.app.invoke("visit", Vec::new()).into_promise().expect("first link");
    assert_eq!(test_bed.harness.chain_pointer(), Some(first.clone()));

    let second = test_bed.app.invoke("visit", Vec::new()).into_promise().expect("second link");
    assert_ne!(first, second);
    assert_eq!(test_bed.harness.chain_pointer(), Some(second));

    settle_expect!(test_bed.harness);
    assert!(test_bed.harness.chain_pointer().is_none());
}

#[rstest]
#[tokio::test]
async fn settled_waits_for_links_appended_while_waiting(test_bed: TestBed) {
    let log = test_bed.log.clone();
    test_bed.recording("tail");
    test_bed.harness.register_async_helper("head", move |app: &App, _: Vec<Value>| {
        log.push("head");
        let app = app.clone();
        HelperOutput::future(async move {
            tokio::task::yield_now().await;
            // Scheduled while `settled` is already awaiting the old tail.
            app.invoke("tail", Vec::new());
            Ok(Value::Null)
        })
    });
    test_bed.inject();

    test_bed.app.invoke("head", Vec::new());
    settle_expect!(test_bed.harness);

    assert_eq!(test_bed.log.entries(), ["head", "tail"]);
    assert!(test_bed.harness.chain_pointer().is_none());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn async_end_fires_when_the_method_returns(test_bed: TestBed) {
    test_bed.recording("visit");
    test_bed
        .harness
        .register_async_helper("slow", deferred_helper(&test_bed.log, "slow", Duration::from_millis(50)));
    test_bed.inject();

    test_bed.app.invoke("visit", Vec::new());
    let slow = test_bed.app.invoke("slow", Vec::new()).into_promise().expect("slow link");
    assert_eq!((test_bed.adapter.starts(), test_bed.adapter.ends()), (1, 0));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!((test_bed.adapter.starts(), test_bed.adapter.ends()), (1, 1));
    assert!(!slow.is_settled());
    assert_eq!(test_bed.log.entries(), ["visit"]);

    settle_expect!(test_bed.harness);
    assert_eq!(test_bed.log.entries(), ["visit", "slow"]);
    assert_eq!(test_bed.adapter.ends(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_threads_never_run_links_ahead_of_the_chain(test_bed: TestBed) {
    test_bed.recording("first");
    test_bed.recording("third");
    let log = test_bed.log.clone();
    test_bed.harness.register_async_helper("blocking", move |_: &App, _: Vec<Value>| {
        std::thread::sleep(Duration::from_millis(50));
        log.push("blocking");
        HelperOutput::null()
    });
    test_bed.inject();

    test_bed.app.invoke("first", Vec::new());
    test_bed.app.invoke("blocking", Vec::new());
    tokio::time::sleep(Duration::from_millis(20)).await;
    test_bed.app.invoke("third", Vec::new());
    settle_expect!(test_bed.harness);

    assert_eq!(test_bed.log.entries(), ["first", "blocking", "third"]);
    assert!(test_bed.harness.chain_pointer().is_none());
}

fn run_delays(delays: &[u8]) -> Vec<String> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build tokio runtime");

    rt.block_on(async {
        let bed = TestBed::new();
        for (index, delay) in delays.iter().enumerate() {
            let name = format!("step{index}");
            bed.harness.register_async_helper(
                name.clone(),
                deferred_helper(&bed.log, name, Duration::from_millis(u64::from(*delay))),
            );
        }
        bed.inject();
        for index in 0..delays.len() {
            bed.app.invoke(&format!("step{index}"), Vec::new());
        }
        settle_expect!(bed.harness);
        bed.log.entries()
    })
}

proptest! {
    #[test]
    fn waiting_helpers_complete_in_call_order(delays in proptest::collection::vec(0u8..40, 1..8)) {
        let expected: Vec<String> = (0..delays.len()).map(|i| format!("step{i}")).collect();
        prop_assert_eq!(run_delays(&delays), expected);
    }
}
