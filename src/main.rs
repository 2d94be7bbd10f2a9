//! Demo binary for `helperchain`.
//!
//! Registers a `step` helper, chains the requested number of calls and
//! prints the order in which the helper methods ran.

mod cli;

use std::{
    process::ExitCode,
    sync::{Arc, Mutex, PoisonError},
};

use clap::Parser;
use helperchain::{App, Harness, HelperError, HelperOutput, register_builtins};
use serde_json::{Value, json};

type Trace = Arc<Mutex<Vec<String>>>;

fn record(trace: &Trace, line: String) { trace.lock().unwrap_or_else(PoisonError::into_inner).push(line); }

fn step_number(args: &[Value]) -> u64 { args.first().and_then(Value::as_u64).unwrap_or_default() }

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let trace: Trace = Arc::default();
    let harness = Harness::new();
    register_builtins(&harness);

    let step_trace = Arc::clone(&trace);
    let fail_at = cli.fail_at;
    harness.register_async_helper("step", move |_: &App, args: Vec<Value>| {
        let n = step_number(&args);
        record(&step_trace, format!("step {n}"));
        if fail_at == Some(n) {
            HelperError::failed("step", format!("step {n} failed")).into()
        } else {
            json!(n).into()
        }
    });
    let note_trace = Arc::clone(&trace);
    harness.register_async_helper("note", move |_: &App, args: Vec<Value>| {
        record(&note_trace, format!("  note {}", step_number(&args)));
        HelperOutput::null()
    });

    let app = App::named("demo");
    harness.inject_helpers(&app);
    for n in 1..=cli.steps {
        app.invoke("step", vec![json!(n)]);
        if cli.nested {
            app.and_then(move |app| app.invoke("note", vec![json!(n)]));
        }
    }

    let result = harness.settled().await;
    for line in trace.lock().unwrap_or_else(PoisonError::into_inner).iter() {
        println!("{line}");
    }
    match result {
        Ok(value) => {
            println!("settled with {value}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("chain rejected: {error}");
            ExitCode::FAILURE
        }
    }
}
