//! Capturing `helperchain` metrics with a local debugging recorder.

use metrics_util::debugging::{DebugValue, DebuggingRecorder};

/// Counter values captured by [`record_metrics`].
#[derive(Debug, Default)]
pub struct CounterSnapshot(Vec<(String, Vec<(String, String)>, u64)>);

impl CounterSnapshot {
    /// Sum of counter `name`, optionally restricted to one label pair.
    #[must_use]
    pub fn counter(&self, name: &str, label: Option<(&str, &str)>) -> u64 {
        self.0
            .iter()
            .filter(|(key, ..)| key == name)
            .filter(|(_, labels, _)| label.is_none_or(|(k, v)| labels.iter().any(|(lk, lv)| lk == k && lv == v)))
            .map(|(.., count)| count)
            .sum()
    }
}

/// Run `f` with a thread-local debugging recorder installed.
///
/// Only work that completes inside `f` is captured, so `f` should drive any
/// chain it builds to completion, e.g. with a blocking executor.
pub fn record_metrics<F, R>(f: F) -> (CounterSnapshot, R)
where
    F: FnOnce() -> R,
{
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let result = metrics::with_local_recorder(&recorder, f);
    let counters = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(count) => {
                let labels = key
                    .key()
                    .labels()
                    .map(|l| (l.key().to_owned(), l.value().to_owned()))
                    .collect();
                Some((key.key().name().to_owned(), labels, count))
            }
            _ => None,
        })
        .collect();
    (CounterSnapshot(counters), result)
}
