//! Generic delta-rate sampling over monotonically increasing OS counters.
//!
//! A single counter reading carries no rate information; only the difference
//! between two readings does. [`DeltaSampler`] owns that state: it holds the
//! previous snapshot per logical key (CPU core, network interface), computes
//! `rate = delta(counter) / delta(time)` and keeps the figures fresh with a
//! background resampling loop.
//!
//! The loop is lazy. The first [`DeltaSampler::rates`] call takes snapshot #1,
//! waits a short warm-up, takes snapshot #2, computes the first real rates and
//! only then spawns the repeating loop. Subsequent calls return the most
//! recently computed rates without blocking on a new sample. [`DeltaSampler::stop`]
//! cancels the loop and discards all snapshots; the next read restarts the
//! warm-up from scratch.
//!
//! A single running flag under one mutex guarantees that concurrent first
//! reads never spawn duplicate loops, and the reported key set always tracks
//! the current snapshot: keys that appear start at a zero rate, keys that
//! disappear are dropped.

pub mod cpu;
pub mod net;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::ResultOkLogExt;

/// Delay between the first and second snapshot of a cold start.
const WARMUP: Duration = Duration::from_millis(50);

/// A source of monotonically non-decreasing counters, keyed by logical
/// entity.
pub trait CounterSource: Send + Sync + 'static {
    /// Logical entity identifier: core index, interface name.
    type Key: Eq + std::hash::Hash + Clone + Send + Sync + 'static;
    /// One counter observation for a key.
    type Counter: Copy + Send + Sync + 'static;
    /// The derived rate for a key.
    type Rate: Clone + Default + Send + Sync + 'static;

    /// Reads one observation of every live counter.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the backing pseudo-file cannot be read; the
    /// sampler treats this as an empty snapshot.
    fn snapshot(&self) -> std::io::Result<Vec<(Self::Key, Self::Counter)>>;

    /// Derives a rate from two observations taken `elapsed` apart.
    ///
    /// Implementations must define the rate as zero when the denominator is
    /// zero (no elapsed counter activity, zero wall-clock delta), never as
    /// `NaN` or a panic.
    fn rate(prev: Self::Counter, curr: Self::Counter, elapsed: Duration) -> Self::Rate;
}

struct Snapshot<S: CounterSource> {
    at: Instant,
    counters: Vec<(S::Key, S::Counter)>,
}

struct State<S: CounterSource> {
    running: bool,
    task: Option<JoinHandle<()>>,
    prev: Option<Snapshot<S>>,
    rates: Vec<(S::Key, S::Rate)>,
}

struct Inner<S: CounterSource> {
    source: S,
    interval_ms: AtomicU64,
    state: Mutex<State<S>>,
}

impl<S: CounterSource> Inner<S> {
    fn take_snapshot(&self) -> Option<Snapshot<S>> {
        self.source
            .snapshot()
            .ok_debug("taking counter snapshot")
            .map(|counters| Snapshot {
                at: Instant::now(),
                counters,
            })
    }
}

/// Stateful rate sampler for one counter domain.
///
/// Cheap to share: the handle clones an `Arc` to the shared state.
pub struct DeltaSampler<S: CounterSource> {
    inner: Arc<Inner<S>>,
}

impl<S: CounterSource> DeltaSampler<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                interval_ms: AtomicU64::new(interval_millis(interval)),
                state: Mutex::new(State {
                    running: false,
                    task: None,
                    prev: None,
                    rates: Vec::new(),
                }),
            }),
        }
    }

    /// Changes the resampling interval. Takes effect from the next tick.
    pub fn set_interval(&self, interval: Duration) {
        self.inner
            .interval_ms
            .store(interval_millis(interval), Ordering::Relaxed);
    }

    /// Returns the current rates, starting the sampling loop if necessary.
    ///
    /// A cold start blocks for the warm-up delay so that the first caller
    /// already receives a real rate; every later call returns the figures
    /// from the most recent background tick.
    pub async fn rates(&self) -> Vec<(S::Key, S::Rate)> {
        let mut state = self.inner.state.lock().await;
        if !state.running {
            let first = self.inner.take_snapshot();
            tokio::time::sleep(WARMUP).await;
            let second = self.inner.take_snapshot();
            state.rates = compute_rates::<S>(first.as_ref(), second.as_ref());
            state.prev = second.or(first);
            state.running = true;
            state.task = Some(tokio::spawn(sample_loop(Arc::downgrade(&self.inner))));
        }
        state.rates.clone()
    }

    /// Stops the sampling loop and discards all snapshots.
    ///
    /// Idempotent; safe to call when the sampler never started. The next
    /// [`DeltaSampler::rates`] call restarts the warm-up protocol.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.running = false;
        state.prev = None;
        state.rates.clear();
    }
}

fn interval_millis(interval: Duration) -> u64 {
    (interval.as_millis() as u64).max(1)
}

fn compute_rates<S: CounterSource>(
    prev: Option<&Snapshot<S>>,
    curr: Option<&Snapshot<S>>,
) -> Vec<(S::Key, S::Rate)> {
    let (Some(prev), Some(curr)) = (prev, curr) else {
        return Vec::new();
    };
    let elapsed = curr.at.duration_since(prev.at);
    let previous: HashMap<&S::Key, S::Counter> =
        prev.counters.iter().map(|(k, c)| (k, *c)).collect();

    curr.counters
        .iter()
        .map(|(key, counter)| {
            let rate = match previous.get(key) {
                Some(p) => S::rate(*p, *counter, elapsed),
                None => S::Rate::default(),
            };
            (key.clone(), rate)
        })
        .collect()
}

async fn sample_loop<S: CounterSource>(inner: Weak<Inner<S>>) {
    loop {
        let interval = {
            let Some(inner) = inner.upgrade() else { return };
            Duration::from_millis(inner.interval_ms.load(Ordering::Relaxed))
        };
        tokio::time::sleep(interval).await;

        let Some(inner) = inner.upgrade() else { return };
        let snapshot = inner.take_snapshot();
        let mut state = inner.state.lock().await;
        if !state.running {
            return;
        }
        state.rates = compute_rates::<S>(state.prev.as_ref(), snapshot.as_ref());
        if snapshot.is_some() {
            state.prev = snapshot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;

    /// Replays a fixed sequence of snapshots, repeating the last one.
    struct ScriptedSource {
        snapshots: StdMutex<Vec<Vec<(u32, (u64, u64))>>>,
        cursor: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(snapshots: Vec<Vec<(u32, (u64, u64))>>) -> Self {
            Self {
                snapshots: StdMutex::new(snapshots),
                cursor: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.cursor.load(Ordering::SeqCst)
        }
    }

    impl CounterSource for ScriptedSource {
        type Key = u32;
        type Counter = (u64, u64);
        type Rate = f64;

        fn snapshot(&self) -> std::io::Result<Vec<(u32, (u64, u64))>> {
            let snapshots = self.snapshots.lock().unwrap();
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            Ok(snapshots[index.min(snapshots.len() - 1)].clone())
        }

        fn rate(prev: (u64, u64), curr: (u64, u64), _elapsed: Duration) -> f64 {
            let delta_value = curr.0.saturating_sub(prev.0);
            let delta_total = curr.1.saturating_sub(prev.1);
            if delta_total == 0 {
                return 0.0;
            }
            delta_value as f64 / delta_total as f64
        }
    }

    fn sampler(snapshots: Vec<Vec<(u32, (u64, u64))>>) -> DeltaSampler<ScriptedSource> {
        DeltaSampler::new(ScriptedSource::new(snapshots), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_cold_start_computes_rate_from_two_snapshots() {
        let sampler = sampler(vec![vec![(0, (10, 100))], vec![(0, (30, 300))]]);
        let rates = sampler.rates().await;
        assert_eq!(rates, vec![(0, 0.1)]);
    }

    #[tokio::test]
    async fn test_zero_total_delta_yields_zero_rate() {
        let sampler = sampler(vec![vec![(0, (10, 100))], vec![(0, (10, 100))]]);
        let rates = sampler.rates().await;
        assert_eq!(rates, vec![(0, 0.0)]);
    }

    #[tokio::test]
    async fn test_running_sampler_does_not_rewarm() {
        let sampler = sampler(vec![vec![(0, (10, 100))], vec![(0, (30, 300))]]);
        sampler.rates().await;
        let calls_after_start = sampler.inner.source.calls();
        sampler.rates().await;
        assert_eq!(sampler.inner.source.calls(), calls_after_start);
    }

    #[tokio::test]
    async fn test_concurrent_cold_starts_warm_up_once() {
        let sampler = sampler(vec![vec![(0, (10, 100))], vec![(0, (30, 300))]]);
        let (a, b) = tokio::join!(sampler.rates(), sampler.rates());
        assert_eq!(a, vec![(0, 0.1)]);
        assert_eq!(b, vec![(0, 0.1)]);
        // Two snapshots for the single warm-up, none for the second caller.
        assert_eq!(sampler.inner.source.calls(), 2);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let sampler = sampler(vec![vec![(0, (10, 100))]]);
        sampler.stop().await;
        sampler.stop().await;
        sampler.rates().await;
        sampler.stop().await;
        sampler.stop().await;
    }

    #[tokio::test]
    async fn test_restart_after_stop_rewarms() {
        let sampler = sampler(vec![
            vec![(0, (10, 100))],
            vec![(0, (30, 300))],
            vec![(0, (30, 300))],
            vec![(0, (90, 500))],
        ]);
        assert_eq!(sampler.rates().await, vec![(0, 0.1)]);
        sampler.stop().await;
        // Warm-up runs again over snapshots #3 and #4.
        assert_eq!(sampler.rates().await, vec![(0, 0.3)]);
    }

    #[tokio::test]
    async fn test_key_set_tracks_current_snapshot() {
        let sampler = sampler(vec![
            vec![(0, (10, 100)), (1, (0, 100))],
            vec![(0, (30, 300)), (2, (5, 50))],
        ]);
        let rates = sampler.rates().await;
        // Key 1 disappeared; key 2 is new and starts at the default rate.
        assert_eq!(rates, vec![(0, 0.1), (2, 0.0)]);
    }

    #[tokio::test]
    async fn test_background_loop_advances_rates() {
        let source = ScriptedSource::new(vec![
            vec![(0, (0, 100))],
            vec![(0, (50, 200))],
            vec![(0, (80, 300))],
        ]);
        let sampler = DeltaSampler::new(source, Duration::from_millis(20));
        assert_eq!(sampler.rates().await, vec![(0, 0.5)]);
        // Once the script is exhausted the source repeats its last snapshot,
        // so the loop settles on a zero delta.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sampler.rates().await, vec![(0, 0.0)]);
    }

    #[tokio::test]
    async fn test_snapshot_failure_yields_empty_rates() {
        struct FailingSource;
        impl CounterSource for FailingSource {
            type Key = u32;
            type Counter = u64;
            type Rate = f64;
            fn snapshot(&self) -> std::io::Result<Vec<(u32, u64)>> {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))
            }
            fn rate(_: u64, _: u64, _: Duration) -> f64 {
                0.0
            }
        }
        let sampler = DeltaSampler::new(FailingSource, Duration::from_secs(60));
        assert!(sampler.rates().await.is_empty());
    }
}
