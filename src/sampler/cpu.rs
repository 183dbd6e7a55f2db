//! CPU tick counters from `/proc/stat`.
//!
//! Each `cpuN` line carries cumulative jiffy counts per mode. Busy time is
//! user + nice + system + irq; total time is busy + idle. The delta between
//! two readings gives per-core utilization as a fraction.

use std::path::PathBuf;
use std::time::Duration;

use super::CounterSource;
use crate::aggregate;

/// Cumulative tick counts for one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreTicks {
    pub busy: u64,
    pub total: u64,
}

/// Tick deltas between two snapshots of one core.
///
/// The deltas are kept rather than a precomputed ratio so that the overall
/// figure can be derived as sum-of-busy over sum-of-total across cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreRate {
    pub delta_busy: u64,
    pub delta_total: u64,
}

impl CoreRate {
    /// Core utilization in `[0.0, 1.0]`; 0 when no ticks elapsed.
    pub fn utilization(&self) -> f64 {
        aggregate::ratio(self.delta_busy as f64, self.delta_total as f64)
    }
}

/// Reads per-core tick counters from a `/proc/stat`-format file.
#[derive(Debug)]
pub struct CpuTickSource {
    path: PathBuf,
}

impl CpuTickSource {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("/proc/stat"),
        }
    }

    /// Reads from an alternative file, for tests and containerized roots.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for CpuTickSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for CpuTickSource {
    type Key = usize;
    type Counter = CoreTicks;
    type Rate = CoreRate;

    fn snapshot(&self) -> std::io::Result<Vec<(usize, CoreTicks)>> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(parse_proc_stat(&text))
    }

    fn rate(prev: CoreTicks, curr: CoreTicks, _elapsed: Duration) -> CoreRate {
        CoreRate {
            delta_busy: curr.busy.saturating_sub(prev.busy),
            delta_total: curr.total.saturating_sub(prev.total),
        }
    }
}

/// Parses the per-core lines of `/proc/stat`, skipping the aggregate `cpu`
/// line and everything that is not a core entry.
pub(crate) fn parse_proc_stat(text: &str) -> Vec<(usize, CoreTicks)> {
    let mut cores = Vec::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(name) = fields.next() else { continue };
        let Some(index) = name
            .strip_prefix("cpu")
            .and_then(|rest| rest.parse::<usize>().ok())
        else {
            continue;
        };

        let ticks: Vec<u64> = fields.map(|f| f.parse().unwrap_or(0)).collect();
        let at = |i: usize| ticks.get(i).copied().unwrap_or(0);
        // user nice system idle iowait irq ...
        let busy = at(0) + at(1) + at(2) + at(5);
        let total = busy + at(3);
        cores.push((index, CoreTicks { busy, total }));
    }
    cores
}
