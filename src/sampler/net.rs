//! Network byte counters from `/proc/net/dev`.
//!
//! Each interface line carries cumulative receive and transmit counters.
//! Counters are kept per interface (not summed) so that rates can later be
//! merged into the per-interface records by name.

use std::path::PathBuf;
use std::time::Duration;

use super::CounterSource;

/// Cumulative byte counters for one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Byte throughput for one interface over the last sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinkRate {
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
}

/// Reads per-interface byte counters from a `/proc/net/dev`-format file.
#[derive(Debug)]
pub struct NetCounterSource {
    path: PathBuf,
}

impl NetCounterSource {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("/proc/net/dev"),
        }
    }

    /// Reads from an alternative file, for tests and containerized roots.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for NetCounterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for NetCounterSource {
    type Key = String;
    type Counter = LinkCounters;
    type Rate = LinkRate;

    fn snapshot(&self) -> std::io::Result<Vec<(String, LinkCounters)>> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(parse_net_dev(&text))
    }

    fn rate(prev: LinkCounters, curr: LinkCounters, elapsed: Duration) -> LinkRate {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return LinkRate::default();
        }
        LinkRate {
            rx_bytes_per_sec: curr.rx_bytes.saturating_sub(prev.rx_bytes) as f64 / secs,
            tx_bytes_per_sec: curr.tx_bytes.saturating_sub(prev.tx_bytes) as f64 / secs,
        }
    }
}

/// Parses `/proc/net/dev` interface lines.
///
/// Header lines carry no colon and are skipped; a data line is
/// `iface: rx_bytes rx_packets ... tx_bytes ...` with the transmit byte
/// counter in the ninth column.
pub(crate) fn parse_net_dev(text: &str) -> Vec<(String, LinkCounters)> {
    let mut interfaces = Vec::new();
    for line in text.lines() {
        let Some((iface, data)) = line.trim().split_once(':') else {
            continue;
        };
        let fields: Vec<&str> = data.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }
        let Ok(rx_bytes) = fields[0].parse::<u64>() else {
            continue;
        };
        let tx_bytes = fields[8].parse::<u64>().unwrap_or(0);
        interfaces.push((iface.trim().to_owned(), LinkCounters { rx_bytes, tx_bytes }));
    }
    interfaces
}
