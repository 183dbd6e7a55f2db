//! Sysprobe: local hardware and OS telemetry as a library.
//!
//! The crate collects point-in-time and rate-based figures (CPU, memory,
//! drives, GPUs, network interfaces, temperatures, container state) by
//! invoking platform tools and reading pseudo-files, and normalizes the
//! results into a stable schema: byte counts in bytes, percentages as
//! fractions in `[0.0, 1.0]`, absent data as absent fields rather than
//! errors.
//!
//! The entry point is [`Probe`]:
//!
//! ```no_run
//! # async fn example() {
//! let probe = sysprobe::Probe::new();
//! let cpu = probe.cpu().await;
//! println!("overall cpu: {:.0}%", cpu.overall_utilization * 100.0);
//! let drives = probe.drives(false).await;
//! for drive in drives {
//!     println!("{} {:.0}%", drive.mount_point, drive.utilization * 100.0);
//! }
//! probe.stop_cpu_sampling().await;
//! # }
//! ```
//!
//! Rate figures (CPU utilization, network throughput) come from a
//! lazily-started background sampler that diffs monotonic OS counters; see
//! [`sampler`]. Everything else is collected fresh per query. Failures of
//! individual tools degrade to empty results and are visible only in the
//! log.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod parser;
pub mod probe;
pub mod runner;
pub mod sampler;
pub mod units;

pub use config::ProbeConfig;
pub use probe::{
    Container, CpuInfo, Drive, Gpu, MemoryDevice, MemoryInfo, NetworkInterface, PortMapping,
    Probe, Temperatures,
};
