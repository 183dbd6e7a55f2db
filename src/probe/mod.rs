//! The public query surface.
//!
//! A [`Probe`] owns the only cross-call state in the crate: one delta
//! sampler per rate domain (CPU ticks, network byte counters). Every query
//! method is an idempotent read that builds its records fresh; all of them
//! may be called concurrently with each other and with themselves.
//!
//! Each domain degrades to an empty or default result when its backing tool
//! or pseudo-file is unavailable — no query ever fails.

mod cpu;
mod docker;
mod drive;
mod gpu;
mod memory;
mod net;
mod temperature;

pub use cpu::CpuInfo;
pub use docker::{Container, PortMapping};
pub use drive::Drive;
pub use gpu::Gpu;
pub use memory::{MemoryDevice, MemoryInfo};
pub use net::NetworkInterface;
pub use temperature::Temperatures;

use std::time::Duration;

use crate::config::ProbeConfig;
use crate::sampler::DeltaSampler;
use crate::sampler::cpu::CpuTickSource;
use crate::sampler::net::NetCounterSource;

/// Host telemetry prober.
///
/// Construct once and keep alive for as long as rate figures are wanted:
/// the samplers warm up lazily on first use and keep resampling in the
/// background until stopped or dropped.
pub struct Probe {
    cpu_sampler: DeltaSampler<CpuTickSource>,
    net_sampler: DeltaSampler<NetCounterSource>,
}

impl Probe {
    pub fn new() -> Self {
        Self::with_config(ProbeConfig::default())
    }

    pub fn with_config(config: ProbeConfig) -> Self {
        Self {
            cpu_sampler: DeltaSampler::new(CpuTickSource::new(), config.cpu_sample_interval),
            net_sampler: DeltaSampler::new(NetCounterSource::new(), config.net_sample_interval),
        }
    }

    /// CPU identity and utilization. The first call per sampler lifetime
    /// blocks briefly for the warm-up snapshot pair.
    pub async fn cpu(&self) -> CpuInfo {
        cpu::collect(&self.cpu_sampler).await
    }

    /// Memory totals, module inventory, and the bandwidth estimate.
    pub async fn memory(&self) -> MemoryInfo {
        memory::collect().await
    }

    /// Mounted filesystems. Virtual filesystems (tmpfs, overlay, ...) are
    /// filtered out unless `include_virtual` is set.
    pub async fn drives(&self, include_virtual: bool) -> Vec<Drive> {
        drive::collect(include_virtual).await
    }

    /// Display controllers, with vendor diagnostics merged in by name.
    pub async fn gpus(&self) -> Vec<Gpu> {
        gpu::collect().await
    }

    /// Network interfaces with addresses and throughput.
    pub async fn network_interfaces(&self) -> Vec<NetworkInterface> {
        net::collect(&self.net_sampler).await
    }

    /// Classified temperature sensor readings.
    pub async fn temperatures(&self) -> Temperatures {
        temperature::collect().await
    }

    /// Containers known to the local Docker daemon. Only running containers
    /// unless `include_stopped` is set.
    pub async fn containers(&self, include_stopped: bool) -> Vec<Container> {
        docker::collect(include_stopped).await
    }

    /// Stops CPU rate sampling. Idempotent; the next [`Probe::cpu`] call
    /// restarts the warm-up protocol.
    pub async fn stop_cpu_sampling(&self) {
        self.cpu_sampler.stop().await;
    }

    /// Stops network rate sampling. Idempotent.
    pub async fn stop_network_sampling(&self) {
        self.net_sampler.stop().await;
    }

    /// Changes the CPU resampling interval from the next tick on.
    pub fn set_cpu_interval(&self, interval: Duration) {
        self.cpu_sampler.set_interval(interval);
    }

    /// Changes the network resampling interval from the next tick on.
    pub fn set_network_interval(&self, interval: Duration) {
        self.net_sampler.set_interval(interval);
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self::new()
    }
}
