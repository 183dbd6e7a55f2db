//! CPU identity and utilization.

use crate::aggregate;
use crate::sampler::DeltaSampler;
use crate::sampler::cpu::{CoreRate, CpuTickSource};

/// CPU identity plus utilization over the last sampling window.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CpuInfo {
    /// Model string as reported by the OS, when available.
    pub model: Option<String>,
    /// Number of logical cores enumerated by the OS.
    pub logical_cores: usize,
    /// Whole-machine utilization in `[0.0, 1.0]`.
    pub overall_utilization: f64,
    /// Per-core utilization, ordered by core index.
    pub per_core_utilization: Vec<f64>,
}

pub(crate) async fn collect(sampler: &DeltaSampler<CpuTickSource>) -> CpuInfo {
    let rates = sampler.rates().await;
    let (model, logical_cores) = read_cpuinfo().await;
    CpuInfo {
        model,
        logical_cores,
        overall_utilization: overall_utilization(&rates),
        per_core_utilization: rates.iter().map(|(_, rate)| rate.utilization()).collect(),
    }
}

/// Overall utilization as summed busy deltas over summed total deltas.
///
/// Summing before dividing weights each core by its elapsed ticks; averaging
/// the per-core ratios would misreport hosts with heterogeneous tick counts.
pub(crate) fn overall_utilization(rates: &[(usize, CoreRate)]) -> f64 {
    let busy: u64 = rates.iter().map(|(_, rate)| rate.delta_busy).sum();
    let total: u64 = rates.iter().map(|(_, rate)| rate.delta_total).sum();
    aggregate::ratio(busy as f64, total as f64)
}

#[cfg(target_os = "linux")]
async fn read_cpuinfo() -> (Option<String>, usize) {
    use crate::error::ResultOkLogExt;
    match tokio::fs::read_to_string("/proc/cpuinfo")
        .await
        .ok_debug("reading /proc/cpuinfo")
    {
        Some(text) => parse_cpuinfo(&text),
        None => (None, 0),
    }
}

#[cfg(not(target_os = "linux"))]
async fn read_cpuinfo() -> (Option<String>, usize) {
    (None, 0)
}

/// Extracts the model name and the logical core count from `/proc/cpuinfo`.
pub(crate) fn parse_cpuinfo(text: &str) -> (Option<String>, usize) {
    let mut model = None;
    let mut cores = 0;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "processor" => cores += 1,
            "model name" if model.is_none() => model = Some(value.trim().to_owned()),
            _ => {}
        }
    }
    (model, cores)
}
