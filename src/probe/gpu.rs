//! GPU inventory and live vendor diagnostics.
//!
//! Base records come from the system inventory tool (`lshw -class display`,
//! one key-value block per controller). The vendor diagnostic tool
//! (`nvidia-smi` in CSV mode) contributes utilization, memory and thermal
//! figures, merged into the inventory records by device name. A vendor row
//! with no matching inventory record still surfaces as its own record, so a
//! name mismatch between the tools loses detail but never a device.

use crate::error::ResultOkLogExt;
use crate::parser::{BlockParser, FieldSeparator};
use crate::runner::run_command;
use crate::units;

const VENDOR_QUERY: &str = "nvidia-smi --query-gpu=name,fan.speed,utilization.gpu,\
utilization.memory,memory.total,memory.used,memory.free,temperature.gpu,\
clocks.gr,clocks.mem --format=csv,noheader,nounits";

/// One display controller, merged across inventory and vendor sources.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Gpu {
    pub name: String,
    pub vendor: Option<String>,
    pub bus: Option<String>,
    pub driver: Option<String>,
    pub memory_total_bytes: Option<u64>,
    pub memory_used_bytes: Option<u64>,
    pub memory_free_bytes: Option<u64>,
    /// Compute utilization in `[0.0, 1.0]`.
    pub utilization: Option<f64>,
    /// Memory-controller utilization in `[0.0, 1.0]`.
    pub memory_utilization: Option<f64>,
    /// Fan speed in `[0.0, 1.0]`.
    pub fan_speed: Option<f64>,
    pub temperature_celsius: Option<f64>,
    pub core_clock_mhz: Option<f64>,
    pub memory_clock_mhz: Option<f64>,
}

/// One row of vendor diagnostic CSV output.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct VendorGpu {
    pub name: String,
    pub fan_speed: Option<f64>,
    pub utilization: Option<f64>,
    pub memory_utilization: Option<f64>,
    pub memory_total_bytes: Option<u64>,
    pub memory_used_bytes: Option<u64>,
    pub memory_free_bytes: Option<u64>,
    pub temperature_celsius: Option<f64>,
    pub core_clock_mhz: Option<f64>,
    pub memory_clock_mhz: Option<f64>,
}

pub(crate) async fn collect() -> Vec<Gpu> {
    let inventory = match run_command("lshw -class display")
        .await
        .ok_debug("running lshw")
    {
        Some(output) => parse_inventory(&output),
        None => Vec::new(),
    };
    let vendor = match run_command(VENDOR_QUERY).await.ok_debug("running nvidia-smi") {
        Some(output) => parse_vendor_csv(&output),
        None => Vec::new(),
    };
    merge(inventory, vendor)
}

/// Builds base records from inventory-tool blocks; blocks without a product
/// name describe no device and are dropped.
pub(crate) fn parse_inventory(output: &str) -> Vec<Gpu> {
    BlockParser::new(FieldSeparator::ColonSpace)
        .parse(output)
        .into_iter()
        .filter_map(|block| {
            let name = block.get("product")?.to_owned();
            Some(Gpu {
                name,
                vendor: block.get("vendor").map(str::to_owned),
                bus: block.get("bus info").map(str::to_owned),
                driver: block.get("configuration").and_then(driver_from_configuration),
                ..Gpu::default()
            })
        })
        .collect()
}

/// Picks the `driver=` token out of an inventory configuration line.
fn driver_from_configuration(configuration: &str) -> Option<String> {
    configuration
        .split_whitespace()
        .find_map(|token| token.strip_prefix("driver="))
        .map(str::to_owned)
}

/// Parses vendor CSV rows; `[N/A]`-style cells become absent fields without
/// discarding the row.
pub(crate) fn parse_vendor_csv(output: &str) -> Vec<VendorGpu> {
    output
        .lines()
        .filter_map(|line| {
            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            let name = (*cells.first()?).to_owned();
            if name.is_empty() {
                return None;
            }
            let cell = |i: usize| cells.get(i).copied().and_then(csv_number);
            Some(VendorGpu {
                name,
                fan_speed: cell(1).map(units::fraction),
                utilization: cell(2).map(units::fraction),
                memory_utilization: cell(3).map(units::fraction),
                memory_total_bytes: cell(4).map(mib_to_bytes),
                memory_used_bytes: cell(5).map(mib_to_bytes),
                memory_free_bytes: cell(6).map(mib_to_bytes),
                temperature_celsius: cell(7),
                core_clock_mhz: cell(8),
                memory_clock_mhz: cell(9),
            })
        })
        .collect()
}

fn csv_number(cell: &str) -> Option<f64> {
    cell.parse().ok()
}

fn mib_to_bytes(mib: f64) -> u64 {
    (mib * units::MIB as f64) as u64
}

/// Two-pass merge: each vendor row is folded into the first not-yet-merged
/// base record with an exactly matching name; rows without a match become
/// records of their own. First match wins and a record never absorbs two
/// rows, so duplicate devices with identical names stay distinct.
pub(crate) fn merge(inventory: Vec<Gpu>, vendor: Vec<VendorGpu>) -> Vec<Gpu> {
    let mut gpus = inventory;
    let mut merged = vec![false; gpus.len()];

    for row in vendor {
        let target = gpus
            .iter()
            .enumerate()
            .position(|(i, gpu)| !merged[i] && gpu.name == row.name);
        match target {
            Some(i) => {
                merged[i] = true;
                apply_vendor(&mut gpus[i], row);
            }
            None => {
                let mut gpu = Gpu {
                    name: row.name.clone(),
                    ..Gpu::default()
                };
                apply_vendor(&mut gpu, row);
                gpus.push(gpu);
                merged.push(true);
            }
        }
    }
    gpus
}

fn apply_vendor(gpu: &mut Gpu, row: VendorGpu) {
    gpu.fan_speed = row.fan_speed;
    gpu.utilization = row.utilization;
    gpu.memory_utilization = row.memory_utilization;
    gpu.memory_total_bytes = row.memory_total_bytes;
    gpu.memory_used_bytes = row.memory_used_bytes;
    gpu.memory_free_bytes = row.memory_free_bytes;
    gpu.temperature_celsius = row.temperature_celsius;
    gpu.core_clock_mhz = row.core_clock_mhz;
    gpu.memory_clock_mhz = row.memory_clock_mhz;
}
