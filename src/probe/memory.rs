//! Memory totals, physical module inventory, and the bandwidth model.
//!
//! Totals come from `/proc/meminfo`; the per-module inventory comes from the
//! DMI table (`dmidecode --type 17`), which reports one key-value block per
//! memory slot. Slots without a module are placeholder blocks whose size
//! field does not parse, and are skipped without aborting the rest.

use crate::aggregate;
use crate::parser::{Block, BlockParser, FieldSeparator};
use crate::units;

/// One physical memory module. All fields are best-effort.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MemoryDevice {
    pub manufacturer: Option<String>,
    pub part_number: Option<String>,
    pub memory_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub bus_width_bits: Option<u64>,
    pub clock_mhz: Option<f64>,
    pub voltage: Option<f64>,
    pub rank: Option<u64>,
    pub bank_locator: Option<String>,
    /// Peak transfer rate of this module alone.
    pub bandwidth_bytes_per_sec: Option<f64>,
}

/// System memory state plus the detected module inventory.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
    /// Used fraction in `[0.0, 1.0]`.
    pub utilization: f64,
    /// Estimated system bandwidth: bottleneck module figure times the
    /// observed interleave parallelism.
    pub bandwidth_bytes_per_sec: Option<f64>,
    pub devices: Vec<MemoryDevice>,
}

pub(crate) async fn collect() -> MemoryInfo {
    let (total_bytes, free_bytes) = read_meminfo().await;
    let devices = read_devices().await;
    summarize(total_bytes, free_bytes, devices)
}

pub(crate) fn summarize(total_bytes: u64, free_bytes: u64, devices: Vec<MemoryDevice>) -> MemoryInfo {
    let used_bytes = total_bytes.saturating_sub(free_bytes);
    MemoryInfo {
        total_bytes,
        free_bytes,
        used_bytes,
        utilization: aggregate::ratio(used_bytes as f64, total_bytes as f64),
        bandwidth_bytes_per_sec: system_bandwidth(&devices),
        devices,
    }
}

#[cfg(target_os = "linux")]
async fn read_meminfo() -> (u64, u64) {
    use crate::error::ResultOkLogExt;
    match tokio::fs::read_to_string("/proc/meminfo")
        .await
        .ok_debug("reading /proc/meminfo")
    {
        Some(text) => parse_meminfo(&text),
        None => (0, 0),
    }
}

#[cfg(not(target_os = "linux"))]
async fn read_meminfo() -> (u64, u64) {
    (0, 0)
}

#[cfg(target_os = "linux")]
async fn read_devices() -> Vec<MemoryDevice> {
    use crate::error::ResultOkLogExt;
    match crate::runner::run_command("dmidecode --type 17")
        .await
        .ok_debug("running dmidecode")
    {
        Some(output) => parse_devices(&output),
        None => Vec::new(),
    }
}

#[cfg(not(target_os = "linux"))]
async fn read_devices() -> Vec<MemoryDevice> {
    Vec::new()
}

/// Extracts `(total, available)` bytes from `/proc/meminfo`.
pub(crate) fn parse_meminfo(text: &str) -> (u64, u64) {
    let mut total = 0;
    let mut available = None;
    let mut free = 0;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let Some(bytes) = units::parse_size_bytes(value.trim()) else {
            continue;
        };
        match key.trim() {
            "MemTotal" => total = bytes,
            "MemAvailable" => available = Some(bytes),
            "MemFree" => free = bytes,
            _ => {}
        }
    }
    (total, available.unwrap_or(free))
}

pub(crate) fn parse_devices(output: &str) -> Vec<MemoryDevice> {
    BlockParser::new(FieldSeparator::ColonSpace)
        .parse(output)
        .into_iter()
        .filter_map(device_from_block)
        .collect()
}

fn device_from_block(block: Block) -> Option<MemoryDevice> {
    // Empty slots report a non-numeric size; skip them.
    let size_bytes = units::parse_size_bytes(block.get("Size")?)?;

    let memory_type = block.get("Type").map(str::to_owned);
    let bus_width_bits = block.get("Data Width").and_then(units::parse_bits);
    let clock_mhz = block
        .get("Configured Memory Speed")
        .or_else(|| block.get("Speed"))
        .and_then(units::parse_mhz);

    Some(MemoryDevice {
        manufacturer: block.get("Manufacturer").map(str::to_owned),
        part_number: block.get("Part Number").map(str::to_owned),
        bandwidth_bytes_per_sec: module_bandwidth(
            clock_mhz,
            bus_width_bits,
            transfers_per_cycle(memory_type.as_deref()),
        ),
        memory_type,
        size_bytes: Some(size_bytes),
        bus_width_bits,
        clock_mhz,
        voltage: block.get("Configured Voltage").and_then(units::parse_volts),
        rank: block.get_u64("Rank"),
        bank_locator: block
            .get("Bank Locator")
            .or_else(|| block.get("Locator"))
            .map(str::to_owned),
    })
}

/// Data transfers per clock cycle for a memory technology. Double data rate
/// families transfer on both clock edges.
fn transfers_per_cycle(memory_type: Option<&str>) -> f64 {
    let Some(memory_type) = memory_type else {
        return 2.0;
    };
    let lower = memory_type.to_ascii_lowercase();
    if lower.starts_with("sdr") || lower == "sdram" {
        1.0
    } else {
        2.0
    }
}

/// `clock MHz x 1e6 x bus width bits / 8 x transfers per cycle`.
fn module_bandwidth(
    clock_mhz: Option<f64>,
    bus_width_bits: Option<u64>,
    transfers: f64,
) -> Option<f64> {
    let clock = clock_mhz?;
    let width = bus_width_bits?;
    Some(clock * 1e6 * width as f64 / 8.0 * transfers)
}

/// System bandwidth from the bottleneck module scaled by parallelism.
///
/// Uses the minimum clock and bus width across modules (the slowest module
/// paces an interleaved set) multiplied by the number of distinct bank
/// positions observed, minimum 1. The parallelism count is a best-effort
/// approximation of channel interleave.
fn system_bandwidth(devices: &[MemoryDevice]) -> Option<f64> {
    let min_clock = aggregate::min_f64(devices.iter().filter_map(|d| d.clock_mhz))?;
    let min_width = aggregate::min_u64(devices.iter().filter_map(|d| d.bus_width_bits))?;
    let transfers = aggregate::min_f64(
        devices
            .iter()
            .map(|d| transfers_per_cycle(d.memory_type.as_deref())),
    )?;

    let mut positions: Vec<&str> = devices
        .iter()
        .filter_map(|d| d.bank_locator.as_deref())
        .collect();
    positions.sort_unstable();
    positions.dedup();
    let parallelism = positions.len().max(1);

    module_bandwidth(Some(min_clock), Some(min_width), transfers)
        .map(|per_module| per_module * parallelism as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         1024000 kB
MemAvailable:    8192000 kB
Buffers:          512000 kB
";

    const DMIDECODE: &str = "\
# dmidecode 3.3
Getting SMBIOS data from sysfs.

Handle 0x0040, DMI type 17, 27 bytes
Memory Device
	Array Handle: 0x003E
	Total Width: 72 bits
	Data Width: 64 bits
	Size: 16 GB
	Locator: DIMM_A1
	Bank Locator: BANK 0
	Type: DDR4
	Speed: 3200 MT/s
	Manufacturer: Samsung
	Part Number: M378A2K43CB1-CTD
	Rank: 2
	Configured Memory Speed: 2667 MT/s
	Configured Voltage: 1.2 V

Handle 0x0041, DMI type 17, 27 bytes
Memory Device
	Array Handle: 0x003E
	Data Width: 64 bits
	Size: 8 GB
	Locator: DIMM_B1
	Bank Locator: BANK 1
	Type: DDR4
	Speed: 2400 MT/s
	Manufacturer: Kingston
	Rank: 1
	Configured Voltage: 1.2 V

Handle 0x0042, DMI type 17, 27 bytes
Memory Device
	Array Handle: 0x003E
	Size: No Module Installed
";

    #[test]
    fn test_parse_meminfo_prefers_available() {
        let (total, free) = parse_meminfo(MEMINFO);
        assert_eq!(total, 16_384_000 * 1024);
        assert_eq!(free, 8_192_000 * 1024);
    }

    #[test]
    fn test_parse_meminfo_falls_back_to_memfree() {
        let (total, free) = parse_meminfo("MemTotal: 1000 kB\nMemFree: 400 kB\n");
        assert_eq!(total, 1_024_000);
        assert_eq!(free, 409_600);
    }

    #[test]
    fn test_parse_devices_skips_empty_slots() {
        let devices = parse_devices(DMIDECODE);
        assert_eq!(devices.len(), 2);

        let first = &devices[0];
        assert_eq!(first.manufacturer.as_deref(), Some("Samsung"));
        assert_eq!(first.part_number.as_deref(), Some("M378A2K43CB1-CTD"));
        assert_eq!(first.size_bytes, Some(16 * units::GIB));
        assert_eq!(first.bus_width_bits, Some(64));
        assert_eq!(first.clock_mhz, Some(2667.0));
        assert_eq!(first.voltage, Some(1.2));
        assert_eq!(first.rank, Some(2));
        assert_eq!(first.bank_locator.as_deref(), Some("BANK 0"));
    }

    #[test]
    fn test_missing_fields_do_not_abort_other_modules() {
        let second = &parse_devices(DMIDECODE)[1];
        assert_eq!(second.part_number, None);
        assert_eq!(second.size_bytes, Some(8 * units::GIB));
        assert_eq!(second.clock_mhz, Some(2400.0));
    }

    #[test]
    fn test_module_bandwidth_formula() {
        // 2667 MHz x 1e6 x 64 / 8 x 2 transfers per cycle
        let devices = parse_devices(DMIDECODE);
        assert_eq!(
            devices[0].bandwidth_bytes_per_sec,
            Some(2667.0 * 1e6 * 8.0 * 2.0)
        );
    }

    #[test]
    fn test_system_bandwidth_uses_bottleneck_and_parallelism() {
        let devices = parse_devices(DMIDECODE);
        // Slowest clock 2400, narrowest width 64, two distinct bank positions.
        let expected = 2400.0 * 1e6 * 8.0 * 2.0 * 2.0;
        assert_eq!(system_bandwidth(&devices), Some(expected));
    }

    #[test]
    fn test_system_bandwidth_empty_inventory_is_none() {
        assert_eq!(system_bandwidth(&[]), None);
    }

    #[test]
    fn test_summarize_totals() {
        let info = summarize(1000, 400, Vec::new());
        assert_eq!(info.used_bytes, 600);
        assert_eq!(info.utilization, 0.6);
        assert_eq!(info.bandwidth_bytes_per_sec, None);
    }

    #[test]
    fn test_summarize_zero_total_has_zero_utilization() {
        let info = summarize(0, 0, Vec::new());
        assert_eq!(info.utilization, 0.0);
    }

    #[test]
    fn test_transfers_per_cycle() {
        assert_eq!(transfers_per_cycle(Some("DDR4")), 2.0);
        assert_eq!(transfers_per_cycle(Some("LPDDR5")), 2.0);
        assert_eq!(transfers_per_cycle(Some("SDRAM")), 1.0);
        assert_eq!(transfers_per_cycle(None), 2.0);
    }
}
