//! Temperature sensors from the hwmon tree, with a vendor GPU fallback.
//!
//! Every `tempN_input` under `/sys/class/hwmon` is read (concurrently, with
//! individual failures tolerated) and classified by an ordered table of
//! chip/label substring rules. Sensors that match no rule are dropped. When
//! the vendor diagnostic tool reports GPU temperatures, its figures replace
//! the tree-walk GPU arrays entirely.

use crate::aggregate;
use crate::error::ResultOkLogExt;
use crate::runner::run_command;

const VENDOR_QUERY: &str =
    "nvidia-smi --query-gpu=temperature.gpu,temperature.memory --format=csv,noheader,nounits";

/// One raw reading from the sensor tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sensor {
    pub chip: String,
    pub label: String,
    pub celsius: f64,
}

/// Sensor categories the classifier recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SensorKind {
    CpuCore,
    CpuSocket,
    Motherboard,
    Gpu,
    GpuMemory,
    Wifi,
    Battery,
}

/// Classification rules, checked in order; both substrings must match when
/// present. Everything is matched lowercase.
struct Rule {
    chip: Option<&'static str>,
    label: Option<&'static str>,
    kind: SensorKind,
}

const RULES: &[Rule] = &[
    // GPU memory before plain GPU, so the label wins over the chip.
    Rule { chip: Some("amdgpu"), label: Some("mem"), kind: SensorKind::GpuMemory },
    Rule { chip: Some("nouveau"), label: Some("mem"), kind: SensorKind::GpuMemory },
    Rule { chip: Some("amdgpu"), label: None, kind: SensorKind::Gpu },
    Rule { chip: Some("nouveau"), label: None, kind: SensorKind::Gpu },
    Rule { chip: Some("radeon"), label: None, kind: SensorKind::Gpu },
    Rule { chip: Some("nvidia"), label: None, kind: SensorKind::Gpu },
    Rule { chip: Some("gpu"), label: None, kind: SensorKind::Gpu },
    // Socket/package sensors before cores: "Package id 0" also contains no
    // "core", but Tctl/Tdie chips report per-die figures.
    Rule { chip: None, label: Some("package id"), kind: SensorKind::CpuSocket },
    Rule { chip: None, label: Some("tctl"), kind: SensorKind::CpuSocket },
    Rule { chip: None, label: Some("tdie"), kind: SensorKind::CpuSocket },
    Rule { chip: None, label: Some("core"), kind: SensorKind::CpuCore },
    Rule { chip: None, label: Some("tccd"), kind: SensorKind::CpuCore },
    Rule { chip: Some("coretemp"), label: None, kind: SensorKind::CpuCore },
    Rule { chip: Some("k10temp"), label: None, kind: SensorKind::CpuCore },
    Rule { chip: Some("acpitz"), label: None, kind: SensorKind::Motherboard },
    Rule { chip: Some("pch"), label: None, kind: SensorKind::Motherboard },
    Rule { chip: None, label: Some("systin"), kind: SensorKind::Motherboard },
    Rule { chip: Some("iwl"), label: None, kind: SensorKind::Wifi },
    Rule { chip: Some("wifi"), label: None, kind: SensorKind::Wifi },
    Rule { chip: Some("wlan"), label: None, kind: SensorKind::Wifi },
    Rule { chip: Some("mt76"), label: None, kind: SensorKind::Wifi },
    Rule { chip: Some("bat"), label: None, kind: SensorKind::Battery },
    Rule { chip: None, label: Some("battery"), kind: SensorKind::Battery },
];

/// Classified and aggregated temperature readings, in degrees Celsius.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Temperatures {
    /// Mean of the socket sensors when present, else mean of the cores.
    pub cpu: Option<f64>,
    pub cpu_cores: Vec<f64>,
    pub cpu_sockets: Vec<f64>,
    pub motherboard: Option<f64>,
    /// Mean across GPU devices.
    pub gpu: Option<f64>,
    pub gpu_devices: Vec<f64>,
    /// Mean across GPU memory sensors.
    pub gpu_memory: Option<f64>,
    pub gpu_memory_devices: Vec<f64>,
    pub wifi: Option<f64>,
    pub battery: Option<f64>,
}

pub(crate) async fn collect() -> Temperatures {
    let sensors = read_sensors().await;
    let vendor = match run_command(VENDOR_QUERY).await.ok_debug("running nvidia-smi") {
        Some(output) => parse_vendor_rows(&output),
        None => Vec::new(),
    };
    summarize(&sensors, &vendor)
}

/// Matches a sensor against the rule table; unmatched sensors yield `None`
/// and are dropped by the caller.
pub(crate) fn classify(chip: &str, label: &str) -> Option<SensorKind> {
    let chip = chip.to_ascii_lowercase();
    let label = label.to_ascii_lowercase();
    RULES
        .iter()
        .find(|rule| {
            rule.chip.is_none_or(|c| chip.contains(c))
                && rule.label.is_none_or(|l| label.contains(l))
        })
        .map(|rule| rule.kind)
}

/// Parses `temperature.gpu, temperature.memory` CSV rows. Rows whose GPU
/// cell does not parse are dropped entirely.
pub(crate) fn parse_vendor_rows(output: &str) -> Vec<(f64, Option<f64>)> {
    output
        .lines()
        .filter_map(|line| {
            let mut cells = line.split(',').map(str::trim);
            let gpu = cells.next()?.parse::<f64>().ok()?;
            let memory = cells.next().and_then(|cell| cell.parse().ok());
            Some((gpu, memory))
        })
        .collect()
}

pub(crate) fn summarize(sensors: &[Sensor], vendor: &[(f64, Option<f64>)]) -> Temperatures {
    let mut cores = Vec::new();
    let mut sockets = Vec::new();
    let mut motherboard = Vec::new();
    let mut gpus = Vec::new();
    let mut gpu_memories = Vec::new();
    let mut wifi = Vec::new();
    let mut battery = Vec::new();

    for sensor in sensors {
        match classify(&sensor.chip, &sensor.label) {
            Some(SensorKind::CpuCore) => cores.push(sensor.celsius),
            Some(SensorKind::CpuSocket) => sockets.push(sensor.celsius),
            Some(SensorKind::Motherboard) => motherboard.push(sensor.celsius),
            Some(SensorKind::Gpu) => gpus.push(sensor.celsius),
            Some(SensorKind::GpuMemory) => gpu_memories.push(sensor.celsius),
            Some(SensorKind::Wifi) => wifi.push(sensor.celsius),
            Some(SensorKind::Battery) => battery.push(sensor.celsius),
            None => {}
        }
    }

    // Vendor diagnostics replace, never extend, the tree-walk GPU readings.
    if !vendor.is_empty() {
        gpus = vendor.iter().map(|(gpu, _)| *gpu).collect();
        gpu_memories = vendor.iter().filter_map(|(_, memory)| *memory).collect();
    }

    Temperatures {
        cpu: aggregate::mean(&sockets).or_else(|| aggregate::mean(&cores)),
        motherboard: aggregate::mean(&motherboard),
        gpu: aggregate::mean(&gpus),
        gpu_memory: aggregate::mean(&gpu_memories),
        wifi: aggregate::mean(&wifi),
        battery: aggregate::mean(&battery),
        cpu_cores: cores,
        cpu_sockets: sockets,
        gpu_devices: gpus,
        gpu_memory_devices: gpu_memories,
    }
}

#[cfg(target_os = "linux")]
async fn read_sensors() -> Vec<Sensor> {
    let Some(mut dir) = tokio::fs::read_dir("/sys/class/hwmon")
        .await
        .ok_debug("listing /sys/class/hwmon")
    else {
        return Vec::new();
    };

    let mut set = tokio::task::JoinSet::new();
    while let Some(entry) = dir.next_entry().await.ok().flatten() {
        set.spawn(read_chip(entry.path()));
    }

    let mut sensors = Vec::new();
    while let Some(joined) = set.join_next().await {
        if let Some(mut chip_sensors) = joined.ok_log("joining hwmon reader") {
            sensors.append(&mut chip_sensors);
        }
    }
    sensors.sort_by(|a, b| (&a.chip, &a.label).cmp(&(&b.chip, &b.label)));
    sensors
}

#[cfg(not(target_os = "linux"))]
async fn read_sensors() -> Vec<Sensor> {
    Vec::new()
}

#[cfg(target_os = "linux")]
async fn read_chip(path: std::path::PathBuf) -> Vec<Sensor> {
    let chip = match tokio::fs::read_to_string(path.join("name")).await {
        Ok(name) => name.trim().to_owned(),
        Err(_) => return Vec::new(),
    };

    let Ok(mut dir) = tokio::fs::read_dir(&path).await else {
        return Vec::new();
    };
    let mut sensors = Vec::new();
    while let Some(entry) = dir.next_entry().await.ok().flatten() {
        let file = entry.file_name().to_string_lossy().into_owned();
        let Some(stem) = file.strip_suffix("_input") else {
            continue;
        };
        if !stem.starts_with("temp") {
            continue;
        }
        let Ok(raw) = tokio::fs::read_to_string(entry.path()).await else {
            continue;
        };
        let Ok(millidegrees) = raw.trim().parse::<f64>() else {
            continue;
        };
        let label = tokio::fs::read_to_string(path.join(format!("{stem}_label")))
            .await
            .map(|raw| raw.trim().to_owned())
            .unwrap_or_default();
        sensors.push(Sensor {
            chip: chip.clone(),
            label,
            celsius: millidegrees / 1000.0,
        });
    }
    sensors
}
