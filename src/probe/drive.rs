//! Mounted filesystems from tabular `df` output.

use crate::aggregate;
use crate::error::ResultOkLogExt;
use crate::runner::run_command;
use crate::units;

/// Filesystem types that do not back a physical drive. Filtered out unless
/// the caller explicitly asks for them.
const VIRTUAL_FS_TYPES: &[&str] = &[
    "tmpfs",
    "devtmpfs",
    "devfs",
    "squashfs",
    "overlay",
    "proc",
    "sysfs",
    "cgroup",
    "cgroup2",
    "devpts",
    "efivarfs",
    "autofs",
    "mqueue",
    "tracefs",
    "fusectl",
    "configfs",
    "securityfs",
    "debugfs",
    "ramfs",
    "hugetlbfs",
    "pstore",
    "binfmt_misc",
    "bpf",
    "nsfs",
    "rpc_pipefs",
];

/// One mounted filesystem.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Drive {
    /// Device or filesystem source path.
    pub device: String,
    pub fs_type: Option<String>,
    pub mount_point: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
    /// Used fraction in `[0.0, 1.0]`; 0 for a zero-sized filesystem.
    pub utilization: f64,
}

pub(crate) async fn collect(include_virtual: bool) -> Vec<Drive> {
    match run_command("df -kPT").await.ok_debug("running df") {
        Some(output) => parse_df(&output, include_virtual),
        None => Vec::new(),
    }
}

/// Parses POSIX-format `df` output with a type column:
/// `Filesystem Type 1024-blocks Used Available Capacity Mounted on`.
pub(crate) fn parse_df(output: &str, include_virtual: bool) -> Vec<Drive> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| drive_from_line(line, include_virtual))
        .collect()
}

fn drive_from_line(line: &str, include_virtual: bool) -> Option<Drive> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return None;
    }
    let fs_type = fields[1];
    if !include_virtual && is_virtual_fs(fs_type) {
        return None;
    }
    let total_bytes = fields[2].parse::<u64>().ok()? * units::KIB;
    let used_kib = fields[3].parse::<u64>().ok();
    let free_bytes = fields[4].parse::<u64>().ok()? * units::KIB;
    // Mount points may contain spaces; everything past the capacity column
    // belongs to the path.
    let mount_point = fields[6..].join(" ");

    let (used_bytes, utilization) =
        normalize_capacity(total_bytes, free_bytes, used_kib.map(|k| k * units::KIB));
    Some(Drive {
        device: fields[0].to_owned(),
        fs_type: Some(fs_type.to_owned()),
        mount_point,
        total_bytes,
        free_bytes,
        used_bytes,
        utilization,
    })
}

pub(crate) fn is_virtual_fs(fs_type: &str) -> bool {
    VIRTUAL_FS_TYPES.contains(&fs_type)
}

/// Derives used space and utilization, falling back to `total - free` when
/// the source reports no used figure.
pub(crate) fn normalize_capacity(
    total_bytes: u64,
    free_bytes: u64,
    used_bytes: Option<u64>,
) -> (u64, f64) {
    let used = used_bytes.unwrap_or_else(|| total_bytes.saturating_sub(free_bytes));
    (used, aggregate::ratio(used as f64, total_bytes as f64))
}
