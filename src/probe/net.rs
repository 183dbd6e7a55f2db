//! Network interface inventory, addresses, and throughput.
//!
//! Interfaces are enumerated from `/sys/class/net`, addresses merged in from
//! `ip -o addr show`, and throughput from the byte-counter sampler, all keyed
//! by interface name.

use std::collections::HashMap;

use crate::aggregate;
use crate::error::ResultOkLogExt;
use crate::runner::run_command;
use crate::sampler::DeltaSampler;
use crate::sampler::net::{LinkRate, NetCounterSource};

/// Name prefixes that mark an interface as a virtual guess. Ordered so the
/// table reads as the classifier it is; first match wins.
const VIRTUAL_PREFIXES: &[&str] = &[
    "lo", "veth", "docker", "nerdctl", "br-", "virbr", "tun", "tap", "wg", "vnet", "dummy",
    "flannel", "cni",
];

/// One network interface, merged across enumeration, address listing, and
/// the rate sampler.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: Option<String>,
    pub operstate: Option<String>,
    /// Negotiated link speed in megabits per second, when the driver
    /// reports one.
    pub speed_mbps: Option<u64>,
    /// Best-effort physical-versus-virtual classification.
    pub physical: bool,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub rx_bytes_per_sec: f64,
    pub tx_bytes_per_sec: f64,
    /// Combined throughput over link speed in `[0.0, 1.0]`; absent when the
    /// link speed is unknown.
    pub utilization: Option<f64>,
}

pub(crate) async fn collect(sampler: &DeltaSampler<NetCounterSource>) -> Vec<NetworkInterface> {
    let rates: HashMap<String, LinkRate> = sampler.rates().await.into_iter().collect();
    let mut interfaces = enumerate().await;
    let addresses = match run_command("ip -o addr show")
        .await
        .ok_debug("running ip addr")
    {
        Some(output) => parse_addr_lines(&output),
        None => HashMap::new(),
    };

    for iface in &mut interfaces {
        if let Some((ipv4, ipv6)) = addresses.get(&iface.name) {
            iface.ipv4 = ipv4.clone();
            iface.ipv6 = ipv6.clone();
        }
        if let Some(rate) = rates.get(&iface.name) {
            iface.rx_bytes_per_sec = rate.rx_bytes_per_sec;
            iface.tx_bytes_per_sec = rate.tx_bytes_per_sec;
        }
        iface.utilization = utilization(
            iface.rx_bytes_per_sec,
            iface.tx_bytes_per_sec,
            iface.speed_mbps,
        );
    }
    interfaces
}

/// Whether an interface name carries a known virtual prefix.
pub(crate) fn is_virtual_name(name: &str) -> bool {
    VIRTUAL_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Classifies an interface as physical. A live carrier upgrades a virtual
/// guess to physical; nothing downgrades a physical name. Best-effort only.
pub(crate) fn is_physical(name: &str, carrier: bool) -> bool {
    !is_virtual_name(name) || carrier
}

/// Combined throughput over the link capacity, absent without a known speed.
pub(crate) fn utilization(
    rx_bytes_per_sec: f64,
    tx_bytes_per_sec: f64,
    speed_mbps: Option<u64>,
) -> Option<f64> {
    let speed = speed_mbps.filter(|s| *s > 0)?;
    let capacity_bytes_per_sec = speed as f64 * 1e6 / 8.0;
    Some(aggregate::ratio(
        rx_bytes_per_sec + tx_bytes_per_sec,
        capacity_bytes_per_sec,
    ))
}

/// Parses one-line-per-address `ip -o addr show` output into
/// `name -> (ipv4, ipv6)` lists.
pub(crate) fn parse_addr_lines(output: &str) -> HashMap<String, (Vec<String>, Vec<String>)> {
    let mut addresses: HashMap<String, (Vec<String>, Vec<String>)> = HashMap::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let name = fields[1].split('@').next().unwrap_or(fields[1]).to_owned();
        let address = fields[3]
            .split('/')
            .next()
            .unwrap_or(fields[3])
            .to_owned();
        let entry = addresses.entry(name).or_default();
        match fields[2] {
            "inet" => entry.0.push(address),
            "inet6" => entry.1.push(address),
            _ => {}
        }
    }
    addresses
}

#[cfg(target_os = "linux")]
async fn enumerate() -> Vec<NetworkInterface> {
    let Some(mut dir) = tokio::fs::read_dir("/sys/class/net")
        .await
        .ok_debug("listing /sys/class/net")
    else {
        return Vec::new();
    };

    let mut set = tokio::task::JoinSet::new();
    while let Some(entry) = dir.next_entry().await.ok().flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        set.spawn(read_interface(name));
    }

    let mut interfaces = Vec::new();
    while let Some(joined) = set.join_next().await {
        if let Some(iface) = joined.ok_log("joining interface reader") {
            interfaces.push(iface);
        }
    }
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    interfaces
}

#[cfg(not(target_os = "linux"))]
async fn enumerate() -> Vec<NetworkInterface> {
    Vec::new()
}

#[cfg(target_os = "linux")]
async fn read_interface(name: String) -> NetworkInterface {
    let attr = |file: &'static str| {
        let name = name.clone();
        async move {
            tokio::fs::read_to_string(format!("/sys/class/net/{name}/{file}"))
                .await
                .ok()
                .map(|raw| raw.trim().to_owned())
        }
    };

    let (mac, operstate, speed, carrier) = tokio::join!(
        attr("address"),
        attr("operstate"),
        attr("speed"),
        attr("carrier"),
    );

    let speed_mbps = speed
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|mbps| *mbps > 0)
        .map(|mbps| mbps as u64);
    let carrier = carrier.as_deref() == Some("1");

    NetworkInterface {
        physical: is_physical(&name, carrier),
        name,
        mac,
        operstate,
        speed_mbps,
        ..NetworkInterface::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_prefixes() {
        assert!(is_virtual_name("lo"));
        assert!(is_virtual_name("veth1a2b"));
        assert!(is_virtual_name("docker0"));
        assert!(is_virtual_name("br-4f2a"));
        assert!(!is_virtual_name("eth0"));
        assert!(!is_virtual_name("enp3s0"));
        assert!(!is_virtual_name("wlan0"));
    }

    #[test]
    fn test_carrier_upgrades_but_never_downgrades() {
        assert!(is_physical("veth1a2b", true));
        assert!(!is_physical("veth1a2b", false));
        assert!(is_physical("eth0", false));
        assert!(is_physical("eth0", true));
    }

    #[test]
    fn test_utilization_requires_known_speed() {
        assert_eq!(utilization(1000.0, 1000.0, None), None);
        assert_eq!(utilization(1000.0, 1000.0, Some(0)), None);
    }

    #[test]
    fn test_utilization_is_fraction_of_capacity() {
        // 1000 Mb/s is 125e6 bytes/s of capacity.
        let value = utilization(100e6, 25e6, Some(1000)).unwrap();
        assert!((value - 1.0).abs() < 1e-9);
        let half = utilization(50e6, 12.5e6, Some(1000)).unwrap();
        assert!((half - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_utilization_clamps_to_one() {
        assert_eq!(utilization(300e6, 300e6, Some(1000)), Some(1.0));
    }

    #[test]
    fn test_parse_addr_lines() {
        let output = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
2: eth0    inet 192.168.1.10/24 brd 192.168.1.255 scope global dynamic eth0\\       valid_lft 86000sec
2: eth0    inet6 fe80::1234:5678/64 scope link\\       valid_lft forever preferred_lft forever
";
        let addresses = parse_addr_lines(output);
        assert_eq!(addresses["lo"].0, vec!["127.0.0.1"]);
        assert_eq!(addresses["eth0"].0, vec!["192.168.1.10"]);
        assert_eq!(addresses["eth0"].1, vec!["fe80::1234:5678"]);
    }

    #[test]
    fn test_parse_addr_lines_strips_peer_suffix() {
        let output = "5: veth12ab@if4    inet 10.0.0.1/16 scope global\n";
        let addresses = parse_addr_lines(output);
        assert_eq!(addresses["veth12ab"].0, vec!["10.0.0.1"]);
    }

    #[test]
    fn test_parse_addr_lines_ignores_short_lines() {
        assert!(parse_addr_lines("garbage\n\n").is_empty());
    }
}
