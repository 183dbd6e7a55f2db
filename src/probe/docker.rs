//! Container state from the Docker CLI.
//!
//! `docker ps --format '{{json .}}'` emits one JSON object per line. The
//! interesting sub-fields arrive as comma-separated strings (labels, mounts,
//! networks, port mappings) and are post-processed into typed structures.

use std::collections::HashMap;

use crate::error::ResultOkLogExt;
use crate::runner::run_command;

/// One published or exposed port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PortMapping {
    /// Host bind address; absent for wildcard binds (`0.0.0.0`, `::`).
    pub host_address: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: String,
}

/// One container as reported by the listing tool.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    pub image: String,
    pub command: String,
    pub created_at: String,
    pub state: String,
    pub status: String,
    pub labels: HashMap<String, String>,
    pub mounts: Vec<String>,
    pub networks: Vec<String>,
    pub ports: Vec<PortMapping>,
    pub is_running: bool,
    pub is_healthy: bool,
}

/// Raw JSON line shape of `docker ps --format '{{json .}}'`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "Command")]
    command: String,
    #[serde(rename = "CreatedAt")]
    created_at: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Labels")]
    labels: String,
    #[serde(rename = "Mounts")]
    mounts: String,
    #[serde(rename = "Networks")]
    networks: String,
    #[serde(rename = "Ports")]
    ports: String,
}

pub(crate) async fn collect(include_stopped: bool) -> Vec<Container> {
    let command = if include_stopped {
        "docker ps -a --no-trunc --format '{{json .}}'"
    } else {
        "docker ps --no-trunc --format '{{json .}}'"
    };
    match run_command(command).await.ok_debug("running docker ps") {
        Some(output) => parse_output(&output),
        None => Vec::new(),
    }
}

/// Parses JSON-lines tool output; unparseable lines are logged and skipped.
pub(crate) fn parse_output(output: &str) -> Vec<Container> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            serde_json::from_str::<PsLine>(line)
                .ok_debug("parsing container listing line")
                .map(normalize)
        })
        .collect()
}

fn normalize(line: PsLine) -> Container {
    Container {
        is_running: line.state == "running",
        is_healthy: line.status.contains("(healthy)"),
        labels: parse_labels(&line.labels),
        mounts: split_list(&line.mounts),
        networks: split_list(&line.networks),
        ports: parse_ports(&line.ports),
        id: line.id,
        name: line.names,
        image: line.image,
        command: line.command,
        created_at: line.created_at,
        state: line.state,
        status: line.status,
    }
}

/// `key=value,key=value` label strings into a map; entries without `=` are
/// dropped.
pub(crate) fn parse_labels(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=')?;
            Some((key.trim().to_owned(), value.trim().to_owned()))
        })
        .collect()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Parses a comma-separated port listing such as
/// `0.0.0.0:8080->80/tcp, :::8080->80/tcp, 9000/tcp`, deduplicating the
/// tuples that wildcard-host folding makes identical.
pub(crate) fn parse_ports(raw: &str) -> Vec<PortMapping> {
    let mut ports = Vec::new();
    for entry in raw.split(',') {
        let Some(mapping) = parse_port_entry(entry.trim()) else {
            continue;
        };
        if !ports.contains(&mapping) {
            ports.push(mapping);
        }
    }
    ports
}

fn parse_port_entry(entry: &str) -> Option<PortMapping> {
    if entry.is_empty() {
        return None;
    }
    let (host, container) = match entry.split_once("->") {
        Some((host, container)) => (Some(host), container),
        None => (None, entry),
    };

    let (port_part, protocol) = match container.split_once('/') {
        Some((port, protocol)) => (port, protocol.to_owned()),
        None => (container, "tcp".to_owned()),
    };
    let container_port = parse_port(port_part)?;

    let (host_address, host_port) = match host {
        Some(host) => {
            let (address, port) = host.rsplit_once(':').unwrap_or(("", host));
            let address = match address {
                "" | "0.0.0.0" | "::" => None,
                other => Some(other.to_owned()),
            };
            (address, parse_port(port))
        }
        None => (None, None),
    };

    Some(PortMapping {
        host_address,
        host_port,
        container_port,
        protocol,
    })
}

/// Parses a port number, taking the lower bound of a `5000-5001` range.
fn parse_port(raw: &str) -> Option<u16> {
    let raw = raw.split('-').next().unwrap_or(raw);
    raw.parse().ok()
}
