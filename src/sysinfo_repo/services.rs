// Service table from the platform service manager (systemd, launchd, SCM).

use crate::error::{MonitorError, ProbeKind, Result};
use crate::models::ServiceEntry;
use serde::Deserialize;

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
use super::command::run;

/// `systemctl list-units --type=service --plain --no-legend`:
/// `UNIT LOAD ACTIVE SUB DESCRIPTION...`. systemd does not print a pid here, so pid is 0.
pub fn parse_systemctl_units(output: &str) -> Vec<ServiceEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line
                .split_whitespace()
                .skip_while(|p| *p == "●" || *p == "*");
            let unit = parts.next()?;
            let _load = parts.next()?;
            let _active = parts.next()?;
            let sub = parts.next()?;
            Some(ServiceEntry {
                pid: 0,
                name: unit.to_string(),
                status: sub.to_string(),
            })
        })
        .collect()
}

/// `launchctl list`: header, then `PID\tStatus\tLabel`; PID is "-" for jobs not running.
pub fn parse_launchctl_list(output: &str) -> Vec<ServiceEntry> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return None;
            }
            let pid = parts[0].parse::<u32>().ok();
            Some(ServiceEntry {
                pid: pid.unwrap_or(0),
                name: parts[2].to_string(),
                status: if pid.is_some() { "running" } else { "stopped" }.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct Win32Service {
    #[serde(rename = "ProcessId")]
    process_id: Option<u32>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "State")]
    state: Option<String>,
    #[serde(rename = "Status")]
    status: Option<String>,
}

/// `Get-CimInstance Win32_Service | ConvertTo-Json`. `State` ("Running") is the lifecycle
/// label; `Status` ("OK") is only health and used when `State` is missing.
pub fn parse_windows_services(json: &str) -> Result<Vec<ServiceEntry>> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(vec![]);
    }
    let services = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<Win32Service>>(trimmed)
    } else {
        serde_json::from_str::<Win32Service>(trimmed).map(|s| vec![s])
    }
    .map_err(|e| MonitorError::unavailable(ProbeKind::Services, format!("bad CIM json: {}", e)))?;
    Ok(services
        .into_iter()
        .map(|s| ServiceEntry {
            pid: s.process_id.unwrap_or(0),
            name: s.name.unwrap_or_else(|| "Unknown".into()),
            status: s
                .state
                .or(s.status)
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| "unknown".into()),
        })
        .collect())
}

#[cfg(target_os = "linux")]
pub(super) fn list_services() -> Result<Vec<ServiceEntry>> {
    let output = run(
        ProbeKind::Services,
        "systemctl",
        &[
            "list-units",
            "--type=service",
            "--all",
            "--no-pager",
            "--plain",
            "--no-legend",
        ],
    )?;
    Ok(parse_systemctl_units(&output))
}

#[cfg(target_os = "macos")]
pub(super) fn list_services() -> Result<Vec<ServiceEntry>> {
    let output = run(ProbeKind::Services, "launchctl", &["list"])?;
    Ok(parse_launchctl_list(&output))
}

#[cfg(target_os = "windows")]
pub(super) fn list_services() -> Result<Vec<ServiceEntry>> {
    let output = run(
        ProbeKind::Services,
        "powershell",
        &[
            "-NoProfile",
            "-Command",
            "Get-CimInstance Win32_Service | Select-Object ProcessId, Name, State, Status | ConvertTo-Json -Compress",
        ],
    )?;
    parse_windows_services(&output)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub(super) fn list_services() -> Result<Vec<ServiceEntry>> {
    Ok(vec![])
}
