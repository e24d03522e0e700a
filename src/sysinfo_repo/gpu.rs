// Graphics adapters: nvidia-smi for discrete NVIDIA cards, then the platform's own listing for
// integrated Intel/AMD/Apple graphics.

use crate::error::{MonitorError, ProbeKind, Result};
use crate::models::GpuEntry;
use serde::Deserialize;

use super::command::run;

const MIB: u64 = 1024 * 1024;

fn is_integrated_vendor(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["intel", "amd", "uhd", "radeon(tm) graphics", "apple"]
        .iter()
        .any(|v| lower.contains(v))
}

/// `nvidia-smi --query-gpu=name,memory.total,memory.used,memory.free,temperature.gpu
/// --format=csv,noheader,nounits`. Memory is in MiB; unparsable numbers (`[N/A]`) become 0.
pub fn parse_nvidia_smi(output: &str) -> Vec<GpuEntry> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() != 5 || parts[0].is_empty() {
                return None;
            }
            let mib = |s: &str| s.parse::<f64>().map(|v| (v * MIB as f64) as u64).unwrap_or(0);
            Some(GpuEntry {
                model: parts[0].to_string(),
                integrated: false,
                memory_total: mib(parts[1]),
                memory_used: mib(parts[2]),
                memory_free: mib(parts[3]),
                temperature_celsius: parts[4].parse().unwrap_or(0.0),
            })
        })
        .collect()
}

/// `lspci`: `00:02.0 VGA compatible controller: Intel Corporation UHD Graphics 620 (rev 07)`.
pub fn parse_lspci(output: &str) -> Vec<GpuEntry> {
    output
        .lines()
        .filter_map(|line| {
            let (_, model) = line.split_once("VGA compatible controller:")?;
            let model = model.trim();
            is_integrated_vendor(model).then(|| GpuEntry::integrated(model))
        })
        .collect()
}

/// `system_profiler SPDisplaysDataType`: one `Chipset Model:` line per adapter.
pub fn parse_displays_profiler(output: &str) -> Vec<GpuEntry> {
    output
        .lines()
        .filter_map(|line| {
            let model = line.trim().strip_prefix("Chipset Model:")?.trim();
            is_integrated_vendor(model).then(|| GpuEntry::integrated(model))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct Win32VideoController {
    #[serde(rename = "Name")]
    name: Option<String>,
}

/// `Get-CimInstance Win32_VideoController | Select-Object Name | ConvertTo-Json`.
pub fn parse_windows_video_controllers(json: &str) -> Result<Vec<GpuEntry>> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(vec![]);
    }
    let controllers = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<Win32VideoController>>(trimmed)
    } else {
        serde_json::from_str::<Win32VideoController>(trimmed).map(|c| vec![c])
    }
    .map_err(|e| MonitorError::unavailable(ProbeKind::Gpus, format!("bad CIM json: {}", e)))?;
    Ok(controllers
        .into_iter()
        .filter_map(|c| c.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && is_integrated_vendor(n))
        .map(GpuEntry::integrated)
        .collect())
}

#[cfg(target_os = "linux")]
fn integrated_gpus() -> Result<Vec<GpuEntry>> {
    Ok(parse_lspci(&run(ProbeKind::Gpus, "lspci", &[])?))
}

#[cfg(target_os = "macos")]
fn integrated_gpus() -> Result<Vec<GpuEntry>> {
    Ok(parse_displays_profiler(&run(
        ProbeKind::Gpus,
        "system_profiler",
        &["SPDisplaysDataType"],
    )?))
}

#[cfg(target_os = "windows")]
fn integrated_gpus() -> Result<Vec<GpuEntry>> {
    let json = run(
        ProbeKind::Gpus,
        "powershell",
        &[
            "-NoProfile",
            "-Command",
            "Get-CimInstance Win32_VideoController | Select-Object Name | ConvertTo-Json -Compress",
        ],
    )?;
    parse_windows_video_controllers(&json)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn integrated_gpus() -> Result<Vec<GpuEntry>> {
    Ok(vec![])
}

/// Discrete cards first, then integrated adapters. A missing tool only drops its part.
pub(super) fn list_gpus() -> Result<Vec<GpuEntry>> {
    let mut gpus = match run(
        ProbeKind::Gpus,
        "nvidia-smi",
        &[
            "--query-gpu=name,memory.total,memory.used,memory.free,temperature.gpu",
            "--format=csv,noheader,nounits",
        ],
    ) {
        Ok(out) => parse_nvidia_smi(&out),
        Err(e) => {
            tracing::debug!(error = %e, operation = "nvidia_smi", "no NVIDIA adapter");
            vec![]
        }
    };
    match integrated_gpus() {
        Ok(integrated) => gpus.extend(integrated),
        Err(e) if gpus.is_empty() => return Err(e),
        Err(e) => {
            tracing::debug!(error = %e, operation = "integrated_gpus", "integrated listing failed")
        }
    }
    Ok(gpus)
}
