// Memory module speed and type. sysinfo only has counters, so this shells out to the
// platform inventory tool once at startup.

use crate::error::{MonitorError, ProbeKind, Result};
use serde::Deserialize;

#[cfg(any(target_os = "windows", target_os = "macos"))]
use super::command::run;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryModuleInfo {
    pub speed_mhz: u32,
    pub form_factor: String,
}

impl MemoryModuleInfo {
    pub fn unknown() -> Self {
        Self {
            speed_mhz: 0,
            form_factor: "Unknown".into(),
        }
    }

    /// First reported speed and first reported type win when modules disagree.
    fn from_modules(modules: &[(Option<u32>, Option<String>)]) -> Self {
        let speed_mhz = modules.iter().find_map(|(s, _)| *s).unwrap_or(0);
        let form_factor = modules
            .iter()
            .find_map(|(_, t)| t.clone().filter(|t| !t.is_empty()))
            .unwrap_or_else(|| "Unknown".into());
        Self {
            speed_mhz,
            form_factor,
        }
    }
}

/// Maps SMBIOS memory type codes to labels; the legacy `MemoryType` code is used when
/// SMBIOS reports nothing (0 or absent). The legacy table stops at DDR3.
pub fn memory_type_label(smbios: Option<u32>, memory_type: Option<u32>) -> &'static str {
    match smbios.filter(|v| *v != 0) {
        Some(20) => "DDR",
        Some(21) => "DDR2",
        Some(22) => "DDR2 FB-DIMM",
        Some(24) => "DDR3",
        Some(26) => "DDR4",
        Some(34) => "DDR5",
        Some(_) => "Unknown",
        None => match memory_type {
            Some(20) => "DDR",
            Some(21) => "DDR2",
            Some(22) => "DDR2 FB-DIMM",
            Some(24) => "DDR3",
            _ => "Unknown",
        },
    }
}

#[derive(Debug, Deserialize)]
struct Win32PhysicalMemory {
    #[serde(rename = "Speed")]
    speed: Option<u32>,
    #[serde(rename = "MemoryType")]
    memory_type: Option<u32>,
    #[serde(rename = "SMBIOSMemoryType")]
    smbios_memory_type: Option<u32>,
}

/// PowerShell's ConvertTo-Json emits a bare object for a single module and an array otherwise.
pub fn parse_windows_memory(json: &str) -> Result<MemoryModuleInfo> {
    let trimmed = json.trim();
    let modules: Vec<Win32PhysicalMemory> = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<Win32PhysicalMemory>>(trimmed)
    } else {
        serde_json::from_str::<Win32PhysicalMemory>(trimmed).map(|m| vec![m])
    }
    .map_err(|e| MonitorError::unavailable(ProbeKind::Memory, format!("bad CIM json: {}", e)))?;
    let modules: Vec<(Option<u32>, Option<String>)> = modules
        .into_iter()
        .map(|m| {
            let label = memory_type_label(m.smbios_memory_type, m.memory_type);
            (m.speed, Some(label.to_string()))
        })
        .collect();
    Ok(MemoryModuleInfo::from_modules(&modules))
}

/// Parses `system_profiler SPMemoryDataType`: blank lines separate modules, values come from
/// "Speed: 2400 MHz" and "Type: DDR4" lines.
pub fn parse_system_profiler(output: &str) -> MemoryModuleInfo {
    let mut modules = Vec::new();
    let mut speed: Option<u32> = None;
    let mut kind: Option<String> = None;
    for line in output.lines().map(str::trim) {
        if line.is_empty() {
            if speed.is_some() || kind.is_some() {
                modules.push((speed.take(), kind.take()));
            }
            continue;
        }
        if let Some(v) = line.strip_prefix("Speed:") {
            speed = v.trim().trim_end_matches("MHz").trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("Type:") {
            kind = Some(v.trim().to_string());
        }
    }
    if speed.is_some() || kind.is_some() {
        modules.push((speed, kind));
    }
    MemoryModuleInfo::from_modules(&modules)
}

#[cfg(target_os = "windows")]
pub(super) fn query_memory_module() -> Result<MemoryModuleInfo> {
    let json = run(
        ProbeKind::Memory,
        "powershell",
        &[
            "-NoProfile",
            "-Command",
            "Get-CimInstance Win32_PhysicalMemory | Select-Object Speed, MemoryType, SMBIOSMemoryType | ConvertTo-Json -Compress",
        ],
    )?;
    parse_windows_memory(&json)
}

#[cfg(target_os = "macos")]
pub(super) fn query_memory_module() -> Result<MemoryModuleInfo> {
    let output = run(ProbeKind::Memory, "system_profiler", &["SPMemoryDataType"])?;
    Ok(parse_system_profiler(&output))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub(super) fn query_memory_module() -> Result<MemoryModuleInfo> {
    Err(MonitorError::unavailable(
        ProbeKind::Memory,
        "no unprivileged memory inventory source on this OS",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smbios_code_wins_over_legacy_code() {
        assert_eq!(memory_type_label(Some(26), Some(0)), "DDR4");
        assert_eq!(memory_type_label(Some(34), None), "DDR5");
        assert_eq!(memory_type_label(Some(0), Some(24)), "DDR3");
        assert_eq!(memory_type_label(None, Some(21)), "DDR2");
        assert_eq!(memory_type_label(None, Some(26)), "Unknown");
        assert_eq!(memory_type_label(Some(99), Some(24)), "Unknown");
        assert_eq!(memory_type_label(None, None), "Unknown");
    }

    #[test]
    fn parses_single_windows_module() {
        let info =
            parse_windows_memory(r#"{"Speed":3200,"MemoryType":0,"SMBIOSMemoryType":26}"#).unwrap();
        assert_eq!(info.speed_mhz, 3200);
        assert_eq!(info.form_factor, "DDR4");
    }

    #[test]
    fn parses_windows_module_array() {
        let json = r#"[{"Speed":null,"MemoryType":24,"SMBIOSMemoryType":0},{"Speed":1600,"MemoryType":24,"SMBIOSMemoryType":0}]"#;
        let info = parse_windows_memory(json).unwrap();
        assert_eq!(info.speed_mhz, 1600);
        assert_eq!(info.form_factor, "DDR3");
    }

    #[test]
    fn rejects_garbage_windows_output() {
        assert!(parse_windows_memory("not json").is_err());
    }

    #[test]
    fn parses_system_profiler_blocks() {
        let output = "Memory:\n\n    Memory Slots:\n\n      BANK 0/DIMM0:\n\n          Size: 8 GB\n          Type: DDR4\n          Speed: 2667 MHz\n\n      BANK 1/DIMM0:\n\n          Size: 8 GB\n          Type: DDR4\n          Speed: 2667 MHz\n";
        let info = parse_system_profiler(output);
        assert_eq!(info.speed_mhz, 2667);
        assert_eq!(info.form_factor, "DDR4");
    }

    #[test]
    fn system_profiler_without_modules_is_unknown() {
        assert_eq!(parse_system_profiler("Memory:\n"), MemoryModuleInfo::unknown());
    }
}
