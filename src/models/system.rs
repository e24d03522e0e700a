// CPU, memory and per-tick snapshot models

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

use super::ProcessEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct CpuSnapshot {
    pub brand: String,
    pub usage_percent: f32,
    pub frequency_ghz: f64,
    pub core_count: u32,
    pub process_count: u32,
    pub uptime_secs: u64,
    /// Hottest CPU sensor in degrees Celsius, 0 when the host exposes none.
    pub temperature_celsius: f32,
}

impl CpuSnapshot {
    /// Enforces usage in [0, 100], at least one core and a usable temperature, whatever the
    /// probe reported.
    pub fn normalized(mut self) -> Self {
        self.usage_percent = if self.usage_percent.is_finite() {
            self.usage_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        self.core_count = self.core_count.max(1);
        if !self.temperature_celsius.is_finite() || self.temperature_celsius < 0.0 {
            self.temperature_celsius = 0.0;
        }
        self
    }
}

/// Memory counters in bytes. `used + available` may briefly exceed `total`
/// because the OS updates the counters independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    /// Nominal module speed in MHz, 0 when unknown.
    pub speed_mhz: u32,
    /// Module type label such as "DDR4".
    pub form_factor: String,
}

impl MemorySnapshot {
    pub fn usage_percent(&self) -> f64 {
        if self.total > 0 {
            (self.used as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// One collection tick: CPU, memory and the process table taken together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub cpu: CpuSnapshot,
    pub memory: MemorySnapshot,
    pub processes: Vec<ProcessEntry>,
}
