// Process and service table models

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// A row of the process table. Rebuilt every tick; only `pid` links rows across snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    /// Per-process usage, not normalized by core count (can exceed 100).
    pub cpu_usage: f32,
    pub memory_bytes: u64,
    pub read_bytes: u64,
    pub written_bytes: u64,
}

impl ProcessEntry {
    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / MIB
    }

    pub fn read_kb(&self) -> f64 {
        self.read_bytes as f64 / KIB
    }

    pub fn written_kb(&self) -> f64 {
        self.written_bytes as f64 / KIB
    }
}

/// Sort for display: busiest first, pid as tie-breaker so the order is stable.
pub fn sort_by_cpu_desc(processes: &mut [ProcessEntry]) {
    processes.sort_by(|a, b| {
        b.cpu_usage
            .total_cmp(&a.cpu_usage)
            .then_with(|| a.pid.cmp(&b.pid))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    /// Owning process id, 0 when the platform does not report one.
    pub pid: u32,
    pub name: String,
    pub status: String,
}
