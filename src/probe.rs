// The probe seam: one query per resource kind, plus process-control commands.

use std::path::PathBuf;

use crate::error::Result;
use crate::models::{
    CpuSnapshot, DiskEntry, GpuEntry, MemorySnapshot, NetworkInterfaceEntry, ProcessEntry,
    ServiceEntry,
};

/// Operating-system facts source.
///
/// Queries have no side effects beyond reading OS state and return either a complete result
/// or an error. A kind the host does not have (services on an unsupported OS) yields an empty
/// list instead of an error. Implementations are shared between the scheduler thread and
/// on-demand callers, so they take `&self` and synchronize internally.
pub trait SystemProbe: Send + Sync {
    fn cpu(&self) -> Result<CpuSnapshot>;

    fn memory(&self) -> Result<MemorySnapshot>;

    fn processes(&self) -> Result<Vec<ProcessEntry>>;

    fn disks(&self) -> Result<Vec<DiskEntry>>;

    /// Raw cumulative counters; speeds are left at zero.
    fn networks(&self) -> Result<Vec<NetworkInterfaceEntry>>;

    fn services(&self) -> Result<Vec<ServiceEntry>>;

    /// Discrete and integrated graphics adapters. Slow; meant for on-demand use.
    fn gpus(&self) -> Result<Vec<GpuEntry>>;

    fn kill_process(&self, pid: u32) -> Result<()>;

    fn process_path(&self, pid: u32) -> Result<PathBuf>;
}
