// OS probes via sysinfo, with platform helpers for what sysinfo does not cover

mod command;
mod gpu;
mod linux;
mod memory;
mod services;

use crate::error::{MonitorError, ProbeKind, Result};
use crate::models::*;
use crate::probe::SystemProbe;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use sysinfo::{
    Components, Disks, Networks, Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System,
    UpdateKind,
};
use tracing::instrument;

pub use memory::{
    MemoryModuleInfo, memory_type_label, parse_system_profiler, parse_windows_memory,
};
pub use gpu::{
    parse_displays_profiler, parse_lspci, parse_nvidia_smi, parse_windows_video_controllers,
};
pub use services::{parse_launchctl_list, parse_systemctl_units, parse_windows_services};

pub struct SysinfoRepo {
    sys: Mutex<System>,
    disks: Mutex<Disks>,
    networks: Mutex<Networks>,
    components: Mutex<Components>,
    last_cpu_refresh: Mutex<Option<(Instant, f32)>>,
    memory_module: MemoryModuleInfo,
}

fn lock<'a, T>(m: &'a Mutex<T>, kind: ProbeKind) -> Result<MutexGuard<'a, T>> {
    m.lock()
        .map_err(|e| MonitorError::transient(kind, format!("sysinfo lock poisoned: {}", e)))
}

impl SysinfoRepo {
    /// Loads the backend. Fails when sysinfo has no implementation for this host.
    pub fn new() -> Result<Self> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(MonitorError::BoundaryLoadFailure(format!(
                "sysinfo does not support {}",
                std::env::consts::OS
            )));
        }
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, process_refresh_kind());
        let disks = Disks::new_with_refreshed_list();
        let networks = Networks::new_with_refreshed_list();
        let components = Components::new_with_refreshed_list();
        // Static hardware facts; the platform tools behind this are too slow to run per tick.
        let memory_module = memory::query_memory_module().unwrap_or_else(|e| {
            tracing::debug!(error = %e, operation = "query_memory_module", "memory module info unavailable");
            MemoryModuleInfo::unknown()
        });
        tracing::debug!(
            speed_mhz = memory_module.speed_mhz,
            form_factor = %memory_module.form_factor,
            "sysinfo backend loaded"
        );
        Ok(Self {
            sys: Mutex::new(sys),
            disks: Mutex::new(disks),
            networks: Mutex::new(networks),
            components: Mutex::new(components),
            last_cpu_refresh: Mutex::new(None),
            memory_module,
        })
    }

    /// CPU usage needs two refreshes at least `MINIMUM_CPU_UPDATE_INTERVAL` apart; callers
    /// faster than that get the previous value instead of blocking.
    fn cpu_usage(&self, sys: &mut System) -> f32 {
        let now = Instant::now();
        let Ok(mut guard) = self.last_cpu_refresh.lock() else {
            sys.refresh_cpu_all();
            return 0.0;
        };
        match *guard {
            Some((prev_ts, prev_usage))
                if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
            {
                prev_usage
            }
            Some(_) => {
                sys.refresh_cpu_all();
                let usage = sys.global_cpu_usage();
                *guard = Some((now, usage));
                usage
            }
            None => {
                // First call only establishes the baseline.
                sys.refresh_cpu_all();
                *guard = Some((now, 0.0));
                0.0
            }
        }
    }

    fn read_cpu_temperature(&self) -> f32 {
        let Ok(mut components) = self.components.lock() else {
            return 0.0;
        };
        components.refresh(true);
        cpu_temperature(
            components
                .list()
                .iter()
                .map(|c| (c.label(), c.temperature().unwrap_or(0.0))),
        )
    }
}

/// Hottest CPU sensor, 0 when none reports. Labels vary per driver: `coretemp Package id 0`,
/// `k10temp Tctl`, `CPU`.
pub fn cpu_temperature<'a>(readings: impl IntoIterator<Item = (&'a str, f32)>) -> f32 {
    readings
        .into_iter()
        .filter(|(label, _)| {
            let label = label.to_lowercase();
            ["cpu", "package", "tctl", "tdie", "core"]
                .iter()
                .any(|k| label.contains(k))
        })
        .map(|(_, t)| t)
        .filter(|t| t.is_finite() && *t > 0.0)
        .fold(0.0, f32::max)
}

fn process_refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_cpu()
        .with_memory()
        .with_disk_usage()
}

impl SystemProbe for SysinfoRepo {
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "cpu"))]
    fn cpu(&self) -> Result<CpuSnapshot> {
        let mut sys = lock(&self.sys, ProbeKind::Cpu)?;
        let usage = self.cpu_usage(&mut sys);
        let cpus = sys.cpus();
        if cpus.is_empty() {
            return Err(MonitorError::transient(ProbeKind::Cpu, "no CPUs reported"));
        }
        let brand = cpus
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(linux::read_cpu_model_linux)
            .unwrap_or_else(|| "Unknown".into());
        let frequency_ghz = cpus.first().map(|c| c.frequency() as f64 / 1000.0).unwrap_or(0.0);
        let core_count = cpus.len() as u32;
        let process_count = sys.processes().len().min(u32::MAX as usize) as u32;
        drop(sys);

        Ok(CpuSnapshot {
            brand,
            usage_percent: usage,
            frequency_ghz,
            core_count,
            process_count,
            uptime_secs: System::uptime(),
            temperature_celsius: self.read_cpu_temperature(),
        }
        .normalized())
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "memory"))]
    fn memory(&self) -> Result<MemorySnapshot> {
        let mut sys = lock(&self.sys, ProbeKind::Memory)?;
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(MonitorError::transient(ProbeKind::Memory, "total memory reported as 0"));
        }
        let available = sys.available_memory();
        Ok(MemorySnapshot {
            total,
            used: sys.used_memory(),
            available,
            speed_mhz: self.memory_module.speed_mhz,
            form_factor: self.memory_module.form_factor.clone(),
        })
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "processes"))]
    fn processes(&self) -> Result<Vec<ProcessEntry>> {
        let mut sys = lock(&self.sys, ProbeKind::Processes)?;
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, process_refresh_kind());

        let mut processes: Vec<ProcessEntry> = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                let disk = process.disk_usage();
                ProcessEntry {
                    pid: pid.as_u32(),
                    name: process.name().to_string_lossy().into_owned(),
                    cpu_usage: process.cpu_usage().max(0.0),
                    memory_bytes: process.memory(),
                    read_bytes: disk.total_read_bytes,
                    written_bytes: disk.total_written_bytes,
                }
            })
            .collect();
        sort_by_cpu_desc(&mut processes);
        Ok(processes)
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "disks"))]
    fn disks(&self) -> Result<Vec<DiskEntry>> {
        let mut disks = lock(&self.disks, ProbeKind::Disks)?;
        disks.refresh(true);
        Ok(disks
            .list()
            .iter()
            .map(|d| DiskEntry {
                name: d.name().to_string_lossy().into_owned(),
                mount_point: d.mount_point().to_string_lossy().into_owned(),
                file_system: d.file_system().to_string_lossy().into_owned(),
                total_space: d.total_space(),
                available_space: d.available_space(),
            })
            .collect())
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "networks"))]
    fn networks(&self) -> Result<Vec<NetworkInterfaceEntry>> {
        let mut networks = lock(&self.networks, ProbeKind::Networks)?;
        networks.refresh(true);
        let mut interfaces: Vec<NetworkInterfaceEntry> = networks
            .list()
            .iter()
            .map(|(name, data)| NetworkInterfaceEntry {
                name: name.clone(),
                ipv4: data
                    .ip_networks()
                    .iter()
                    .find(|n| n.addr.is_ipv4())
                    .map(|n| n.addr.to_string())
                    .unwrap_or_default(),
                mac_address: data.mac_address().to_string(),
                bytes_sent: data.total_transmitted(),
                bytes_received: data.total_received(),
                send_speed: 0.0,
                recv_speed: 0.0,
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(interfaces)
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "services"))]
    fn services(&self) -> Result<Vec<ServiceEntry>> {
        services::list_services()
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "gpus"))]
    fn gpus(&self) -> Result<Vec<GpuEntry>> {
        gpu::list_gpus()
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "kill_process"))]
    fn kill_process(&self, pid: u32) -> Result<()> {
        let mut sys = lock(&self.sys, ProbeKind::ProcessControl)?;
        let target = Pid::from_u32(pid);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );
        let Some(process) = sys.process(target) else {
            return Err(MonitorError::invalid(format!("no process with pid {}", pid)));
        };
        let delivered = match process.kill_with(Signal::Term) {
            Some(sent) => sent,
            // Signal not supported on this platform, fall back to kill()
            None => process.kill(),
        };
        if delivered {
            tracing::info!(pid, "process terminated");
            Ok(())
        } else {
            Err(MonitorError::transient(
                ProbeKind::ProcessControl,
                format!("failed to terminate pid {} (permission denied?)", pid),
            ))
        }
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "process_path"))]
    fn process_path(&self, pid: u32) -> Result<PathBuf> {
        let mut sys = lock(&self.sys, ProbeKind::ProcessControl)?;
        let target = Pid::from_u32(pid);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
        );
        let Some(process) = sys.process(target) else {
            return Err(MonitorError::invalid(format!("no process with pid {}", pid)));
        };
        process.exe().map(|p| p.to_path_buf()).ok_or_else(|| {
            MonitorError::unavailable(
                ProbeKind::ProcessControl,
                format!("executable path of pid {} is not readable", pid),
            )
        })
    }
}
