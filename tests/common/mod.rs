// Shared test helpers: a scriptable probe and snapshot builders

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use taskmon::config::AppConfig;
use taskmon::error::{MonitorError, ProbeKind, Result};
use taskmon::models::*;
use taskmon::probe::SystemProbe;

pub fn process(pid: u32, name: &str, cpu_usage: f32) -> ProcessEntry {
    ProcessEntry {
        pid,
        name: name.to_string(),
        cpu_usage,
        memory_bytes: 64 * 1024 * 1024,
        read_bytes: 4096,
        written_bytes: 2048,
    }
}

pub fn cpu(usage_percent: f32) -> CpuSnapshot {
    CpuSnapshot {
        brand: "Test CPU @ 3.00GHz".into(),
        usage_percent,
        frequency_ghz: 3.0,
        core_count: 8,
        process_count: 3,
        uptime_secs: 3600,
        temperature_celsius: 48.0,
    }
}

pub fn memory() -> MemorySnapshot {
    MemorySnapshot {
        total: 16 * 1024 * 1024 * 1024,
        used: 6 * 1024 * 1024 * 1024,
        available: 10 * 1024 * 1024 * 1024,
        speed_mhz: 3200,
        form_factor: "DDR4".into(),
    }
}

pub fn minimal_snapshot(sequence: u64) -> Snapshot {
    Snapshot {
        sequence,
        timestamp_ms: 1_700_000_000_000,
        cpu: cpu(12.5),
        memory: memory(),
        processes: vec![process(1, "init", 0.1), process(42, "worker", 50.0)],
    }
}

pub fn interface(name: &str, sent: u64, received: u64) -> NetworkInterfaceEntry {
    NetworkInterfaceEntry {
        name: name.into(),
        ipv4: "192.168.1.10".into(),
        mac_address: "00:11:22:33:44:55".into(),
        bytes_sent: sent,
        bytes_received: received,
        send_speed: 0.0,
        recv_speed: 0.0,
    }
}

/// Config with a short interval and quiet stats logging.
pub fn test_config() -> AppConfig {
    AppConfig::load_from_str(
        r#"
[monitoring]
interval_ms = 50
stats_log_interval_secs = 3600
"#,
    )
    .expect("test config")
}

/// Probe whose answers tests can change between calls.
pub struct FakeProbe {
    pub cpu_usage: Mutex<f32>,
    pub processes: Mutex<Vec<ProcessEntry>>,
    pub networks: Mutex<Vec<NetworkInterfaceEntry>>,
    pub services: Mutex<Vec<ServiceEntry>>,
    pub disks: Mutex<Vec<DiskEntry>>,
    pub gpus: Mutex<Vec<GpuEntry>>,
    /// Simulated collection cost, slept inside `cpu()`.
    pub cpu_delay: Mutex<Duration>,
    pub fail_cpu: AtomicBool,
    pub fail_memory: AtomicBool,
    pub fail_processes: AtomicBool,
    pub fail_inventory: AtomicBool,
    pub cpu_calls: AtomicU64,
    pub killed: Mutex<Vec<u32>>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            cpu_usage: Mutex::new(25.0),
            processes: Mutex::new(vec![
                process(1, "init", 0.5),
                process(200, "browser", 30.0),
                process(300, "compiler", 80.0),
            ]),
            networks: Mutex::new(vec![interface("eth0", 0, 0)]),
            services: Mutex::new(vec![ServiceEntry {
                pid: 0,
                name: "cron.service".into(),
                status: "running".into(),
            }]),
            disks: Mutex::new(vec![DiskEntry {
                name: "/dev/sda1".into(),
                mount_point: "/".into(),
                file_system: "ext4".into(),
                total_space: 100,
                available_space: 40,
            }]),
            gpus: Mutex::new(vec![GpuEntry::integrated("Intel UHD Graphics 620")]),
            cpu_delay: Mutex::new(Duration::ZERO),
            fail_cpu: AtomicBool::new(false),
            fail_memory: AtomicBool::new(false),
            fail_processes: AtomicBool::new(false),
            fail_inventory: AtomicBool::new(false),
            cpu_calls: AtomicU64::new(0),
            killed: Mutex::new(vec![]),
        }
    }
}

impl FakeProbe {
    fn inventory<T: Clone>(&self, kind: ProbeKind, rows: &Mutex<Vec<T>>) -> Result<Vec<T>> {
        if self.fail_inventory.load(Ordering::SeqCst) {
            return Err(MonitorError::unavailable(kind, "scripted failure"));
        }
        Ok(rows.lock().unwrap().clone())
    }
}

impl SystemProbe for FakeProbe {
    fn cpu(&self) -> Result<CpuSnapshot> {
        self.cpu_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.cpu_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.fail_cpu.load(Ordering::SeqCst) {
            return Err(MonitorError::transient(ProbeKind::Cpu, "scripted failure"));
        }
        Ok(cpu(*self.cpu_usage.lock().unwrap()))
    }

    fn memory(&self) -> Result<MemorySnapshot> {
        if self.fail_memory.load(Ordering::SeqCst) {
            return Err(MonitorError::transient(ProbeKind::Memory, "scripted failure"));
        }
        Ok(memory())
    }

    fn processes(&self) -> Result<Vec<ProcessEntry>> {
        if self.fail_processes.load(Ordering::SeqCst) {
            return Err(MonitorError::transient(ProbeKind::Processes, "scripted failure"));
        }
        Ok(self.processes.lock().unwrap().clone())
    }

    fn disks(&self) -> Result<Vec<DiskEntry>> {
        self.inventory(ProbeKind::Disks, &self.disks)
    }

    fn networks(&self) -> Result<Vec<NetworkInterfaceEntry>> {
        self.inventory(ProbeKind::Networks, &self.networks)
    }

    fn services(&self) -> Result<Vec<ServiceEntry>> {
        self.inventory(ProbeKind::Services, &self.services)
    }

    fn gpus(&self) -> Result<Vec<GpuEntry>> {
        self.inventory(ProbeKind::Gpus, &self.gpus)
    }

    fn kill_process(&self, pid: u32) -> Result<()> {
        let known = self.processes.lock().unwrap().iter().any(|p| p.pid == pid);
        if !known {
            return Err(MonitorError::invalid(format!("no process with pid {}", pid)));
        }
        self.killed.lock().unwrap().push(pid);
        Ok(())
    }

    fn process_path(&self, pid: u32) -> Result<PathBuf> {
        self.processes
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.pid == pid)
            .map(|p| PathBuf::from(format!("/usr/bin/{}", p.name)))
            .ok_or_else(|| MonitorError::invalid(format!("no process with pid {}", pid)))
    }
}

/// Polls `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
