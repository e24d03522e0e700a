// #[repr(C)] records handed across the C boundary, and their builders.
//
// Every string field points into a CString kept in the same `CStrings` as the record, so a
// record is valid exactly as long as its owning allocation (or callback invocation).

use std::ffi::{CString, c_char};

use crate::models::{
    CpuSnapshot, DiskEntry, GpuEntry, MemorySnapshot, NetworkInterfaceEntry, ProcessEntry,
    ServiceEntry, Snapshot,
};

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonCpuInfo {
    pub brand: *const c_char,
    pub usage_percent: f32,
    pub frequency_ghz: f64,
    pub core_count: u32,
    pub process_count: u32,
    pub uptime_secs: u64,
    pub temperature_celsius: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonMemoryInfo {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub speed_mhz: u32,
    pub form_factor: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonProcessInfo {
    pub pid: u32,
    pub name: *const c_char,
    pub cpu_usage: f32,
    pub memory_bytes: u64,
    pub read_bytes: u64,
    pub written_bytes: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonDiskInfo {
    pub name: *const c_char,
    pub mount_point: *const c_char,
    pub file_system: *const c_char,
    pub total_space: u64,
    pub available_space: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonNetworkInfo {
    pub name: *const c_char,
    pub ipv4: *const c_char,
    pub mac_address: *const c_char,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_speed: f64,
    pub recv_speed: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonServiceInfo {
    pub pid: u32,
    pub name: *const c_char,
    pub status: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonGpuInfo {
    pub model: *const c_char,
    pub integrated: bool,
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_free: u64,
    pub temperature_celsius: f32,
}

/// `(pointer, length)` pair. An empty array is `(null, 0)` and needs no release.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonArray<T> {
    pub data: *const T,
    pub len: usize,
}

impl<T> TaskmonArray<T> {
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null(),
            len: 0,
        }
    }
}

pub type TaskmonProcessInfoArray = TaskmonArray<TaskmonProcessInfo>;
pub type TaskmonDiskInfoArray = TaskmonArray<TaskmonDiskInfo>;
pub type TaskmonNetworkInfoArray = TaskmonArray<TaskmonNetworkInfo>;
pub type TaskmonServiceInfoArray = TaskmonArray<TaskmonServiceInfo>;
pub type TaskmonGpuInfoArray = TaskmonArray<TaskmonGpuInfo>;
pub type TaskmonByteBuffer = TaskmonArray<u8>;

/// Borrowed view passed to snapshot callbacks. Valid only during the call.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TaskmonSnapshotView {
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub cpu: TaskmonCpuInfo,
    pub memory: TaskmonMemoryInfo,
    pub processes: TaskmonProcessInfoArray,
}

/// Owner of the C strings referenced by a batch of records.
#[derive(Debug, Default)]
pub struct CStrings(Vec<CString>);

impl CStrings {
    /// Interior NULs are dropped rather than truncating the value.
    pub fn push(&mut self, s: &str) -> *const c_char {
        let c = CString::new(s.replace('\0', "")).unwrap_or_default();
        let ptr = c.as_ptr();
        self.0.push(c);
        ptr
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn cpu_info(cpu: &CpuSnapshot, strings: &mut CStrings) -> TaskmonCpuInfo {
    TaskmonCpuInfo {
        brand: strings.push(&cpu.brand),
        usage_percent: cpu.usage_percent,
        frequency_ghz: cpu.frequency_ghz,
        core_count: cpu.core_count,
        process_count: cpu.process_count,
        uptime_secs: cpu.uptime_secs,
        temperature_celsius: cpu.temperature_celsius,
    }
}

pub fn memory_info(memory: &MemorySnapshot, strings: &mut CStrings) -> TaskmonMemoryInfo {
    TaskmonMemoryInfo {
        total: memory.total,
        used: memory.used,
        available: memory.available,
        speed_mhz: memory.speed_mhz,
        form_factor: strings.push(&memory.form_factor),
    }
}

pub fn process_info(p: &ProcessEntry, strings: &mut CStrings) -> TaskmonProcessInfo {
    TaskmonProcessInfo {
        pid: p.pid,
        name: strings.push(&p.name),
        cpu_usage: p.cpu_usage,
        memory_bytes: p.memory_bytes,
        read_bytes: p.read_bytes,
        written_bytes: p.written_bytes,
    }
}

pub fn disk_info(d: &DiskEntry, strings: &mut CStrings) -> TaskmonDiskInfo {
    TaskmonDiskInfo {
        name: strings.push(&d.name),
        mount_point: strings.push(&d.mount_point),
        file_system: strings.push(&d.file_system),
        total_space: d.total_space,
        available_space: d.available_space,
    }
}

pub fn network_info(n: &NetworkInterfaceEntry, strings: &mut CStrings) -> TaskmonNetworkInfo {
    TaskmonNetworkInfo {
        name: strings.push(&n.name),
        ipv4: strings.push(&n.ipv4),
        mac_address: strings.push(&n.mac_address),
        bytes_sent: n.bytes_sent,
        bytes_received: n.bytes_received,
        send_speed: n.send_speed,
        recv_speed: n.recv_speed,
    }
}

pub fn service_info(s: &ServiceEntry, strings: &mut CStrings) -> TaskmonServiceInfo {
    TaskmonServiceInfo {
        pid: s.pid,
        name: strings.push(&s.name),
        status: strings.push(&s.status),
    }
}

pub fn gpu_info(g: &GpuEntry, strings: &mut CStrings) -> TaskmonGpuInfo {
    TaskmonGpuInfo {
        model: strings.push(&g.model),
        integrated: g.integrated,
        memory_total: g.memory_total,
        memory_used: g.memory_used,
        memory_free: g.memory_free,
        temperature_celsius: g.temperature_celsius,
    }
}

/// Builds the callback view. `processes` must outlive the returned view.
pub fn snapshot_view(
    snapshot: &Snapshot,
    processes: &[TaskmonProcessInfo],
    strings: &mut CStrings,
) -> TaskmonSnapshotView {
    TaskmonSnapshotView {
        sequence: snapshot.sequence,
        timestamp_ms: snapshot.timestamp_ms,
        cpu: cpu_info(&snapshot.cpu, strings),
        memory: memory_info(&snapshot.memory, strings),
        processes: if processes.is_empty() {
            TaskmonArray::empty()
        } else {
            TaskmonArray {
                data: processes.as_ptr(),
                len: processes.len(),
            }
        },
    }
}
