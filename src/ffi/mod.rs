// C boundary over an opaque handle. Every buffer handed out is tracked in the handle's ledger
// and freed through `taskmon_release`.

mod ledger;
pub mod records;

use std::ffi::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::codec;
use crate::config::AppConfig;
use crate::models::Snapshot;
use crate::monitor::Monitor;
use crate::version;
use crate::worker::SubscriptionId;
use ledger::Ledger;
pub use records::{
    CStrings, TaskmonArray, TaskmonByteBuffer, TaskmonCpuInfo, TaskmonDiskInfo,
    TaskmonDiskInfoArray, TaskmonGpuInfo, TaskmonGpuInfoArray, TaskmonMemoryInfo, TaskmonNetworkInfo, TaskmonNetworkInfoArray,
    TaskmonProcessInfo, TaskmonProcessInfoArray, TaskmonServiceInfo, TaskmonServiceInfoArray,
    TaskmonSnapshotView,
};

/// Called on the scheduler thread once per snapshot. `view` and everything it points to are
/// borrowed for the duration of the call and must not be passed to `taskmon_release`.
pub type TaskmonSnapshotCallback =
    Option<unsafe extern "C" fn(view: *const TaskmonSnapshotView, user_data: *mut c_void)>;

/// Opaque to C callers.
pub struct TaskmonHandle {
    monitor: Monitor,
    ledger: Mutex<Ledger>,
}

impl TaskmonHandle {
    pub fn new(monitor: Monitor) -> Self {
        Self {
            monitor,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Hands the handle to C. Pair with `taskmon_destroy`.
    pub fn into_raw(self) -> *mut TaskmonHandle {
        Box::into_raw(Box::new(self))
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Last published snapshot, or a one-off collection when the scheduler has not run yet.
    fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        if let Some(s) = self.monitor.latest() {
            return Some(s);
        }
        match self.monitor.collect_once() {
            Ok(s) => Some(Arc::new(s)),
            Err(e) => {
                tracing::warn!(error = %e, operation = "current_snapshot", "collection failed");
                None
            }
        }
    }

    fn hand_out_one<T: 'static>(&self, record: T, strings: CStrings) -> *const T {
        let boxed = Box::new(record);
        let ptr: *const T = &*boxed;
        self.ledger().record(ptr as usize, boxed, strings);
        ptr
    }

    fn hand_out_array<T: 'static>(&self, records: Vec<T>, strings: CStrings) -> TaskmonArray<T> {
        if records.is_empty() {
            return TaskmonArray::empty();
        }
        let boxed = records.into_boxed_slice();
        let data = boxed.as_ptr();
        let len = boxed.len();
        self.ledger().record(data as usize, Box::new(boxed), strings);
        TaskmonArray { data, len }
    }
}

#[derive(Clone, Copy)]
struct UserData(*mut c_void);

// The caller guarantees `user_data` may be used from the scheduler thread.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

impl UserData {
    fn get(self) -> *mut c_void {
        self.0
    }
}

fn boundary<T>(operation: &'static str, fallback: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => v,
        Err(_) => {
            tracing::error!(operation, "panic caught at the C boundary");
            fallback
        }
    }
}

/// # Safety
/// `handle` must be null or a live pointer from `taskmon_create` / `TaskmonHandle::into_raw`.
unsafe fn handle_ref<'a>(handle: *const TaskmonHandle) -> Option<&'a TaskmonHandle> {
    unsafe { handle.as_ref() }
}

/// Creates a monitor with config from `CONFIG_FILE` / `config.toml`. Null if the probe
/// backend cannot be loaded on this host.
#[unsafe(no_mangle)]
pub extern "C" fn taskmon_create() -> *mut TaskmonHandle {
    boundary("create", ptr::null_mut(), || {
        let config = AppConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "create", "config load failed, using defaults");
            AppConfig::default()
        });
        match Monitor::new(config) {
            Ok(monitor) => TaskmonHandle::new(monitor).into_raw(),
            Err(e) => {
                tracing::error!(error = %e, operation = "create", "monitor unavailable");
                ptr::null_mut()
            }
        }
    })
}

/// Stops collection and frees the handle together with every outstanding buffer.
///
/// # Safety
/// `handle` must be null or live, and must not be used afterwards. Must not be called from
/// inside a snapshot callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_destroy(handle: *mut TaskmonHandle) {
    if handle.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(handle) };
    boundary("destroy", (), move || {
        handle.monitor.stop();
        drop(handle);
    })
}

/// 1 = started, 0 = already running, -1 = invalid interval or start failure.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_start(handle: *mut TaskmonHandle, interval_seconds: f64) -> i32 {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return -1;
    };
    boundary("start", -1, || match h.monitor.start(interval_seconds) {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(e) => {
            tracing::warn!(error = %e, operation = "start", "start rejected");
            -1
        }
    })
}

/// Blocks until the collection thread has exited. False if it was not running.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_stop(handle: *mut TaskmonHandle) -> bool {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return false;
    };
    boundary("stop", false, || h.monitor.stop())
}

/// Returns a nonzero subscription id, or 0 when `callback` or `handle` is null.
///
/// # Safety
/// `handle` must be null or live. `user_data` must stay valid until the subscription is
/// removed and be usable from another thread.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_register(
    handle: *mut TaskmonHandle,
    callback: TaskmonSnapshotCallback,
    user_data: *mut c_void,
) -> u64 {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return 0;
    };
    let Some(callback) = callback else {
        return 0;
    };
    let user_data = UserData(user_data);
    boundary("register", 0, || {
        let id = h.monitor.register(move |snapshot| {
            let mut strings = CStrings::default();
            let processes: Vec<TaskmonProcessInfo> = snapshot
                .processes
                .iter()
                .map(|p| records::process_info(p, &mut strings))
                .collect();
            let view = records::snapshot_view(snapshot, &processes, &mut strings);
            unsafe { callback(&view, user_data.get()) };
        });
        id.0
    })
}

/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_unregister(handle: *mut TaskmonHandle, id: u64) -> bool {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return false;
    };
    boundary("unregister", false, || {
        h.monitor.unregister(SubscriptionId(id))
    })
}

/// Null when no snapshot can be produced. Release with `taskmon_release`.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_get_cpu_info(handle: *mut TaskmonHandle) -> *const TaskmonCpuInfo {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return ptr::null();
    };
    boundary("get_cpu_info", ptr::null(), || {
        let Some(snapshot) = h.current_snapshot() else {
            return ptr::null();
        };
        let mut strings = CStrings::default();
        let record = records::cpu_info(&snapshot.cpu, &mut strings);
        h.hand_out_one(record, strings)
    })
}

/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_get_memory_info(
    handle: *mut TaskmonHandle,
) -> *const TaskmonMemoryInfo {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return ptr::null();
    };
    boundary("get_memory_info", ptr::null(), || {
        let Some(snapshot) = h.current_snapshot() else {
            return ptr::null();
        };
        let mut strings = CStrings::default();
        let record = records::memory_info(&snapshot.memory, &mut strings);
        h.hand_out_one(record, strings)
    })
}

/// Busiest first. Release `data` with `taskmon_release`.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_get_process_info_array(
    handle: *mut TaskmonHandle,
) -> TaskmonProcessInfoArray {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return TaskmonArray::empty();
    };
    boundary("get_process_info_array", TaskmonArray::empty(), || {
        let Some(snapshot) = h.current_snapshot() else {
            return TaskmonArray::empty();
        };
        let mut strings = CStrings::default();
        let rows: Vec<_> = snapshot
            .processes
            .iter()
            .map(|p| records::process_info(p, &mut strings))
            .collect();
        h.hand_out_array(rows, strings)
    })
}

/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_get_disk_info_array(
    handle: *mut TaskmonHandle,
) -> TaskmonDiskInfoArray {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return TaskmonArray::empty();
    };
    boundary("get_disk_info_array", TaskmonArray::empty(), || {
        let mut strings = CStrings::default();
        let rows: Vec<_> = h
            .monitor
            .disk_info()
            .iter()
            .map(|d| records::disk_info(d, &mut strings))
            .collect();
        h.hand_out_array(rows, strings)
    })
}

/// Speeds are computed against the previous call on the same handle.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_get_network_info_array(
    handle: *mut TaskmonHandle,
) -> TaskmonNetworkInfoArray {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return TaskmonArray::empty();
    };
    boundary("get_network_info_array", TaskmonArray::empty(), || {
        let mut strings = CStrings::default();
        let rows: Vec<_> = h
            .monitor
            .network_info()
            .iter()
            .map(|n| records::network_info(n, &mut strings))
            .collect();
        h.hand_out_array(rows, strings)
    })
}

/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_get_services_info_array(
    handle: *mut TaskmonHandle,
) -> TaskmonServiceInfoArray {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return TaskmonArray::empty();
    };
    boundary("get_services_info_array", TaskmonArray::empty(), || {
        let mut strings = CStrings::default();
        let rows: Vec<_> = h
            .monitor
            .services_info()
            .iter()
            .map(|s| records::service_info(s, &mut strings))
            .collect();
        h.hand_out_array(rows, strings)
    })
}

/// Runs the platform's adapter tools; slow enough to keep off UI threads.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_get_gpu_info_array(
    handle: *mut TaskmonHandle,
) -> TaskmonGpuInfoArray {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return TaskmonArray::empty();
    };
    boundary("get_gpu_info_array", TaskmonArray::empty(), || {
        let mut strings = CStrings::default();
        let rows: Vec<_> = h
            .monitor
            .gpu_info()
            .iter()
            .map(|g| records::gpu_info(g, &mut strings))
            .collect();
        h.hand_out_array(rows, strings)
    })
}

/// The current snapshot in the versioned binary layout (see `codec`). Empty on failure.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_latest_snapshot_encoded(
    handle: *mut TaskmonHandle,
) -> TaskmonByteBuffer {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return TaskmonArray::empty();
    };
    boundary("latest_snapshot_encoded", TaskmonArray::empty(), || {
        let Some(snapshot) = h.current_snapshot() else {
            return TaskmonArray::empty();
        };
        match codec::encode_snapshot(&snapshot) {
            Ok(bytes) => h.hand_out_array(bytes, CStrings::default()),
            Err(e) => {
                tracing::warn!(error = %e, operation = "latest_snapshot_encoded", "encode failed");
                TaskmonArray::empty()
            }
        }
    })
}

/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_kill_process(handle: *mut TaskmonHandle, pid: u32) -> bool {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return false;
    };
    boundary("kill_process", false, || h.monitor.kill_process(pid))
}

/// Executable path, or null when unknown. Release with `taskmon_release`.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_get_process_path(
    handle: *mut TaskmonHandle,
    pid: u32,
) -> *const c_char {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return ptr::null();
    };
    boundary("get_process_path", ptr::null(), || {
        let Some(path) = h.monitor.process_path(pid) else {
            return ptr::null();
        };
        let mut strings = CStrings::default();
        let ptr = strings.push(&path);
        h.ledger().record(ptr as usize, Box::new(()), strings);
        ptr
    })
}

/// Frees a buffer returned by this handle. False for null, unknown or already released
/// pointers; nothing is freed in that case.
///
/// # Safety
/// `handle` must be null or live. `ptr` is only compared, never dereferenced.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_release(handle: *mut TaskmonHandle, ptr: *const c_void) -> bool {
    if ptr.is_null() {
        return false;
    }
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return false;
    };
    boundary("release", false, || {
        let released = h.ledger().release(ptr as usize);
        if !released {
            tracing::warn!(
                addr = ptr as usize,
                operation = "release",
                "unknown or already released pointer"
            );
        }
        released
    })
}

/// Number of buffers handed out and not yet released.
///
/// # Safety
/// `handle` must be null or live.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn taskmon_outstanding(handle: *mut TaskmonHandle) -> usize {
    let Some(h) = (unsafe { handle_ref(handle) }) else {
        return 0;
    };
    boundary("outstanding", 0, || h.ledger().outstanding())
}

/// Static NUL-terminated version string; never released.
#[unsafe(no_mangle)]
pub extern "C" fn taskmon_version() -> *const c_char {
    version::VERSION_NUL.as_ptr().cast()
}
