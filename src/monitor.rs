// Consumer-facing facade: owns the probe backend, the network rate state and the scheduler.

use crate::aggregator::collect_snapshot;
use crate::config::AppConfig;
use crate::error::{MonitorError, Result};
use crate::models::{DiskEntry, GpuEntry, NetworkInterfaceEntry, ServiceEntry, Snapshot};
use crate::probe::SystemProbe;
use crate::rate::RateCalculator;
use crate::sysinfo_repo::SysinfoRepo;
use crate::worker::{Scheduler, SchedulerStats, SubscriptionId, WorkerConfig};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// A running or stoppable collector for the local machine.
///
/// The probe backend is owned here and handed explicitly to the scheduler; nothing is global,
/// so several monitors may coexist (each talks to the same OS-wide counters).
pub struct Monitor {
    probe: Arc<dyn SystemProbe>,
    scheduler: Scheduler,
    rates: Mutex<RateCalculator>,
    config: AppConfig,
}

impl Monitor {
    /// Loads the sysinfo backend. `BoundaryLoadFailure` here means collection can never start.
    pub fn new(config: AppConfig) -> Result<Self> {
        let probe = SysinfoRepo::new()?;
        Ok(Self::with_probe(Arc::new(probe), config))
    }

    pub fn with_probe(probe: Arc<dyn SystemProbe>, config: AppConfig) -> Self {
        let scheduler = Scheduler::new(
            probe.clone(),
            WorkerConfig {
                stats_log_interval_secs: config.monitoring.stats_log_interval_secs,
                process_limit: config.processes.limit,
            },
        );
        let rates = RateCalculator::new(config.stale_after(), config.network.max_bytes_per_sec);
        Self {
            probe,
            scheduler,
            rates: Mutex::new(rates),
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Starts background collection every `interval_seconds`. Idempotent: `Ok(false)` when
    /// already running. A loop that was asked to stop counts as stopped and is replaced.
    pub fn start(&self, interval_seconds: f64) -> Result<bool> {
        let period = Duration::try_from_secs_f64(interval_seconds).map_err(|_| {
            MonitorError::invalid(format!(
                "interval must be a positive number of seconds, got {}",
                interval_seconds
            ))
        })?;
        self.scheduler.start(period)
    }

    pub fn start_default(&self) -> Result<bool> {
        self.scheduler.start(self.config.interval())
    }

    /// Blocks until the collection thread has exited.
    pub fn stop(&self) -> bool {
        self.scheduler.stop()
    }

    pub fn request_stop(&self) {
        self.scheduler.request_stop()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn register<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        self.scheduler.register(callback)
    }

    pub fn unregister(&self, id: SubscriptionId) -> bool {
        self.scheduler.unregister(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.scheduler.subscriber_count()
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.scheduler.latest()
    }

    pub fn watch(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.scheduler.watch()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// One synchronous pass outside the scheduler (sequence 0). Not for time-sensitive threads.
    pub fn collect_once(&self) -> Result<Snapshot> {
        collect_snapshot(self.probe.as_ref(), 0, self.config.processes.limit)
    }

    pub fn disk_info(&self) -> Vec<DiskEntry> {
        self.probe.disks().unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "disk_info", "disk query failed");
            vec![]
        })
    }

    /// Interfaces with `send_speed` / `recv_speed` computed against the previous call.
    pub fn network_info(&self) -> Vec<NetworkInterfaceEntry> {
        let mut interfaces = match self.probe.networks() {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(error = %e, operation = "network_info", "network query failed");
                return vec![];
            }
        };
        let now = Instant::now();
        match self.rates.lock() {
            Ok(mut rates) => rates.apply(&mut interfaces, now),
            Err(e) => {
                // A panic mid-update leaves the history suspect; start over from zero.
                let mut rates = e.into_inner();
                rates.reset();
                rates.apply(&mut interfaces, now);
            }
        }
        interfaces
    }

    pub fn services_info(&self) -> Vec<ServiceEntry> {
        self.probe.services().unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "services_info", "service query failed");
            vec![]
        })
    }

    /// Runs external tools (`nvidia-smi`, `lspci`, ...); expect hundreds of milliseconds.
    pub fn gpu_info(&self) -> Vec<GpuEntry> {
        self.probe.gpus().unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "gpu_info", "gpu query failed");
            vec![]
        })
    }

    pub fn kill_process(&self, pid: u32) -> bool {
        match self.probe.kill_process(pid) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, pid, operation = "kill_process", "kill failed");
                false
            }
        }
    }

    pub fn process_path(&self, pid: u32) -> Option<String> {
        match self.probe.process_path(pid) {
            Ok(path) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                tracing::debug!(error = %e, pid, operation = "process_path", "path lookup failed");
                None
            }
        }
    }
}
