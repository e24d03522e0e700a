// Background collection scheduler.
// One named OS thread per running scheduler drives a current-thread tokio runtime; each tick runs
// the aggregator, publishes the snapshot and calls subscribers in registration order.

use crate::aggregator::collect_snapshot;
use crate::error::{MonitorError, Result};
use crate::models::Snapshot;
use crate::probe::SystemProbe;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, interval};
use tracing::Instrument;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Callbacks run on the scheduler thread and must return quickly. Inside a callback,
/// [`Scheduler::stop`] only signals; prefer [`Scheduler::request_stop`] there.
pub type SnapshotCallback = dyn Fn(&Snapshot) + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

struct Subscriber {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    callback: Arc<SnapshotCallback>,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    list: Vec<Subscriber>,
}

type DeliveryList = Vec<(Arc<AtomicBool>, Arc<SnapshotCallback>)>;

impl Subscribers {
    /// Copy of the current list so callbacks may (un)register while a delivery is running.
    fn delivery_list(&self) -> DeliveryList {
        self.list
            .iter()
            .map(|s| (s.active.clone(), s.callback.clone()))
            .collect()
    }
}

/// Scheduler timing and logging config.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to log tick counters at INFO level (real seconds).
    pub stats_log_interval_secs: u64,
    /// Busiest-N cap on the process table; 0 keeps all.
    pub process_limit: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: 60,
            process_limit: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    failed_ticks: AtomicU64,
    callback_panics: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub callback_panics: u64,
}

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Running {
    /// Thread alive and not told to stop.
    fn is_live(&self) -> bool {
        !self.handle.is_finished() && !*self.stop_tx.borrow()
    }
}

pub struct Scheduler {
    probe: Arc<dyn SystemProbe>,
    config: WorkerConfig,
    subscribers: Arc<Mutex<Subscribers>>,
    latest_tx: watch::Sender<Option<Arc<Snapshot>>>,
    counters: Arc<Counters>,
    sequence: Arc<AtomicU64>,
    tick_gate: Arc<Mutex<()>>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(probe: Arc<dyn SystemProbe>, config: WorkerConfig) -> Self {
        let (latest_tx, _) = watch::channel(None);
        Self {
            probe,
            config,
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            latest_tx,
            counters: Arc::new(Counters::default()),
            sequence: Arc::new(AtomicU64::new(0)),
            tick_gate: Arc::new(Mutex::new(())),
            running: Mutex::new(None),
        }
    }

    /// Starts collecting every `period`. Returns `Ok(false)` when already running.
    ///
    /// A loop that was told to stop (`request_stop`, or `stop` from a callback) no longer counts
    /// as running: it is reaped and a fresh loop is spawned.
    pub fn start(&self, period: Duration) -> Result<bool> {
        if period.is_zero() {
            return Err(MonitorError::invalid("collection interval must be > 0"));
        }
        let stopping = {
            let mut running = self.lock_running();
            match running.as_ref() {
                Some(current) if current.is_live() => return Ok(false),
                Some(_) => running.take(),
                None => None,
            }
        };
        // Reaped without holding the lock so a callback still in flight can reach is_running().
        if let Some(old) = stopping {
            reap(old);
        }

        let mut running = self.lock_running();
        if running.as_ref().is_some_and(Running::is_live) {
            // Another start() won the race while the old loop was being reaped.
            return Ok(false);
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| MonitorError::BoundaryLoadFailure(format!("scheduler runtime: {}", e)))?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let ctx = LoopContext {
            probe: self.probe.clone(),
            subscribers: self.subscribers.clone(),
            latest_tx: self.latest_tx.clone(),
            counters: self.counters.clone(),
            sequence: self.sequence.clone(),
            tick_gate: self.tick_gate.clone(),
            period,
            process_limit: self.config.process_limit,
            stats_log_interval: Duration::from_secs(self.config.stats_log_interval_secs.max(1)),
        };
        let span = tracing::span!(
            tracing::Level::DEBUG,
            "scheduler",
            interval_ms = period.as_millis() as u64
        );
        let handle = std::thread::Builder::new()
            .name("taskmon-scheduler".into())
            .spawn(move || runtime.block_on(run_loop(ctx, stop_rx).instrument(span)))
            .map_err(|e| MonitorError::BoundaryLoadFailure(format!("scheduler thread: {}", e)))?;

        tracing::info!(interval_ms = period.as_millis() as u64, "collection started");
        *running = Some(Running { stop_tx, handle });
        Ok(true)
    }

    /// Signals the loop and waits for the thread to exit. No callback runs after this returns.
    /// Returns `false` when nothing was running.
    ///
    /// Called from inside a callback this cannot join its own thread; it degrades to
    /// [`Scheduler::request_stop`] and the thread is reaped by the next `start` or `stop`.
    pub fn stop(&self) -> bool {
        let current = {
            let mut running = self.lock_running();
            let Some(current) = running.take() else {
                return false;
            };
            current.stop_tx.send_replace(true);
            if current.handle.thread().id() == std::thread::current().id() {
                tracing::warn!("stop() called from a subscriber callback; not joining");
                *running = Some(current);
                return true;
            }
            current
        };
        // Joined without holding the lock so callbacks can still reach request_stop()/is_running().
        join(current.handle);
        tracing::info!("collection stopped");
        true
    }

    /// Non-blocking stop signal; the loop exits at its next wake point.
    pub fn request_stop(&self) {
        if let Some(current) = self.lock_running().as_ref() {
            current.stop_tx.send_replace(true);
        }
    }

    /// False as soon as a stop was requested, even while the last tick is still finishing.
    pub fn is_running(&self) -> bool {
        self.lock_running().as_ref().is_some_and(Running::is_live)
    }

    pub fn register<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let mut subs = self.lock_subscribers();
        subs.next_id += 1;
        let id = SubscriptionId(subs.next_id);
        subs.list.push(Subscriber {
            id,
            active: Arc::new(AtomicBool::new(true)),
            callback: Arc::new(callback),
        });
        tracing::debug!(subscription = id.0, subscribers = subs.list.len(), "subscriber registered");
        id
    }

    /// Takes effect from the next delivery. A delivery already in progress may still invoke
    /// the callback once, even after this returns.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock_subscribers();
        let Some(pos) = subs.list.iter().position(|s| s.id == id) else {
            return false;
        };
        let removed = subs.list.remove(pos);
        removed.active.store(false, Ordering::SeqCst);
        tracing::debug!(subscription = id.0, subscribers = subs.list.len(), "subscriber removed");
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().list.len()
    }

    /// Last successfully collected snapshot; survives skipped ticks and `stop()`.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest_tx.borrow().clone()
    }

    /// Pull-style subscription to the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.latest_tx.subscribe()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            failed_ticks: self.counters.failed_ticks.load(Ordering::Relaxed),
            callback_panics: self.counters.callback_panics.load(Ordering::Relaxed),
        }
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        // Poisoning only means a panic elsewhere while holding the guard; the Option is still valid.
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Waits for a stopped loop. From its own thread (start() inside a callback) the handle is
/// detached instead; the loop exits once the callback returns and the tick gate keeps it from
/// overlapping the new one.
fn reap(old: Running) {
    old.stop_tx.send_replace(true);
    if old.handle.thread().id() == std::thread::current().id() {
        tracing::debug!("restarted from a subscriber callback; old loop detached");
        return;
    }
    join(old.handle);
}

fn join(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("scheduler thread panicked");
    }
}

struct LoopContext {
    probe: Arc<dyn SystemProbe>,
    subscribers: Arc<Mutex<Subscribers>>,
    latest_tx: watch::Sender<Option<Arc<Snapshot>>>,
    counters: Arc<Counters>,
    sequence: Arc<AtomicU64>,
    /// Held for a whole pass, so a thread still winding down after stop() never overlaps
    /// with one started right after.
    tick_gate: Arc<Mutex<()>>,
    period: Duration,
    process_limit: usize,
    stats_log_interval: Duration,
}

async fn run_loop(ctx: LoopContext, mut stop_rx: watch::Receiver<bool>) {
    let mut stats_log_tick = interval(ctx.stats_log_interval);
    stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of an interval completes immediately; skip it so stats come after a period.
    stats_log_tick.tick().await;

    'ticks: loop {
        if *stop_rx.borrow_and_update() {
            break;
        }
        let started = Instant::now();
        run_tick(&ctx);

        // Sleep only for what is left of the period so slow passes do not accumulate drift.
        let sleep = tokio::time::sleep(ctx.period.saturating_sub(started.elapsed()));
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow_and_update() {
                        break 'ticks;
                    }
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        ticks = ctx.counters.ticks.load(Ordering::Relaxed),
                        failed_ticks = ctx.counters.failed_ticks.load(Ordering::Relaxed),
                        subscribers = ctx.subscribers.lock().map(|s| s.list.len()).unwrap_or(0),
                        "collector stats"
                    );
                }
            }
        }
    }
    tracing::debug!("Scheduler loop exiting");
}

fn run_tick(ctx: &LoopContext) {
    let _pass = ctx.tick_gate.lock().unwrap_or_else(|e| e.into_inner());
    let sequence = ctx.sequence.load(Ordering::Relaxed) + 1;
    let snapshot = match collect_snapshot(ctx.probe.as_ref(), sequence, ctx.process_limit) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            ctx.counters.failed_ticks.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                error = %e,
                operation = "collect_snapshot",
                "tick skipped"
            );
            return;
        }
    };
    ctx.sequence.store(sequence, Ordering::Relaxed);
    ctx.counters.ticks.fetch_add(1, Ordering::Relaxed);
    ctx.latest_tx.send_replace(Some(snapshot.clone()));

    let delivery = match ctx.subscribers.lock() {
        Ok(subs) => subs.delivery_list(),
        Err(e) => e.into_inner().delivery_list(),
    };
    for (active, callback) in delivery {
        if !active.load(Ordering::SeqCst) {
            continue;
        }
        if catch_unwind(AssertUnwindSafe(|| callback(snapshot.as_ref()))).is_err() {
            ctx.counters.callback_panics.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                operation = "deliver_snapshot",
                sequence,
                "subscriber callback panicked"
            );
        }
    }
}
