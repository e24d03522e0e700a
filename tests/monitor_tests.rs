// Monitor lifecycle: start, deliver, unregister, stop, and the on-demand queries

mod common;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{FakeProbe, interface, test_config, wait_until};
use taskmon::Monitor;
use taskmon::error::MonitorError;

fn monitor_with(probe: Arc<FakeProbe>) -> Monitor {
    Monitor::with_probe(probe, test_config())
}

#[test]
fn subscriber_receives_snapshot_within_two_intervals() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    let received = Arc::new(AtomicU64::new(0));
    let r = received.clone();
    monitor.register(move |s| {
        r.store(s.sequence, Ordering::SeqCst);
    });

    assert!(monitor.start(0.1).unwrap());
    assert!(wait_until(Duration::from_millis(200), || {
        received.load(Ordering::SeqCst) > 0
    }));
    assert!(monitor.stop());
    assert!(monitor.latest().is_some());
}

#[test]
fn start_is_idempotent() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    assert!(monitor.start(0.05).unwrap());
    assert!(!monitor.start(0.05).unwrap());
    assert!(monitor.is_running());
    assert!(monitor.stop());
    assert!(!monitor.is_running());
    assert!(!monitor.stop());
}

#[test]
fn invalid_intervals_are_rejected() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let err = monitor.start(bad).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidArgument(_)), "{bad}");
    }
    assert!(!monitor.is_running());
}

#[test]
fn no_callback_after_stop_returns() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    monitor.register(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    monitor.start(0.01).unwrap();
    assert!(wait_until(Duration::from_secs(1), || calls.load(Ordering::SeqCst) >= 2));
    monitor.stop();

    let after_stop = calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(calls.load(Ordering::SeqCst), after_stop);
}

#[test]
fn unregistered_callback_receives_nothing_more() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let id = monitor.register(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    monitor.start(0.01).unwrap();
    assert!(wait_until(Duration::from_secs(1), || calls.load(Ordering::SeqCst) >= 1));

    assert!(monitor.unregister(id));
    let at_unregister = calls.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(60));
    monitor.stop();
    // At most one delivery that was already running when unregister returned.
    assert!(calls.load(Ordering::SeqCst) <= at_unregister + 1);
    assert!(!monitor.unregister(id));
    assert_eq!(monitor.subscriber_count(), 0);
}

#[test]
fn delivery_follows_registration_order() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let o = order.clone();
        monitor.register(move |s| {
            if s.sequence == 1 {
                o.lock().unwrap().push(tag);
            }
        });
    }
    monitor.start(0.02).unwrap();
    assert!(wait_until(Duration::from_secs(1), || order.lock().unwrap().len() == 3));
    monitor.stop();
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn failed_ticks_are_skipped_and_collection_continues() {
    let probe = Arc::new(FakeProbe::default());
    probe.fail_memory.store(true, Ordering::SeqCst);
    let monitor = monitor_with(probe.clone());
    let delivered = Arc::new(AtomicUsize::new(0));
    let d = delivered.clone();
    monitor.register(move |_| {
        d.fetch_add(1, Ordering::SeqCst);
    });

    monitor.start(0.01).unwrap();
    assert!(wait_until(Duration::from_secs(1), || monitor.stats().failed_ticks >= 2));
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
    assert!(monitor.latest().is_none());

    probe.fail_memory.store(false, Ordering::SeqCst);
    assert!(wait_until(Duration::from_secs(1), || delivered.load(Ordering::SeqCst) >= 1));
    monitor.stop();
    assert!(monitor.stats().ticks >= 1);
}

#[test]
fn panicking_callback_does_not_stop_the_loop() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    monitor.register(|_| panic!("subscriber bug"));
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    monitor.register(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    monitor.start(0.01).unwrap();
    assert!(wait_until(Duration::from_secs(1), || calls.load(Ordering::SeqCst) >= 3));
    monitor.stop();
    assert!(monitor.stats().callback_panics >= 3);
}

#[test]
fn request_stop_from_callback_ends_the_loop() {
    let monitor = Arc::new(monitor_with(Arc::new(FakeProbe::default())));
    let weak = Arc::downgrade(&monitor);
    monitor.register(move |_| {
        if let Some(m) = weak.upgrade() {
            m.request_stop();
        }
    });
    monitor.start(0.01).unwrap();
    assert!(wait_until(Duration::from_secs(1), || !monitor.is_running()));
    // The exited thread is reaped on restart.
    assert!(monitor.start(0.01).unwrap());
    monitor.stop();
}

#[test]
fn start_during_last_tick_after_request_stop_restarts() {
    let monitor = Arc::new(monitor_with(Arc::new(FakeProbe::default())));
    let weak = Arc::downgrade(&monitor);
    let stopped_once = Arc::new(AtomicBool::new(false));
    let in_last_tick = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));
    let (s, t, c) = (stopped_once.clone(), in_last_tick.clone(), calls.clone());
    monitor.register(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        if !s.swap(true, Ordering::SeqCst) {
            if let Some(m) = weak.upgrade() {
                m.request_stop();
            }
            t.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(100));
        }
    });

    monitor.start(0.01).unwrap();
    assert!(wait_until(Duration::from_secs(1), || in_last_tick.load(Ordering::SeqCst)));
    assert!(!monitor.is_running());
    // The old thread is still inside the callback here.
    assert!(monitor.start(0.01).unwrap());
    assert!(monitor.is_running());

    let restarted_at = calls.load(Ordering::SeqCst);
    assert!(wait_until(Duration::from_secs(1), || {
        calls.load(Ordering::SeqCst) >= restarted_at + 3
    }));
    assert!(monitor.stop());
}

#[test]
fn stop_from_callback_returns_and_allows_restart() {
    let monitor = Arc::new(monitor_with(Arc::new(FakeProbe::default())));
    let weak = Arc::downgrade(&monitor);
    let stopped_once = Arc::new(AtomicBool::new(false));
    let stop_returned = Arc::new(AtomicBool::new(false));
    let calls = Arc::new(AtomicUsize::new(0));
    let (s, r, c) = (stopped_once.clone(), stop_returned.clone(), calls.clone());
    monitor.register(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        if !s.swap(true, Ordering::SeqCst) {
            if let Some(m) = weak.upgrade() {
                r.store(m.stop(), Ordering::SeqCst);
            }
        }
    });

    monitor.start(0.01).unwrap();
    // A self-join would hang the callback and this never flips.
    assert!(wait_until(Duration::from_secs(1), || stop_returned.load(Ordering::SeqCst)));
    assert!(wait_until(Duration::from_secs(1), || !monitor.is_running()));

    let before_restart = calls.load(Ordering::SeqCst);
    assert!(monitor.start(0.01).unwrap());
    assert!(wait_until(Duration::from_secs(1), || {
        calls.load(Ordering::SeqCst) >= before_restart + 2
    }));
    assert!(monitor.stop());
    assert!(!monitor.is_running());
}

#[test]
fn slow_collection_does_not_stretch_the_period() {
    let probe = Arc::new(FakeProbe::default());
    *probe.cpu_delay.lock().unwrap() = Duration::from_millis(60);
    let monitor = monitor_with(probe);
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let s = stamps.clone();
    monitor.register(move |snap| s.lock().unwrap().push(snap.timestamp_ms));

    monitor.start(0.1).unwrap();
    assert!(wait_until(Duration::from_secs(3), || stamps.lock().unwrap().len() >= 6));
    monitor.stop();

    let stamps = stamps.lock().unwrap();
    let gaps: Vec<u64> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
    let mean = gaps.iter().sum::<u64>() as f64 / gaps.len() as f64;
    // 100 ms period; without compensation every gap would be 160 ms.
    assert!((80.0..140.0).contains(&mean), "mean gap {mean} ms from {gaps:?}");
}

#[test]
fn sequence_increases_across_ticks() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    monitor.register(move |snap| s.lock().unwrap().push(snap.sequence));
    monitor.start(0.01).unwrap();
    assert!(wait_until(Duration::from_secs(1), || seen.lock().unwrap().len() >= 3));
    monitor.stop();
    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn watch_receiver_sees_published_snapshots() {
    let monitor = monitor_with(Arc::new(FakeProbe::default()));
    let mut rx = monitor.watch();
    monitor.start(0.02).unwrap();
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("timed out")
        .expect("sender alive");
    assert!(rx.borrow().is_some());
    tokio::task::spawn_blocking(move || monitor.stop())
        .await
        .unwrap();
}

#[test]
fn network_info_reports_rates_between_calls() {
    let probe = Arc::new(FakeProbe::default());
    *probe.networks.lock().unwrap() = vec![interface("eth0", 100, 200)];
    let monitor = monitor_with(probe.clone());

    let first = monitor.network_info();
    assert_eq!(first[0].send_speed, 0.0);
    assert_eq!(first[0].recv_speed, 0.0);

    std::thread::sleep(Duration::from_millis(100));
    *probe.networks.lock().unwrap() = vec![interface("eth0", 1100, 2200)];
    let second = monitor.network_info();
    assert!(second[0].send_speed > 0.0);
    assert!(second[0].recv_speed > second[0].send_speed);
}

#[test]
fn network_counter_decrease_reports_zero() {
    let probe = Arc::new(FakeProbe::default());
    *probe.networks.lock().unwrap() = vec![interface("eth0", 5000, 5000)];
    let monitor = monitor_with(probe.clone());
    monitor.network_info();
    std::thread::sleep(Duration::from_millis(20));
    *probe.networks.lock().unwrap() = vec![interface("eth0", 10, 10)];
    let rates = monitor.network_info();
    assert_eq!(rates[0].send_speed, 0.0);
    assert_eq!(rates[0].recv_speed, 0.0);
}

#[test]
fn on_demand_failures_degrade_to_empty_lists() {
    let probe = Arc::new(FakeProbe::default());
    let monitor = monitor_with(probe.clone());
    assert_eq!(monitor.disk_info().len(), 1);
    assert_eq!(monitor.services_info()[0].status, "running");
    assert_eq!(monitor.gpu_info()[0].model, "Intel UHD Graphics 620");

    probe.fail_inventory.store(true, Ordering::SeqCst);
    assert!(monitor.disk_info().is_empty());
    assert!(monitor.network_info().is_empty());
    assert!(monitor.services_info().is_empty());
    assert!(monitor.gpu_info().is_empty());
}

#[test]
fn kill_and_path_report_failure_for_unknown_pids() {
    let probe = Arc::new(FakeProbe::default());
    let monitor = monitor_with(probe.clone());
    assert!(!monitor.kill_process(999_999));
    assert!(monitor.process_path(999_999).is_none());

    assert!(monitor.kill_process(200));
    assert_eq!(*probe.killed.lock().unwrap(), vec![200]);
    assert_eq!(monitor.process_path(300).as_deref(), Some("/usr/bin/compiler"));
}

#[test]
fn collect_once_honors_process_limit() {
    let mut config = test_config();
    config.processes.limit = 1;
    let monitor = Monitor::with_probe(Arc::new(FakeProbe::default()), config);
    let snapshot = monitor.collect_once().unwrap();
    assert_eq!(snapshot.processes.len(), 1);
    assert_eq!(snapshot.processes[0].pid, 300);
}
