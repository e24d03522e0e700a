// Cumulative byte counters -> per-second rates, keyed by interface name.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::NetworkInterfaceEntry;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(2);
/// 1 GB/s. Anything above is treated as a counter wraparound artifact.
pub const DEFAULT_MAX_BYTES_PER_SEC: f64 = 1e9;

#[derive(Debug, Clone, Copy)]
struct Sample {
    sent: u64,
    received: u64,
    at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rate {
    pub send: f64,
    pub recv: f64,
}

#[derive(Debug)]
pub struct RateCalculator {
    samples: HashMap<String, Sample>,
    last_update: Option<Instant>,
    stale_after: Duration,
    max_bytes_per_sec: f64,
}

impl Default for RateCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER, DEFAULT_MAX_BYTES_PER_SEC)
    }
}

impl RateCalculator {
    pub fn new(stale_after: Duration, max_bytes_per_sec: f64) -> Self {
        Self {
            samples: HashMap::new(),
            last_update: None,
            stale_after,
            max_bytes_per_sec,
        }
    }

    /// Feed one counter sample for `name` and get the rate since the previous one.
    pub fn sample(&mut self, name: &str, sent: u64, received: u64, at: Instant) -> Rate {
        self.expire_if_stale(at);
        self.last_update = Some(at);
        self.record(name, sent, received, at)
    }

    /// Fills `send_speed` / `recv_speed` for a whole probe result taken at `at`.
    /// Interfaces missing from `entries` are forgotten.
    pub fn apply(&mut self, entries: &mut [NetworkInterfaceEntry], at: Instant) {
        self.expire_if_stale(at);
        self.last_update = Some(at);
        self.samples
            .retain(|name, _| entries.iter().any(|e| &e.name == name));
        for entry in entries.iter_mut() {
            let rate = self.record(&entry.name, entry.bytes_sent, entry.bytes_received, at);
            entry.send_speed = rate.send;
            entry.recv_speed = rate.recv;
        }
    }

    pub fn tracked(&self) -> usize {
        self.samples.len()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_update = None;
    }

    fn expire_if_stale(&mut self, at: Instant) {
        if let Some(prev) = self.last_update {
            // `checked_duration_since` is None when the clock went backwards; keep history then.
            if at
                .checked_duration_since(prev)
                .is_some_and(|gap| gap > self.stale_after)
            {
                tracing::debug!(
                    operation = "rate_expire",
                    tracked = self.samples.len(),
                    "counter history stale, bootstrapping again"
                );
                self.samples.clear();
            }
        }
    }

    fn record(&mut self, name: &str, sent: u64, received: u64, at: Instant) -> Rate {
        let rate = match self.samples.get(name) {
            None => Rate::default(),
            Some(prev) => {
                let dt = at
                    .checked_duration_since(prev.at)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0);
                if dt > 0.0 {
                    Rate {
                        send: self.per_second(prev.sent, sent, dt),
                        recv: self.per_second(prev.received, received, dt),
                    }
                } else {
                    Rate::default()
                }
            }
        };
        // Stored even when clamped so a wrapped counter heals on the next sample.
        self.samples.insert(name.to_string(), Sample { sent, received, at });
        rate
    }

    fn per_second(&self, prev: u64, current: u64, dt: f64) -> f64 {
        if current < prev {
            return 0.0;
        }
        let rate = (current - prev) as f64 / dt;
        if rate > self.max_bytes_per_sec { 0.0 } else { rate }
    }
}
