// Library for the binary, the C boundary and tests

pub mod aggregator;
pub mod codec;
pub mod config;
pub mod error;
pub mod ffi;
pub mod models;
pub mod monitor;
pub mod probe;
pub mod rate;
pub mod sysinfo_repo;
pub mod version;
pub mod worker;

pub use error::{MonitorError, ProbeKind, Result};
pub use monitor::Monitor;
pub use probe::SystemProbe;
pub use worker::{SchedulerStats, SubscriptionId};
