use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub processes: ProcessesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Collection interval used by `start_default` and the binary.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// How often the scheduler logs tick counters at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            stats_log_interval_secs: default_stats_log_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Counter history older than this is discarded and rates bootstrap from zero again.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
    /// Rates above this are treated as counter wraparound and reported as 0.
    #[serde(default = "default_max_bytes_per_sec")]
    pub max_bytes_per_sec: f64,
}

fn default_stale_after_ms() -> u64 {
    2000
}

fn default_max_bytes_per_sec() -> f64 {
    crate::rate::DEFAULT_MAX_BYTES_PER_SEC
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: default_stale_after_ms(),
            max_bytes_per_sec: default_max_bytes_per_sec(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessesConfig {
    /// Keep only the N busiest processes per snapshot; 0 keeps all.
    #[serde(default)]
    pub limit: usize,
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (default `config.toml`). A missing default file means defaults;
    /// an explicitly named file that is missing is an error.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::load_from_path(&path),
            Err(_) if std::path::Path::new("config.toml").exists() => {
                Self::load_from_path("config.toml")
            }
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &str) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.monitoring.interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.network.stale_after_ms)
    }

    /// How often the binary samples network counters. Half the stale threshold at most, so
    /// consecutive samples always yield a rate.
    pub fn network_poll_interval(&self) -> Duration {
        (self.stale_after() / 2)
            .min(self.interval())
            .max(Duration::from_millis(1))
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.monitoring.interval_ms > 0,
            "monitoring.interval_ms must be > 0, got {}",
            self.monitoring.interval_ms
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.network.stale_after_ms > 0,
            "network.stale_after_ms must be > 0, got {}",
            self.network.stale_after_ms
        );
        anyhow::ensure!(
            self.network.max_bytes_per_sec.is_finite() && self.network.max_bytes_per_sec > 0.0,
            "network.max_bytes_per_sec must be a positive number, got {}",
            self.network.max_bytes_per_sec
        );
        Ok(())
    }
}
