// Graphics adapter model

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

/// One graphics adapter. Discrete NVIDIA cards report memory and temperature through
/// `nvidia-smi`; integrated adapters only have a model name, so the numbers stay 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct GpuEntry {
    pub model: String,
    pub integrated: bool,
    /// Bytes.
    pub memory_total: u64,
    pub memory_used: u64,
    pub memory_free: u64,
    /// Degrees Celsius, 0 when unknown.
    pub temperature_celsius: f32,
}

impl GpuEntry {
    pub fn integrated(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            integrated: true,
            memory_total: 0,
            memory_used: 0,
            memory_free: 0,
            temperature_celsius: 0.0,
        }
    }

    pub fn memory_usage_percent(&self) -> f64 {
        if self.memory_total > 0 {
            (self.memory_used as f64 / self.memory_total as f64) * 100.0
        } else {
            0.0
        }
    }
}
