// Storage / disk models

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct DiskEntry {
    pub name: String,
    pub mount_point: String,
    pub file_system: String,
    /// Bytes.
    pub total_space: u64,
    /// Bytes.
    pub available_space: u64,
}

impl DiskEntry {
    pub fn used_space(&self) -> u64 {
        self.total_space.saturating_sub(self.available_space)
    }
}
