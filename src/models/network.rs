// Network interface models

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceEntry {
    pub name: String,
    /// First IPv4 address of the interface, empty when it has none.
    pub ipv4: String,
    pub mac_address: String,
    /// Cumulative since boot.
    pub bytes_sent: u64,
    /// Cumulative since boot.
    pub bytes_received: u64,
    /// Bytes per second; 0 until a rate has been computed.
    #[serde(default)]
    pub send_speed: f64,
    #[serde(default)]
    pub recv_speed: f64,
}
