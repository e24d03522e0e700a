// Data contract: value records exchanged with consumers

mod gpu;
mod network;
mod process;
mod storage;
mod system;

pub use gpu::GpuEntry;
pub use network::NetworkInterfaceEntry;
pub use process::{ProcessEntry, ServiceEntry, sort_by_cpu_desc};
pub use storage::DiskEntry;
pub use system::{CpuSnapshot, MemorySnapshot, Snapshot};
