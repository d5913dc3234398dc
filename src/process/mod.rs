//! Per-process observation: PID enumeration, cached snapshots and memory
//! sampling from the /proc filesystem.

pub mod memory;
pub mod scanner;
pub mod snapshot;

pub use memory::{sample_process, MemorySample};
pub use scanner::{collect_pids, process_exists};
pub use snapshot::ProcessSnapshot;
