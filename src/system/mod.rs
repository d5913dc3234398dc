//! System-wide readings from /proc and /sys.

pub mod meminfo;
#[cfg(feature = "cpu-idle")]
pub mod stat;
pub mod zram;

pub use meminfo::MemInfo;
