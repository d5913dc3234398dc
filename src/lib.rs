//! memcap - windowed memory-usage capture for embedded Linux set-top boxes.
//!
//! Samples per-process memory counters (PSS/RSS/USS/VSS, swap, locked) from
//! /proc/<pid>/smaps_rollup plus a set of platform-gated system-wide sources
//! (meminfo, CMA regions, GPU allocations, containers, DDR bandwidth, BMEM,
//! buddy-allocator fragmentation) over a fixed capture window, folds every
//! reading into running min/max/average measurements, and emits a JSON
//! report.
//!
//! # Structure
//!
//! - [`measurement`]: the running-average accumulator everything folds into
//! - [`process`]: PID enumeration, cached process snapshots, smaps sampling
//! - [`metrics`]: the metric categories and their sampling threads
//! - [`groups`]: user-declared process/container grouping for the report
//! - [`report`]: JSON report assembly
//! - [`config`], [`cli`]: capture configuration
//!
//! Sampling is best-effort by design: processes die between enumeration and
//! sampling all the time, and the capture must survive a multi-minute window
//! of arbitrary per-process read failures without terminating early.

pub mod cli;
pub mod config;
pub mod groups;
pub mod measurement;
pub mod metadata;
pub mod metrics;
pub mod platform;
pub mod process;
pub mod report;
pub mod shutdown;
pub mod system;

pub use config::{resolve_config, validate_config, CaptureConfig};
pub use groups::{GroupKind, GroupManager};
pub use measurement::Measurement;
pub use metadata::Metadata;
pub use metrics::{MemoryMetric, Metric, ProcessMetric};
pub use platform::Platform;
pub use process::{MemorySample, ProcessSnapshot};
pub use report::{ReportGenerator, ReportItem};
pub use shutdown::ShutdownToken;
