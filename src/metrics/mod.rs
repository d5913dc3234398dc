//! Metric categories collected over the capture window.
//!
//! Each category owns a background sampling thread and its own accumulator
//! table; the orchestrator composes them as a list of trait objects and
//! drives the shared start / stop / save lifecycle.

use std::time::Duration;

use crate::report::ReportGenerator;

#[cfg(feature = "cpu-idle")]
pub mod cpu_idle;
pub mod memory_metric;
pub mod process_metric;

#[cfg(feature = "cpu-idle")]
pub use cpu_idle::CpuIdleMetric;
pub use memory_metric::MemoryMetric;
pub use process_metric::ProcessMetric;

/// A category of metrics - per-process memory, system memory, etc.
pub trait Metric {
    /// Start collecting data every `interval` and accumulate the results in
    /// memory. Spawns a dedicated thread and returns immediately.
    fn start_collection(&mut self, interval: Duration);

    /// Stop any running data collection. Synchronous: by the time this
    /// returns the collection thread has been joined and no further
    /// sampling is in progress. A no-op when collection never started.
    fn stop_collection(&mut self);

    /// Fold the accumulated results into the report.
    fn save_results(&mut self, report: &mut ReportGenerator);
}
