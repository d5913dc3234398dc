//! Optional CPU idle metric: per-core idle residency over the capture
//! window, derived from /proc/stat counter deltas between start and stop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{error, info};

use crate::measurement::Measurement;
use crate::metrics::Metric;
use crate::report::{ReportGenerator, ReportItem};
use crate::system::stat::{idle_ratio, read_cpu_stats, CpuStat};

/// Snapshots CPU counters at the window edges; no periodic sampling thread.
pub struct CpuIdleMetric {
    stat_path: PathBuf,
    start: Option<HashMap<String, CpuStat>>,
    end: Option<HashMap<String, CpuStat>>,
}

impl CpuIdleMetric {
    pub fn new() -> Self {
        Self::with_stat_path("/proc/stat")
    }

    pub fn with_stat_path(stat_path: impl Into<PathBuf>) -> Self {
        Self {
            stat_path: stat_path.into(),
            start: None,
            end: None,
        }
    }
}

impl Default for CpuIdleMetric {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for CpuIdleMetric {
    fn start_collection(&mut self, _interval: Duration) {
        info!("Starting CPU idle metric collection");

        match read_cpu_stats(Path::new(&self.stat_path)) {
            Ok(stats) => self.start = Some(stats),
            Err(e) => error!("Failed to read CPU counters: {}", e),
        }
    }

    fn stop_collection(&mut self) {
        info!("Stopping CPU idle metric collection");

        match read_cpu_stats(Path::new(&self.stat_path)) {
            Ok(stats) => self.end = Some(stats),
            Err(e) => error!("Failed to read CPU counters: {}", e),
        }
    }

    fn save_results(&mut self, report: &mut ReportGenerator) {
        let (start, end) = match (&self.start, &self.end) {
            (Some(start), Some(end)) => (start, end),
            _ => return,
        };

        let mut cpu_names: Vec<&String> = end.keys().collect();
        cpu_names.sort();

        let mut rows = Vec::new();
        for name in cpu_names {
            let (before, after) = match (start.get(name), end.get(name)) {
                (Some(b), Some(a)) => (b, a),
                _ => continue,
            };

            if let Some(ratio) = idle_ratio(before, after) {
                let mut idle = Measurement::new("Idle %");
                idle.add_data_point(ratio * 100.0);

                rows.push(vec![
                    ReportItem::label("CPU", name.as_str()),
                    ReportItem::metric(idle),
                ]);
            }
        }

        report.add_dataset("CPU Idle", &rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Metadata;

    #[test]
    fn test_idle_metric_over_synthetic_window() {
        let dir = tempfile::tempdir().unwrap();
        let stat = dir.path().join("stat");

        std::fs::write(&stat, "cpu  100 0 0 900 0 0 0 0\ncpu0 100 0 0 900 0 0 0 0\n").unwrap();
        let mut metric = CpuIdleMetric::with_stat_path(&stat);
        metric.start_collection(Duration::from_secs(3));

        std::fs::write(&stat, "cpu  200 0 0 1700 0 0 0 0\ncpu0 200 0 0 1700 0 0 0 0\n").unwrap();
        metric.stop_collection();

        let mut report = ReportGenerator::new(Metadata::collect(false), None);
        metric.save_results(&mut report);

        let doc = report.to_json();
        let dataset = &doc["data"][0];
        assert_eq!(dataset["name"], "CPU Idle");
        let data = dataset["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        // 800 of 900 jiffies idle -> 89%
        assert_eq!(data[0]["CPU"], "cpu");
        assert_eq!(data[0]["Idle %"]["Average"], 89);
    }

    #[test]
    fn test_idle_metric_without_snapshots_emits_nothing() {
        let mut metric = CpuIdleMetric::with_stat_path("/nonexistent/stat");
        let mut report = ReportGenerator::new(Metadata::collect(false), None);
        metric.save_results(&mut report);

        assert_eq!(report.to_json()["data"].as_array().unwrap().len(), 0);
    }
}
