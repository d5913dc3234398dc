//! JSON report assembly.
//!
//! Collectors hand their aggregated measurements over as datasets of rows;
//! a row is an ordered list of [`ReportItem`]s, either a plain label column
//! or a min/max/average measurement. The explicit `_columnOrder` array keeps
//! column ordering stable for consumers even though JSON objects are
//! unordered.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

use crate::groups::GroupManager;
use crate::measurement::Measurement;
use crate::metadata::Metadata;
use crate::metrics::process_metric::ProcessMeasurement;

/// One cell of a report row: a string label or an aggregated measurement.
#[derive(Debug, Clone)]
pub enum ReportItem {
    Label { column: String, value: String },
    Metric(Measurement),
}

impl ReportItem {
    pub fn label(column: impl Into<String>, value: impl Into<String>) -> Self {
        ReportItem::Label {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn metric(measurement: Measurement) -> Self {
        ReportItem::Metric(measurement)
    }
}

/// Accumulates datasets, per-process records and grand totals into the
/// final report document.
pub struct ReportGenerator {
    metadata: Metadata,
    groups: Option<GroupManager>,
    json: Value,
}

impl ReportGenerator {
    pub fn new(metadata: Metadata, groups: Option<GroupManager>) -> Self {
        Self {
            metadata,
            groups,
            json: json!({
                "processes": [],
                "data": [],
                "metadata": {},
                "grandTotal": {
                    "linuxUsage": 0.0,
                    "calculatedUsage": 0.0,
                },
            }),
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn groups(&self) -> Option<&GroupManager> {
        self.groups.as_ref()
    }

    /// Add a named dataset. Empty datasets are dropped silently.
    pub fn add_dataset(&mut self, name: &str, rows: &[Vec<ReportItem>]) {
        if rows.is_empty() {
            return;
        }

        let mut data = Vec::with_capacity(rows.len());
        let mut column_order = Vec::new();

        for (row_idx, row) in rows.iter().enumerate() {
            let mut record = Map::new();

            for item in row {
                match item {
                    ReportItem::Label { column, value } => {
                        record.insert(column.clone(), Value::String(value.clone()));

                        if row_idx == 0 {
                            column_order.push(Value::String(column.clone()));
                        }
                    }
                    ReportItem::Metric(m) => {
                        record.insert(
                            m.name().to_string(),
                            json!({
                                "Min": m.min_rounded(),
                                "Max": m.max_rounded(),
                                "Average": m.average_rounded(),
                            }),
                        );

                        if row_idx == 0 {
                            column_order.push(Value::String(format!("{} (Min)", m.name())));
                            column_order.push(Value::String(format!("{} (Max)", m.name())));
                            column_order.push(Value::String(format!("{} (Average)", m.name())));
                        }
                    }
                }
            }

            data.push(Value::Object(record));
        }

        let dataset = json!({
            "name": name,
            "data": data,
            "_columnOrder": column_order,
        });

        self.json["data"]
            .as_array_mut()
            .expect("report document has a data array")
            .push(dataset);
    }

    /// Add the per-process records, sorted by average PSS descending, plus
    /// the PSS-per-group breakdown when groups are configured.
    pub fn add_processes(&mut self, mut processes: Vec<ProcessMeasurement>) {
        processes.sort_by_key(|p| std::cmp::Reverse(p.pss.average_rounded()));

        for process in &processes {
            let snapshot = &process.snapshot;

            let group = self
                .groups
                .as_ref()
                .and_then(|gm| snapshot.resolve_group(gm))
                .unwrap_or_default();

            let record = json!({
                "pid": snapshot.pid(),
                "ppid": snapshot.ppid(),
                "name": snapshot.name(),
                "cmdline": snapshot.cmdline(),
                "systemdService": snapshot.systemd_service().unwrap_or(""),
                "container": snapshot.container().unwrap_or(""),
                "group": group,
                "rss": process.rss.to_json(),
                "pss": process.pss.to_json(),
                "uss": process.uss.to_json(),
                "vss": process.vss.to_json(),
                "swap": process.swap.to_json(),
                "swapPss": process.swap_pss.to_json(),
                "swapZram": process.swap_zram.to_json(),
                "locked": process.locked.to_json(),
            });

            self.json["processes"]
                .as_array_mut()
                .expect("report document has a processes array")
                .push(record);
        }

        self.json["pssByGroup"] = match &self.groups {
            Some(gm) => {
                let mut pss_per_group: Vec<(String, f64)> = Vec::new();

                for process in &processes {
                    if let Some(group) = process.snapshot.resolve_group(gm) {
                        match pss_per_group.iter_mut().find(|(g, _)| *g == group) {
                            Some((_, pss)) => *pss += process.pss.average(),
                            None => pss_per_group.push((group, process.pss.average())),
                        }
                    }
                }

                // Sort descending so pie charts built from this render nicely
                pss_per_group
                    .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

                Value::Array(
                    pss_per_group
                        .into_iter()
                        .map(|(group, pss)| {
                            json!({ "groupName": group, "pss": pss.round() as i64 })
                        })
                        .collect(),
                )
            }
            None => Value::Null,
        };
    }

    /// Record the average system "Used" figure, stored in MB.
    pub fn set_average_linux_memory_usage(&mut self, value_kb: i64) {
        self.json["grandTotal"]["linuxUsage"] = json!(value_kb as f64 / 1024.0);
    }

    /// Add to the running total of accounted-for memory, stored in MB.
    pub fn add_to_accumulated_memory_usage(&mut self, value_kb: f64) {
        let usage = self.json["grandTotal"]["calculatedUsage"]
            .as_f64()
            .unwrap_or(0.0);
        self.json["grandTotal"]["calculatedUsage"] = json!(usage + value_kb / 1024.0);
    }

    /// Finalize the document, filling in the metadata block.
    pub fn to_json(&self) -> Value {
        let mut doc = self.json.clone();
        doc["metadata"] = json!({
            "image": self.metadata.image(),
            "platform": self.metadata.platform_name(),
            "mac": self.metadata.mac(),
            "timestamp": self.metadata.report_timestamp(),
            "duration": self.metadata.duration_secs(),
            "swapEnabled": self.metadata.swap_enabled(),
        });
        doc
    }

    /// Write `report.json` into the output directory.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = output_dir.join("report.json");
        let rendered = serde_json::to_string_pretty(&self.to_json())?;
        fs::write(&path, rendered)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::snapshot::ProcessSnapshot;
    use serde_json::json as j;

    fn generator_with_groups(groups: Option<GroupManager>) -> ReportGenerator {
        ReportGenerator::new(Metadata::collect(false), groups)
    }

    fn process_measurement(pid: i32, cmdline: &str, pss_values: &[f64]) -> ProcessMeasurement {
        let snapshot = ProcessSnapshot::from_parts(pid, 1, cmdline, None, None);
        let mut m = ProcessMeasurement::new(snapshot);
        for &v in pss_values {
            m.pss.add_data_point(v);
            m.rss.add_data_point(v * 2.0);
        }
        m
    }

    #[test]
    fn test_dataset_column_order() {
        let mut generator = generator_with_groups(None);

        let mut used = Measurement::new("Used KB");
        used.add_data_point(10.0);
        used.add_data_point(20.0);

        generator.add_dataset(
            "CMA Regions",
            &[vec![
                ReportItem::label("Region", "codec_mm_cma"),
                ReportItem::metric(used),
            ]],
        );

        let doc = generator.to_json();
        let dataset = &doc["data"][0];
        assert_eq!(dataset["name"], "CMA Regions");
        assert_eq!(
            dataset["_columnOrder"],
            j!(["Region", "Used KB (Min)", "Used KB (Max)", "Used KB (Average)"])
        );
        assert_eq!(dataset["data"][0]["Region"], "codec_mm_cma");
        assert_eq!(dataset["data"][0]["Used KB"]["Average"], 15);
    }

    #[test]
    fn test_empty_dataset_is_dropped() {
        let mut generator = generator_with_groups(None);
        generator.add_dataset("Nothing", &[]);
        assert_eq!(generator.to_json()["data"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_processes_sorted_by_average_pss_desc() {
        let mut generator = generator_with_groups(None);

        generator.add_processes(vec![
            process_measurement(10, "small", &[5.0]),
            process_measurement(11, "large", &[500.0]),
            process_measurement(12, "medium", &[50.0]),
        ]);

        let doc = generator.to_json();
        let processes = doc["processes"].as_array().unwrap();
        assert_eq!(processes[0]["name"], "large");
        assert_eq!(processes[1]["name"], "medium");
        assert_eq!(processes[2]["name"], "small");
        assert_eq!(processes[0]["pss"]["average"], 500);
        // No groups configured
        assert_eq!(doc["pssByGroup"], Value::Null);
        assert_eq!(processes[0]["group"], "");
    }

    #[test]
    fn test_pss_by_group_aggregation() {
        let gm = GroupManager::from_json(&j!({
            "processes": [
                { "group": "AV", "processes": ["av-"] },
                { "group": "UI", "processes": ["ui-"] }
            ],
            "containers": []
        }));
        let mut generator = generator_with_groups(Some(gm));

        generator.add_processes(vec![
            process_measurement(1, "av-decoder", &[100.0]),
            process_measurement(2, "av-renderer", &[50.0]),
            process_measurement(3, "ui-shell", &[200.0]),
            process_measurement(4, "misc", &[1000.0]),
        ]);

        let doc = generator.to_json();
        let by_group = doc["pssByGroup"].as_array().unwrap();
        // Ungrouped processes do not appear; UI (200) sorts above AV (150)
        assert_eq!(by_group.len(), 2);
        assert_eq!(by_group[0]["groupName"], "UI");
        assert_eq!(by_group[0]["pss"], 200);
        assert_eq!(by_group[1]["groupName"], "AV");
        assert_eq!(by_group[1]["pss"], 150);
    }

    #[test]
    fn test_grand_totals_are_megabytes() {
        let mut generator = generator_with_groups(None);

        generator.set_average_linux_memory_usage(2048);
        generator.add_to_accumulated_memory_usage(1024.0);
        generator.add_to_accumulated_memory_usage(512.0);

        let doc = generator.to_json();
        assert_eq!(doc["grandTotal"]["linuxUsage"], 2.0);
        assert_eq!(doc["grandTotal"]["calculatedUsage"], 1.5);
    }

    #[test]
    fn test_write_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let generator = generator_with_groups(None);

        let path = generator.write(dir.path()).unwrap();
        assert!(path.ends_with("report.json"));

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(written["metadata"]["timestamp"].is_string());
        assert_eq!(written["grandTotal"]["calculatedUsage"], 0.0);
    }
}
