//! End-to-end tests for the process sampling cycle against a synthetic
//! proc root.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use memcap::metadata::Metadata;
use memcap::metrics::{Metric, ProcessMetric};
use memcap::report::ReportGenerator;
use serde_json::Value;
use tempfile::TempDir;

/// Create a fake /proc/<pid> entry with a cmdline and an smaps_rollup.
fn add_process(root: &Path, pid: i32, cmdline_nul: &[u8], ppid: i32, pss_kb: u64, rss_kb: u64) {
    let dir = root.join(pid.to_string());
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("cmdline"), cmdline_nul).unwrap();
    fs::write(dir.join("status"), format!("Name:\tx\nPPid:\t{}\n", ppid)).unwrap();
    fs::write(
        dir.join("smaps_rollup"),
        format!(
            "55bc2bd98000-7ffd4dfa5000 ---p 00000000 00:00 0    [rollup]\n\
             Rss:    {} kB\n\
             Pss:    {} kB\n\
             Private_Clean: 10 kB\n\
             Private_Dirty: 20 kB\n\
             Swap:   0 kB\n\
             SwapPss: 0 kB\n\
             Locked: 0 kB\n",
            rss_kb, pss_kb
        ),
    )
    .unwrap();
}

fn capture_report(metric: &mut ProcessMetric) -> Value {
    let mut report = ReportGenerator::new(Metadata::collect(false), None);
    metric.save_results(&mut report);
    report.to_json()
}

#[test]
fn test_capture_lifecycle_and_report_contents() {
    let root = TempDir::new().unwrap();
    add_process(root.path(), 101, b"/usr/bin/burrow\0--daemon\0", 1, 400, 500);
    add_process(root.path(), 102, b"netmon\0", 1, 150, 300);

    let mut metric = ProcessMetric::new(root.path(), 0.0, true);
    metric.start_collection(Duration::from_millis(25));
    thread::sleep(Duration::from_millis(90));
    metric.stop_collection();

    let doc = capture_report(&mut metric);
    let processes = doc["processes"].as_array().unwrap();
    assert_eq!(processes.len(), 2);

    // Sorted by average PSS descending
    assert_eq!(processes[0]["pid"], 101);
    assert_eq!(processes[0]["name"], "/usr/bin/burrow");
    assert_eq!(processes[0]["cmdline"], "/usr/bin/burrow --daemon");
    assert_eq!(processes[0]["ppid"], 1);
    assert_eq!(processes[1]["pid"], 102);

    // Constant synthetic values: min == max == average regardless of how
    // many cycles ran
    assert_eq!(processes[0]["pss"]["min"], 400);
    assert_eq!(processes[0]["pss"]["max"], 400);
    assert_eq!(processes[0]["pss"]["average"], 400);
    assert_eq!(processes[0]["rss"]["average"], 500);
    assert_eq!(processes[0]["uss"]["average"], 30);

    // Grand total carries the PSS averages (in MB)
    let expected_mb = (400.0 + 150.0) / 1024.0;
    let calculated = doc["grandTotal"]["calculatedUsage"].as_f64().unwrap();
    assert!((calculated - expected_mb).abs() < 1e-9);
}

#[test]
fn test_process_death_is_observed() {
    let root = TempDir::new().unwrap();
    add_process(root.path(), 201, b"stable\0", 1, 100, 100);
    add_process(root.path(), 202, b"shortlived\0", 1, 50, 50);

    let mut metric = ProcessMetric::new(root.path(), 0.0, true);
    metric.start_collection(Duration::from_millis(25));
    thread::sleep(Duration::from_millis(60));

    // The short-lived process exits mid-capture
    fs::remove_dir_all(root.path().join("202")).unwrap();
    thread::sleep(Duration::from_millis(60));

    metric.stop_collection();

    let doc = capture_report(&mut metric);
    let processes = doc["processes"].as_array().unwrap();

    // Both identities remain in the table; death does not evict an entry
    assert_eq!(processes.len(), 2);

    // The stable process kept accumulating after the other died
    let stable = processes
        .iter()
        .find(|p| p["pid"] == 201)
        .expect("stable process present");
    assert!(stable["pss"]["average"] == 100);
}

#[test]
fn test_stop_without_start_returns_immediately() {
    let root = TempDir::new().unwrap();
    let mut metric = ProcessMetric::new(root.path(), 0.0, true);

    // Nothing was started; this must not block or panic
    metric.stop_collection();

    let doc = capture_report(&mut metric);
    assert_eq!(doc["processes"].as_array().unwrap().len(), 0);
}

#[test]
fn test_stop_is_idempotent() {
    let root = TempDir::new().unwrap();
    add_process(root.path(), 301, b"app\0", 1, 10, 10);

    let mut metric = ProcessMetric::new(root.path(), 0.0, true);
    metric.start_collection(Duration::from_millis(25));
    thread::sleep(Duration::from_millis(40));
    metric.stop_collection();
    metric.stop_collection();

    let doc = capture_report(&mut metric);
    assert_eq!(doc["processes"].as_array().unwrap().len(), 1);
}

#[test]
fn test_compression_ratio_applied_to_swap() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("401");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("cmdline"), b"swapper-heavy\0").unwrap();
    fs::write(dir.join("status"), "Name:\tx\nPPid:\t1\n").unwrap();
    fs::write(
        dir.join("smaps_rollup"),
        "Rss: 100 kB\nPss: 100 kB\nSwap: 240 kB\nSwapPss: 200 kB\n",
    )
    .unwrap();

    let mut metric = ProcessMetric::new(root.path(), 0.25, true);
    metric.start_collection(Duration::from_millis(25));
    thread::sleep(Duration::from_millis(40));
    metric.stop_collection();

    let doc = capture_report(&mut metric);
    let process = &doc["processes"][0];
    assert_eq!(process["swap"]["average"], 240);
    assert_eq!(process["swapPss"]["average"], 200);
    // 200 kB of SwapPss at a 0.25 compression ratio costs 50 kB of RAM
    assert_eq!(process["swapZram"]["average"], 50);
}
