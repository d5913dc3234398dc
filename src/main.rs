//! memcap entry point: wire configuration, run the capture, write the report.

use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};

use memcap::cli::{Args, LogLevel};
use memcap::config::{resolve_config, validate_config};
use memcap::groups::GroupManager;
use memcap::metadata::Metadata;
#[cfg(feature = "cpu-idle")]
use memcap::metrics::CpuIdleMetric;
use memcap::metrics::{MemoryMetric, Metric, ProcessMetric};
use memcap::report::ReportGenerator;
use memcap::shutdown::ShutdownToken;
use memcap::system::meminfo::MemInfo;
use memcap::system::zram;

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = resolve_config(&args)?;

    if args.check_config {
        if let Err(e) = validate_config(&config) {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
        println!("Configuration is valid");
        return Ok(());
    }

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration invalid: {}", e);
        std::process::exit(1);
    }

    setup_logging(&args);

    // Lower our priority to avoid getting in the way of the workloads we
    // are measuring
    if unsafe { libc::nice(10) } < 0 {
        warn!("Failed to set nice value");
    }

    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create directory {} to save results in",
            config.output_dir.display()
        )
    })?;

    info!(
        "** About to start memory capture for {} seconds **",
        config.duration.as_secs()
    );
    info!("Will save report to {}", config.output_dir.display());

    // Groups are optional; a present-but-broken groups file is fatal before
    // any sampling begins
    let groups = match &config.groups_file {
        Some(path) => {
            info!("Loading groups from {}", path.display());
            Some(GroupManager::load(path)?)
        }
        None => None,
    };

    let meminfo = MemInfo::read(Path::new("/proc/meminfo"));
    let compression_ratio = if meminfo.swap_enabled() {
        zram::compression_ratio(Path::new("/sys/block"), meminfo.swap_used_kb())
    } else {
        0.0
    };

    let metadata = Metadata::collect(meminfo.swap_enabled());
    let mut report = ReportGenerator::new(metadata, groups);

    // Create all our metrics
    let mut metrics: Vec<Box<dyn Metric>> = vec![
        Box::new(ProcessMetric::new("/proc", compression_ratio, config.dedup)),
        Box::new(MemoryMetric::new(config.platform, "/proc")),
    ];
    #[cfg(feature = "cpu-idle")]
    metrics.push(Box::new(CpuIdleMetric::new()));

    let shutdown = ShutdownToken::install();
    let start = Instant::now();

    for metric in &mut metrics {
        metric.start_collection(config.interval);
    }

    // Block for the capture duration or until SIGINT/SIGTERM
    let cancelled = shutdown.wait(config.duration);
    if cancelled {
        info!("Termination requested. Stopping and saving report!");
    } else {
        info!(
            "Stopping after {} seconds - completed full capture",
            config.duration.as_secs()
        );
    }

    report.metadata_mut().set_duration(start.elapsed().as_secs());

    // Done! Stop data collection, then fold the results into the report
    for metric in &mut metrics {
        metric.stop_collection();
    }
    for metric in &mut metrics {
        metric.save_results(&mut report);
    }

    let report_path = report.write(&config.output_dir)?;
    info!("Saved report to {}", report_path.display());

    if config.json_stdout {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    }

    Ok(())
}
