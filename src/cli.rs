//! CLI arguments for memcap.
//!
//! This module defines the command-line interface structure using the clap
//! library.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::platform::Platform;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "memcap",
    about = "Utility to capture memory statistics on embedded set-top boxes",
    long_about = "Utility to capture memory statistics on embedded set-top boxes.\n\n\
                  Samples every process's smaps-derived memory counters plus \
                  platform-specific system counters (CMA, GPU, BMEM, fragmentation) \
                  over a fixed window and writes min/max/average aggregates to a \
                  JSON report.",
    version
)]
pub struct Args {
    /// Amount of time (in seconds) to capture data for
    #[arg(short = 'd', long)]
    pub duration: Option<u64>,

    /// Seconds between samples
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Platform we're running on
    #[arg(short = 'p', long, value_enum)]
    pub platform: Option<Platform>,

    /// Directory to save results in
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Print the JSON report to stdout as well as the output directory
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Path to JSON file containing the group mappings (optional)
    #[arg(short = 'g', long)]
    pub groups: Option<PathBuf>,

    /// Keep every dead duplicate process instead of collapsing restart churn
    #[arg(long)]
    pub no_dedup: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_defaults() {
        let args = Args::parse_from(["memcap"]);
        assert!(args.duration.is_none());
        assert!(args.platform.is_none());
        assert!(!args.json);
        assert!(!args.no_dedup);
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "memcap",
            "-d",
            "120",
            "-i",
            "5",
            "-p",
            "realtek64",
            "-o",
            "/tmp/capture",
            "-g",
            "groups.json",
            "--no-dedup",
            "--json",
        ]);

        assert_eq!(args.duration, Some(120));
        assert_eq!(args.interval, Some(5));
        assert_eq!(args.platform, Some(Platform::Realtek64));
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/capture")));
        assert_eq!(args.groups, Some(PathBuf::from("groups.json")));
        assert!(args.no_dedup);
        assert!(args.json);
    }
}
