//! Configuration management for memcap.
//!
//! Resolution order: built-in defaults, then an optional TOML config file,
//! then CLI arguments. The result is one immutable [`CaptureConfig`] passed
//! into the metric constructors - there is no global mutable configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::Args;
use crate::platform::Platform;

// Default configuration constants
pub const DEFAULT_DURATION_SECS: u64 = 30;
pub const DEFAULT_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_OUTPUT_DIR: &str = "memcap-report";
const DEFAULT_CONFIG_PATH: &str = "memcap.toml";

/// On-disk configuration (all fields optional, CLI flags win).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub duration_seconds: Option<u64>,
    pub interval_seconds: Option<u64>,
    /// Uppercase platform name, e.g. "AMLOGIC" or "REALTEK64"
    pub platform: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub groups_file: Option<PathBuf>,
    pub disable_dedup: Option<bool>,
}

/// Effective capture configuration, immutable for the run.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub duration: Duration,
    pub interval: Duration,
    pub platform: Platform,
    pub output_dir: PathBuf,
    pub groups_file: Option<PathBuf>,
    pub dedup: bool,
    pub json_stdout: bool,
}

/// Merge defaults, config file and CLI arguments.
pub fn resolve_config(args: &Args) -> Result<CaptureConfig> {
    let file = load_config_file(args)?;

    let platform = match args.platform {
        Some(p) => p,
        None => match &file.platform {
            Some(name) => Platform::from_name(name)
                .ok_or_else(|| anyhow!("Unsupported platform {}", name))?,
            None => Platform::Amlogic,
        },
    };

    let duration_secs = args
        .duration
        .or(file.duration_seconds)
        .unwrap_or(DEFAULT_DURATION_SECS);
    let interval_secs = args
        .interval
        .or(file.interval_seconds)
        .unwrap_or(DEFAULT_INTERVAL_SECS);

    let output_dir = args
        .output_dir
        .clone()
        .or(file.output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    let groups_file = args.groups.clone().or(file.groups_file);

    let dedup = if args.no_dedup {
        false
    } else {
        !file.disable_dedup.unwrap_or(false)
    };

    Ok(CaptureConfig {
        duration: Duration::from_secs(duration_secs),
        interval: Duration::from_secs(interval_secs),
        platform,
        output_dir,
        groups_file,
        dedup,
        json_stdout: args.json,
    })
}

/// Sanity checks that must hold before any sampling starts.
pub fn validate_config(config: &CaptureConfig) -> Result<()> {
    if config.duration.is_zero() {
        bail!("duration (s) must be > 0");
    }
    if config.interval.is_zero() {
        bail!("interval (s) must be > 0");
    }
    if let Some(groups) = &config.groups_file {
        if !groups.is_file() {
            bail!("groups file {} does not exist", groups.display());
        }
    }
    Ok(())
}

/// Load the TOML config file. An explicitly passed path must exist and
/// parse; the default path is used only when present.
fn load_config_file(args: &Args) -> Result<ConfigFile> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if !default.is_file() {
                return Ok(ConfigFile::default());
            }
            default
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    info!("Loaded configuration from {}", path.display());
    Ok(file)
}

/// Resolve against an explicit config file path.
pub fn config_from_file(path: &Path, args: &Args) -> Result<CaptureConfig> {
    let args_with_file = Args {
        config: Some(path.to_path_buf()),
        duration: args.duration,
        interval: args.interval,
        platform: args.platform,
        output_dir: args.output_dir.clone(),
        json: args.json,
        groups: args.groups.clone(),
        no_dedup: args.no_dedup,
        log_level: args.log_level,
        check_config: args.check_config,
    };
    resolve_config(&args_with_file)
}
