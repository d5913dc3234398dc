//! Compressed-swap (zram) accounting.
//!
//! When swap lives on a zram device, swapped-out pages still occupy RAM,
//! just compressed. The ratio between the devices' resident size and the
//! amount of swap in use converts per-process SwapPss figures into their
//! actual physical cost.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

/// Upper bound on the zram device index scan. Devices appear in sequence
/// under /sys/block, so the scan stops at the first gap.
const MAX_ZRAM_DEVICES: u32 = 256;

/// Total bytes of RAM held by all zram devices, from the third column
/// (mem_used_total) of each device's mm_stat file.
pub fn zram_total_bytes(block_root: &Path) -> u64 {
    let mut total = 0u64;

    for i in 0..MAX_ZRAM_DEVICES {
        let device = block_root.join(format!("zram{}", i));
        if !device.exists() {
            break;
        }

        let mm_stat = device.join("mm_stat");
        if !mm_stat.exists() {
            continue;
        }

        match fs::read_to_string(&mm_stat) {
            Ok(content) => match parse_mm_stat_mem_used(&content) {
                Some(bytes) => total += bytes,
                None => warn!("Malformed mm_stat file {}", mm_stat.display()),
            },
            Err(e) => warn!("Failed to read {}: {}", mm_stat.display(), e),
        }
    }

    total
}

/// Third whitespace-separated column of an mm_stat line: mem_used_total.
fn parse_mm_stat_mem_used(content: &str) -> Option<u64> {
    content.split_whitespace().nth(2)?.parse().ok()
}

/// System-wide compression ratio: zram resident size over swap in use.
///
/// Returns 0 when swap or zram is unsupported, or when swap usage reads as
/// zero (nothing has been swapped out yet, so there is no meaningful ratio).
pub fn compression_ratio(block_root: &Path, swap_used_kb: u64) -> f64 {
    if swap_used_kb == 0 {
        return 0.0;
    }

    let zram_total_kb = zram_total_bytes(block_root) / 1024;
    if zram_total_kb == 0 {
        return 0.0;
    }

    let compression = zram_total_kb as f64 / swap_used_kb as f64;
    debug!("Zram compression is {}", compression);
    compression
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_mm_stat() {
        // orig_data_size compr_data_size mem_used_total ...
        let line = "116236288 27987519 30integer?"; // malformed third column
        assert_eq!(parse_mm_stat_mem_used(line), None);

        let line = "116236288 27987519 30908416 268435456 31436800 562 0 0 0";
        assert_eq!(parse_mm_stat_mem_used(line), Some(30908416));

        assert_eq!(parse_mm_stat_mem_used(""), None);
        assert_eq!(parse_mm_stat_mem_used("1 2"), None);
    }

    #[test]
    fn test_compression_ratio_from_synthetic_devices() {
        let root = tempfile::tempdir().unwrap();
        let zram0 = root.path().join("zram0");
        fs::create_dir(&zram0).unwrap();
        // 30 MB resident
        fs::write(zram0.join("mm_stat"), "116236288 27987519 31457280 0 0 0 0 0 0\n").unwrap();

        // 120 MB of swap in use, 30 MB of RAM actually held
        let ratio = compression_ratio(root.path(), 120 * 1024);
        assert!((ratio - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_compression_ratio_stops_at_first_gap() {
        let root = tempfile::tempdir().unwrap();
        // zram1 exists but zram0 does not: the scan stops immediately
        let zram1 = root.path().join("zram1");
        fs::create_dir(&zram1).unwrap();
        fs::write(zram1.join("mm_stat"), "1 2 1048576 0 0 0 0 0 0\n").unwrap();

        assert_eq!(zram_total_bytes(root.path()), 0);
        assert_eq!(compression_ratio(root.path(), 1024), 0.0);
    }

    #[test]
    fn test_compression_ratio_no_swap_used() {
        let root = tempfile::tempdir().unwrap();
        let zram0 = root.path().join("zram0");
        fs::create_dir(&zram0).unwrap();
        fs::write(zram0.join("mm_stat"), "1 2 1048576 0 0 0 0 0 0\n").unwrap();

        assert_eq!(compression_ratio(root.path(), 0), 0.0);
    }
}
