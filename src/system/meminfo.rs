//! Snapshot of /proc/meminfo, all values in kB.

use std::fs;
use std::path::Path;

use tracing::warn;

/// The system-wide memory counters one capture cycle cares about.
///
/// `used_kb` is derived, not kernel-reported: total minus free, buffers,
/// cached and reclaimable slab.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemInfo {
    pub total_kb: u64,
    pub free_kb: u64,
    pub available_kb: u64,
    pub used_kb: u64,
    pub buffers_kb: u64,
    pub cached_kb: u64,
    pub slab_kb: u64,
    pub slab_reclaimable_kb: u64,
    pub slab_unreclaimable_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
    pub cma_total_kb: u64,
    pub cma_free_kb: u64,
}

impl MemInfo {
    /// Read and parse a meminfo file. An unreadable file yields a zeroed
    /// snapshot with a warning; the capture keeps running.
    pub fn read(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse meminfo content.
    pub fn parse(content: &str) -> Self {
        let mut info = Self::default();

        for line in content.lines() {
            let (key, rest) = match line.split_once(':') {
                Some(kv) => kv,
                None => continue,
            };

            let slot = match key {
                "MemTotal" => &mut info.total_kb,
                "MemFree" => &mut info.free_kb,
                "MemAvailable" => &mut info.available_kb,
                "Buffers" => &mut info.buffers_kb,
                "Cached" => &mut info.cached_kb,
                "Slab" => &mut info.slab_kb,
                "SReclaimable" => &mut info.slab_reclaimable_kb,
                "SUnreclaim" => &mut info.slab_unreclaimable_kb,
                "SwapTotal" => &mut info.swap_total_kb,
                "SwapFree" => &mut info.swap_free_kb,
                "CmaTotal" => &mut info.cma_total_kb,
                "CmaFree" => &mut info.cma_free_kb,
                _ => continue,
            };

            if let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) {
                *slot = value;
            }
        }

        // Consistency check: a total smaller than the sum of its parts means
        // something was misparsed, so leave the derived figure unset rather
        // than reporting a nonsensical value.
        let parts = info.free_kb + info.buffers_kb + info.cached_kb + info.slab_kb;
        if info.total_kb < parts {
            warn!("MemTotal too small, something went wrong calculating memory");
            return info;
        }

        info.used_kb =
            info.total_kb - (info.free_kb + info.buffers_kb + info.cached_kb + info.slab_reclaimable_kb);
        info
    }

    pub fn swap_used_kb(&self) -> u64 {
        self.swap_total_kb.saturating_sub(self.swap_free_kb)
    }

    pub fn swap_enabled(&self) -> bool {
        self.swap_total_kb > 0
    }
}
