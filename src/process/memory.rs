//! Per-process memory sampling from /proc/<pid>/smaps and smaps_rollup.
//!
//! smaps_rollup (Linux >= 4.14) is preferred since the kernel has already
//! aggregated all mappings into one block; the full smaps file is the
//! fallback and can run to thousands of mapping entries on a busy browser
//! process, so the line parser avoids any per-line allocation beyond the
//! read buffer.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One instant reading of a process's memory counters, all in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub rss_kb: u64,
    pub pss_kb: u64,
    pub swap_kb: u64,
    pub swap_pss_kb: u64,
    pub locked_kb: u64,
    pub private_clean_kb: u64,
    pub private_dirty_kb: u64,
    pub vss_kb: u64,
}

impl MemorySample {
    /// Unique set size: memory used exclusively by this process.
    pub fn uss_kb(&self) -> u64 {
        self.private_clean_kb + self.private_dirty_kb
    }

    /// Physical cost of this process's swapped pages on a compressed-swap
    /// device, given the system-wide compression ratio.
    pub fn swap_zram_kb(&self, compression_ratio: f64) -> f64 {
        self.swap_pss_kb as f64 * compression_ratio
    }
}

/// Recognised smaps keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SmapsField {
    Pss,
    Rss,
    Swap,
    SwapPss,
    Locked,
    PrivateClean,
    PrivateDirty,
    Size,
}

/// Single-pass key recognition for one smaps line.
///
/// The key token ends at the first whitespace and must end with a colon;
/// dispatch is on the first byte, then an exact token comparison, so the
/// overwhelmingly common unrecognised lines (VmFlags, Referenced, ...) are
/// rejected after at most one comparison. Exact matching also keeps
/// `Pss_Anon:`/`Pss_File:` style sub-keys out of the totals.
fn parse_smaps_line(line: &str) -> Option<(SmapsField, u64)> {
    let bytes = line.as_bytes();
    let end = bytes
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(bytes.len());

    if end == 0 || bytes[end - 1] != b':' {
        return None;
    }

    let key = &line[..end];
    let field = match bytes[0] {
        b'P' => match key {
            "Pss:" => SmapsField::Pss,
            "Private_Clean:" => SmapsField::PrivateClean,
            "Private_Dirty:" => SmapsField::PrivateDirty,
            _ => return None,
        },
        b'S' => match key {
            "Swap:" => SmapsField::Swap,
            "SwapPss:" => SmapsField::SwapPss,
            "Size:" => SmapsField::Size,
            _ => return None,
        },
        b'R' => match key {
            "Rss:" => SmapsField::Rss,
            _ => return None,
        },
        b'L' => match key {
            "Locked:" => SmapsField::Locked,
            _ => return None,
        },
        _ => return None,
    };

    Some((field, parse_kb_value(&line[end..]).unwrap_or(0)))
}

/// Parses kilobyte values from smaps file lines ("  1234 kB").
fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

/// How recognised values fold into the sample: the full smaps file reports
/// one block per mapping so values are summed, while smaps_rollup already
/// reports the aggregate so values are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldMode {
    Sum,
    Assign,
}

fn fold_lines<R: BufRead>(reader: R, mode: FoldMode) -> std::io::Result<MemorySample> {
    let mut sample = MemorySample::default();

    for line in reader.lines() {
        let line = line?;
        let (field, value) = match parse_smaps_line(&line) {
            Some(entry) => entry,
            None => continue,
        };

        let slot = match field {
            SmapsField::Pss => &mut sample.pss_kb,
            SmapsField::Rss => &mut sample.rss_kb,
            SmapsField::Swap => &mut sample.swap_kb,
            SmapsField::SwapPss => &mut sample.swap_pss_kb,
            SmapsField::Locked => &mut sample.locked_kb,
            SmapsField::PrivateClean => &mut sample.private_clean_kb,
            SmapsField::PrivateDirty => &mut sample.private_dirty_kb,
            SmapsField::Size => &mut sample.vss_kb,
        };

        match mode {
            FoldMode::Sum => *slot += value,
            FoldMode::Assign => *slot = value,
        }
    }

    Ok(sample)
}

/// Parses the pre-aggregated /proc/<pid>/smaps_rollup file.
pub fn read_smaps_rollup(path: &Path) -> std::io::Result<MemorySample> {
    let file = fs::File::open(path)?;
    fold_lines(BufReader::new(file), FoldMode::Assign)
}

/// Parses the full /proc/<pid>/smaps file, summing across all mappings.
pub fn read_smaps(path: &Path) -> std::io::Result<MemorySample> {
    let file = fs::File::open(path)?;
    fold_lines(BufReader::new(file), FoldMode::Sum)
}

/// Sample the memory usage of the process under `proc_path`.
///
/// Prefers smaps_rollup, falling back to the full smaps file. An unreadable
/// file means the process exited between enumeration and sampling - a
/// routine race under process churn, answered with an all-zero sample
/// rather than an error.
pub fn sample_process(proc_path: &Path) -> MemorySample {
    let rollup = proc_path.join("smaps_rollup");
    if rollup.exists() {
        return read_smaps_rollup(&rollup).unwrap_or_default();
    }

    read_smaps(&proc_path.join("smaps")).unwrap_or_default()
}
