//! Process discovery: enumerating PID entries under a proc root.
//!
//! The proc root is passed in rather than hardcoded so tests can point the
//! scanner at a synthetic directory tree.

use std::fs;
use std::path::Path;

/// Scans a proc root for numeric-named directories and returns the PIDs,
/// sorted ascending.
///
/// Anything that is not a directory with an all-digit name is skipped; the
/// set of PIDs is inherently racy and callers must tolerate entries
/// disappearing before they are sampled.
pub fn collect_pids(root: &Path) -> Vec<i32> {
    let mut pids = Vec::new();

    if let Ok(entries) = fs::read_dir(root) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let name = match path.file_name().and_then(|s| s.to_str()) {
                Some(v) => v,
                None => continue,
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }

            if let Ok(pid) = name.parse::<i32>() {
                pids.push(pid);
            }
        }
    }

    pids.sort_unstable();
    pids
}

/// Existence probe for a process directory, used for liveness refresh.
pub fn process_exists(root: &Path, pid: i32) -> bool {
    root.join(pid.to_string()).is_dir()
}
