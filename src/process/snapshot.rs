//! Cached view of one process at the moment it was first observed.
//!
//! All details are read in [`ProcessSnapshot::capture`] and cached, because
//! the underlying process can exit at any time; there is no guarantee the
//! process still exists when the accessors are called. The liveness flag is
//! the only field that is refreshed afterwards, and it only ever moves from
//! alive to dead.

use std::fs;
use std::path::Path;

use crate::groups::{GroupKind, GroupManager};

/// A single observed process: identity, parentage and membership tags.
///
/// Identity is the (pid, cmdline) pair. PIDs are recycled by the kernel, so
/// on long captures the same PID can reappear as a different program; two
/// snapshots are only considered the same process when both fields match.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pid: i32,
    ppid: i32,
    name: String,
    cmdline: String,
    container: Option<String>,
    systemd_service: Option<String>,
    dead: bool,
}

impl PartialEq for ProcessSnapshot {
    fn eq(&self, rhs: &Self) -> bool {
        self.pid == rhs.pid && self.cmdline == rhs.cmdline
    }
}

impl Eq for ProcessSnapshot {}

impl ProcessSnapshot {
    /// Read and cache the details of `pid` from the proc root.
    ///
    /// Every field degrades to empty/`None` if the process exits mid-read;
    /// callers detect that case through an empty [`name`](Self::name).
    pub fn capture(proc_root: &Path, pid: i32) -> Self {
        let proc_path = proc_root.join(pid.to_string());

        let (name, cmdline) = read_cmdline(&proc_path);
        let ppid = read_ppid(&proc_path).unwrap_or(-1);
        let container = cgroup_path(&proc_path, "cpuset");
        let systemd_service = systemd_service_from_cgroup(&proc_path);

        Self {
            pid,
            ppid,
            name,
            cmdline,
            container,
            systemd_service,
            dead: false,
        }
    }

    /// Build a snapshot from already-known values, bypassing /proc.
    ///
    /// Intended for tests and tooling that replay recorded captures.
    pub fn from_parts(
        pid: i32,
        ppid: i32,
        cmdline: impl Into<String>,
        container: Option<String>,
        systemd_service: Option<String>,
    ) -> Self {
        let cmdline = cmdline.into();
        let name = cmdline
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        Self {
            pid,
            ppid,
            name,
            cmdline,
            container,
            systemd_service,
            dead: false,
        }
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn ppid(&self) -> i32 {
        self.ppid
    }

    /// Cached name of the process (argv[0], path included). Empty if the
    /// process died before its cmdline could be read.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached full cmdline (arguments included, NULs rendered as spaces).
    pub fn cmdline(&self) -> &str {
        &self.cmdline
    }

    /// argv[0] without its leading directory, for group matching.
    pub fn basename(&self) -> &str {
        match self.name.rfind('/') {
            Some(idx) => &self.name[idx + 1..],
            None => &self.name,
        }
    }

    /// Container name, if the process runs inside one.
    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// systemd service name, if the process runs as one.
    pub fn systemd_service(&self) -> Option<&str> {
        self.systemd_service.as_deref()
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Fold the result of an existence probe into the liveness flag.
    ///
    /// Once dead, stays dead: a recycled PID is a different process and gets
    /// its own snapshot instead of resurrecting this one.
    pub fn update_liveness(&mut self, alive: bool) {
        if self.dead {
            return;
        }
        self.dead = !alive;
    }

    /// Mark the snapshot dead directly (equivalent to a failed probe).
    pub fn mark_dead(&mut self) {
        self.dead = true;
    }

    /// Resolve which report group this process belongs to.
    ///
    /// The container tag is intentionally tried first so a broad process-name
    /// rule cannot capture containerised instances of the same engine; then
    /// the bare process name, then the full cmdline, each against the group
    /// definitions in declaration order.
    pub fn resolve_group(&self, groups: &GroupManager) -> Option<String> {
        if let Some(container) = &self.container {
            if let Some(group) = groups.group_for(GroupKind::Container, container) {
                return Some(group.to_string());
            }
        }

        if let Some(group) = groups.group_for(GroupKind::Process, self.basename()) {
            return Some(group.to_string());
        }

        groups
            .group_for(GroupKind::Process, &self.cmdline)
            .map(|g| g.to_string())
    }
}

/// Reads /proc/<pid>/cmdline and splits it into (argv[0], full cmdline).
///
/// The file is NUL-separated; the full cmdline replaces interior NULs with
/// spaces and drops the trailing one. Both strings are empty when the file
/// is unreadable or empty (kernel threads, or the process already exited).
fn read_cmdline(proc_path: &Path) -> (String, String) {
    let raw = match fs::read(proc_path.join("cmdline")) {
        Ok(bytes) => bytes,
        Err(_) => return (String::new(), String::new()),
    };

    if raw.is_empty() {
        return (String::new(), String::new());
    }

    let name = raw
        .split(|&b| b == 0)
        .next()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .unwrap_or_default();

    let trimmed = match raw.last() {
        Some(&0) => &raw[..raw.len() - 1],
        _ => &raw[..],
    };
    let cmdline: String = String::from_utf8_lossy(trimmed)
        .chars()
        .map(|c| if c == '\0' { ' ' } else { c })
        .collect();

    (name, cmdline)
}

/// Reads the parent PID from the PPid line of /proc/<pid>/status.
fn read_ppid(proc_path: &Path) -> Option<i32> {
    let content = fs::read_to_string(proc_path.join("status")).ok()?;

    for line in content.lines() {
        if let Some(v) = line.strip_prefix("PPid:") {
            return v.trim().parse().ok();
        }
    }

    None
}

/// Extract the cgroup path for one controller from /proc/<pid>/cgroup.
///
/// Lines look like `3:cpuset:/com.example.app`; the path doubles as the
/// container name on these platforms. The cpuset controller is used for
/// container detection since systemd does not place services into it, while
/// systemd services always join the pids controller.
fn cgroup_path(proc_path: &Path, controller: &str) -> Option<String> {
    let content = fs::read_to_string(proc_path.join("cgroup")).ok()?;
    parse_cgroup_controller(&content, controller)
}

fn parse_cgroup_controller(content: &str, controller: &str) -> Option<String> {
    for line in content.lines() {
        let mut fields = line.splitn(3, ':');
        let _hierarchy = fields.next()?;
        let controllers = fields.next()?;
        let path = fields.next()?;

        if controllers == controller {
            let path = path.strip_prefix('/').unwrap_or(path);
            if path.is_empty() {
                return None;
            }
            return Some(path.to_string());
        }
    }

    None
}

/// Derive the systemd service name from the pids cgroup path.
///
/// Services live under `system.slice/<name>`; a non-empty pids cgroup
/// without that prefix means the process is inside a container, reported as
/// "Unknown".
fn systemd_service_from_cgroup(proc_path: &Path) -> Option<String> {
    let slice = cgroup_path(proc_path, "pids")?;

    match slice.find("system.slice/") {
        Some(pos) => Some(slice[pos + "system.slice/".len()..].to_string()),
        None => Some("Unknown".to_string()),
    }
}
