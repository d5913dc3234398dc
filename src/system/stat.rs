//! Per-CPU time counters from /proc/stat, used by the CPU idle metric.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Cumulative jiffies per CPU state since boot.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Total CPU time across all fields.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Non-active time: idle plus time waiting for I/O.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

/// Reads the per-CPU counter lines from a /proc/stat style file.
///
/// Keys are "cpu" (aggregate) and "cpu0", "cpu1", ... per core.
pub fn read_cpu_stats(path: &Path) -> Result<HashMap<String, CpuStat>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse_cpu_stats(&content)
}

pub fn parse_cpu_stats(content: &str) -> Result<HashMap<String, CpuStat>, String> {
    let mut stats = HashMap::new();

    for line in content.lines() {
        if !line.starts_with("cpu") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            continue;
        }

        let field = |i: usize| parts.get(i).and_then(|v| v.parse().ok()).unwrap_or(0);

        stats.insert(
            parts[0].to_string(),
            CpuStat {
                user: field(1),
                nice: field(2),
                system: field(3),
                idle: field(4),
                iowait: field(5),
                irq: field(6),
                softirq: field(7),
                steal: field(8),
            },
        );
    }

    if stats.is_empty() {
        return Err("No CPU statistics found".to_string());
    }

    Ok(stats)
}

/// Idle fraction (0..=1) of the window between two readings of one CPU.
pub fn idle_ratio(start: &CpuStat, end: &CpuStat) -> Option<f64> {
    let delta_total = end.total().saturating_sub(start.total());
    if delta_total == 0 {
        return None;
    }

    let delta_idle = end.idle_total().saturating_sub(start.idle_total());
    Some(delta_idle as f64 / delta_total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "\
cpu  1000 10 500 8000 200 30 40 0 0 0
cpu0 250 3 125 2000 50 8 10 0 0 0
cpu1 750 7 375 6000 150 22 30 0 0 0
intr 123456 0 0
ctxt 7654321
btime 1690000000
";

    #[test]
    fn test_parse_cpu_stats() {
        let stats = parse_cpu_stats(STAT).unwrap();
        assert_eq!(stats.len(), 3);

        let total = &stats["cpu"];
        assert_eq!(total.user, 1000);
        assert_eq!(total.idle, 8000);
        assert_eq!(total.iowait, 200);
        assert_eq!(total.idle_total(), 8200);
    }

    #[test]
    fn test_parse_cpu_stats_empty_input() {
        assert!(parse_cpu_stats("intr 1 2 3\n").is_err());
    }

    #[test]
    fn test_idle_ratio() {
        let start = CpuStat {
            user: 100,
            idle: 900,
            ..Default::default()
        };
        let end = CpuStat {
            user: 200,
            idle: 1700,
            ..Default::default()
        };

        // 800 idle jiffies out of 900 elapsed
        let ratio = idle_ratio(&start, &end).unwrap();
        assert!((ratio - 800.0 / 900.0).abs() < 1e-9);

        // No elapsed time yields no ratio
        assert!(idle_ratio(&end, &end).is_none());
    }
}
