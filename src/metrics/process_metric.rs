//! Per-process memory sampling cycle.
//!
//! Every interval the collection thread enumerates all PIDs, samples each
//! process's smaps-derived counters and folds them into a long-lived table
//! of running measurements keyed by process identity. Individual samples
//! will miss short spikes, but over the capture window the running averages
//! smooth out into a usable picture of each process's footprint.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::measurement::Measurement;
use crate::metrics::Metric;
use crate::process::memory::{sample_process, MemorySample};
use crate::process::scanner;
use crate::process::snapshot::ProcessSnapshot;
use crate::report::ReportGenerator;

/// Aggregated measurements for one observed process.
#[derive(Debug, Clone)]
pub struct ProcessMeasurement {
    pub snapshot: ProcessSnapshot,
    pub pss: Measurement,
    pub rss: Measurement,
    pub uss: Measurement,
    pub vss: Measurement,
    pub swap: Measurement,
    pub swap_pss: Measurement,
    pub swap_zram: Measurement,
    pub locked: Measurement,
}

impl ProcessMeasurement {
    pub fn new(snapshot: ProcessSnapshot) -> Self {
        Self {
            snapshot,
            pss: Measurement::new("Pss"),
            rss: Measurement::new("Rss"),
            uss: Measurement::new("Uss"),
            vss: Measurement::new("Vss"),
            swap: Measurement::new("Swap"),
            swap_pss: Measurement::new("SwapPss"),
            swap_zram: Measurement::new("SwapZram"),
            locked: Measurement::new("Locked"),
        }
    }

    /// Append one memory sample to every per-metric measurement.
    pub fn record(&mut self, sample: &MemorySample, compression_ratio: f64) {
        self.pss.add_data_point(sample.pss_kb as f64);
        self.rss.add_data_point(sample.rss_kb as f64);
        self.uss.add_data_point(sample.uss_kb() as f64);
        self.vss.add_data_point(sample.vss_kb as f64);
        self.swap.add_data_point(sample.swap_kb as f64);
        self.swap_pss.add_data_point(sample.swap_pss_kb as f64);
        self.swap_zram
            .add_data_point(sample.swap_zram_kb(compression_ratio));
        self.locked.add_data_point(sample.locked_kb as f64);
    }
}

/// Process identity: PID plus full cmdline.
///
/// PIDs are recycled, so on long captures the PID alone would conflate a
/// fresh process with a dead one that happened to get the same number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ProcessKey {
    pid: i32,
    cmdline: String,
}

impl ProcessKey {
    fn of(snapshot: &ProcessSnapshot) -> Self {
        Self {
            pid: snapshot.pid(),
            cmdline: snapshot.cmdline().to_string(),
        }
    }
}

/// The live table of per-process measurements.
///
/// Entries are kept in first-seen order and never removed during the run;
/// the deduplication pass filters the final vector after collection stops.
#[derive(Debug, Default)]
pub struct ProcessTable {
    index: AHashMap<ProcessKey, usize>,
    entries: Vec<ProcessMeasurement>,
}

impl ProcessTable {
    /// Fold one sample into the entry for this identity, creating the entry
    /// on first sighting.
    pub fn record(
        &mut self,
        snapshot: ProcessSnapshot,
        sample: &MemorySample,
        compression_ratio: f64,
    ) {
        let key = ProcessKey::of(&snapshot);

        match self.index.get(&key) {
            Some(&idx) => self.entries[idx].record(sample, compression_ratio),
            None => {
                let mut measurement = ProcessMeasurement::new(snapshot);
                measurement.record(sample, compression_ratio);
                self.index.insert(key, self.entries.len());
                self.entries.push(measurement);
            }
        }
    }

    /// Re-probe existence of every known process, not just the ones seen
    /// this cycle. Dead stays dead.
    pub fn refresh_liveness(&mut self, proc_root: &Path) {
        for entry in &mut self.entries {
            let alive = scanner::process_exists(proc_root, entry.snapshot.pid());
            entry.snapshot.update_liveness(alive);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ProcessMeasurement] {
        &self.entries
    }

    pub fn take_entries(&mut self) -> Vec<ProcessMeasurement> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}

/// Collapse restart churn: sets of dead processes sharing cmdline and
/// parent PID, keeping only the instance with the highest average PSS.
///
/// A script that runs `sleep 10` once a minute would otherwise leave dozens
/// of near-identical dead entries inflating the process count. The match
/// key is a heuristic: two genuinely distinct short-lived invocations that
/// happen to share cmdline and parent are merged too. Disable with
/// `--no-dedup` to keep every instance.
pub fn deduplicate(entries: &mut Vec<ProcessMeasurement>) {
    let mut groups: AHashMap<(String, i32), Vec<usize>> = AHashMap::new();

    for (idx, entry) in entries.iter().enumerate() {
        if !entry.snapshot.is_dead() {
            continue;
        }

        groups
            .entry((entry.snapshot.cmdline().to_string(), entry.snapshot.ppid()))
            .or_default()
            .push(idx);
    }

    let mut remove = vec![false; entries.len()];
    for ((cmdline, _ppid), indices) in &groups {
        if indices.len() < 2 {
            continue;
        }

        let keep = *indices
            .iter()
            .max_by(|&&a, &&b| {
                entries[a]
                    .pss
                    .average()
                    .partial_cmp(&entries[b].pss.average())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("group has at least two entries");

        info!("Removing {} duplicates for {}", indices.len() - 1, cmdline);
        for &idx in indices {
            if idx != keep {
                remove[idx] = true;
            }
        }
    }

    let mut flags = remove.into_iter();
    entries.retain(|_| !flags.next().unwrap_or(false));
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
}

struct State {
    quit: bool,
    table: ProcessTable,
}

/// The per-process metric: owns the sampling thread and the live table.
pub struct ProcessMetric {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
    proc_root: PathBuf,
    compression_ratio: f64,
    dedup: bool,
}

impl ProcessMetric {
    /// `compression_ratio` is the system-wide compressed-swap ratio,
    /// computed once for the whole capture; `dedup` controls the
    /// post-capture duplicate collapse.
    pub fn new(proc_root: impl Into<PathBuf>, compression_ratio: f64, dedup: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    quit: false,
                    table: ProcessTable::default(),
                }),
                wakeup: Condvar::new(),
            }),
            thread: None,
            proc_root: proc_root.into(),
            compression_ratio,
            dedup,
        }
    }

    /// One full sweep: enumerate, snapshot and sample every PID, merge into
    /// the table, then refresh liveness across all known entries.
    fn collect_cycle(proc_root: &Path, compression_ratio: f64, table: &mut ProcessTable) {
        let pids = scanner::collect_pids(proc_root);
        if pids.is_empty() {
            warn!("No PIDs found under {}", proc_root.display());
            return;
        }

        let samples: Vec<(ProcessSnapshot, MemorySample)> = pids
            .par_iter()
            .filter_map(|&pid| {
                let snapshot = ProcessSnapshot::capture(proc_root, pid);

                // An empty name means the process vanished before its
                // details could be read, or is a kernel thread.
                if snapshot.name().is_empty() {
                    return None;
                }

                let sample = sample_process(&proc_root.join(pid.to_string()));
                Some((snapshot, sample))
            })
            .collect();

        for (snapshot, sample) in samples {
            table.record(snapshot, &sample, compression_ratio);
        }

        table.refresh_liveness(proc_root);
    }

    fn run(shared: Arc<Shared>, proc_root: PathBuf, compression_ratio: f64, interval: Duration) {
        let mut state = shared.state.lock().expect("sampler state poisoned");

        loop {
            let start = Instant::now();
            Self::collect_cycle(&proc_root, compression_ratio, &mut state.table);
            debug!(
                "Process sweep ({} tracked) completed in {} ms",
                state.table.len(),
                start.elapsed().as_millis()
            );

            // Condvar::wait_timeout measures against a monotonic clock; the
            // wall clock steps when NTP syncs shortly after boot on these
            // devices and must not cut the wait short or stretch it.
            let (guard, _) = shared
                .wakeup
                .wait_timeout(state, interval)
                .expect("sampler state poisoned");
            state = guard;

            if state.quit {
                break;
            }
        }

        info!("Collection thread quit");
    }
}

impl Metric for ProcessMetric {
    fn start_collection(&mut self, interval: Duration) {
        if self.thread.is_some() {
            warn!("Process collection already running");
            return;
        }

        self.shared.state.lock().expect("sampler state poisoned").quit = false;

        let shared = Arc::clone(&self.shared);
        let proc_root = self.proc_root.clone();
        let compression_ratio = self.compression_ratio;

        let handle = thread::Builder::new()
            .name("process-sampler".into())
            .spawn(move || Self::run(shared, proc_root, compression_ratio, interval))
            .expect("failed to spawn process sampler thread");
        self.thread = Some(handle);
    }

    fn stop_collection(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("sampler state poisoned");
            state.quit = true;
            self.shared.wakeup.notify_all();
        }

        if let Some(handle) = self.thread.take() {
            info!("Waiting for process collection thread to terminate");
            let _ = handle.join();
        }
    }

    fn save_results(&mut self, report: &mut ReportGenerator) {
        let mut entries = {
            let mut state = self.shared.state.lock().expect("sampler state poisoned");
            state.table.take_entries()
        };

        if self.dedup {
            deduplicate(&mut entries);
        }

        // All PSS averages feed the running grand total of accounted memory
        let pss_sum: f64 = entries.iter().map(|e| e.pss.average()).sum();

        report.add_processes(entries);
        report.add_to_accumulated_memory_usage(pss_sum);
    }
}

impl Drop for ProcessMetric {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop_collection();
        }
    }
}
