//! System-wide memory sampling: meminfo categories, CMA regions, GPU
//! allocations, per-container usage, DDR bandwidth, Broadcom BMEM regions
//! and buddy-allocator fragmentation.
//!
//! Most sources are vendor debug interfaces that may be absent, truncated
//! or oddly formatted on any given build; every reader degrades to a
//! warning and keeps the capture alive.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::measurement::Measurement;
use crate::metrics::Metric;
use crate::platform::Platform;
use crate::process::snapshot::ProcessSnapshot;
use crate::report::{ReportGenerator, ReportItem};
use crate::system::meminfo::MemInfo;

const MEMINFO_PATH: &str = "/proc/meminfo";
const BUDDYINFO_PATH: &str = "/proc/buddyinfo";
const CMA_DEBUG_ROOT: &str = "/sys/kernel/debug/cma";
const MALI_GPU_MEMORY: &str = "/sys/kernel/debug/mali0/gpu_memory";
const DRI_DEBUG_ROOT: &str = "/sys/kernel/debug/dri/0";
const MEMORY_CGROUP_ROOT: &str = "/sys/fs/cgroup/memory";
const AML_DDR_MODE: &str = "/sys/class/aml_ddr/mode";
const AML_DDR_BANDWIDTH: &str = "/sys/class/aml_ddr/bandwidth";
const BRCM_CORE_INFO: &str = "/proc/brcm/core";

/// cgroups that exist on every build and are not containers.
const CONTAINER_IGNORE_LIST: &[&str] = &["init.scope", "system.slice"];

struct CmaMeasurement {
    size_kb: i64,
    used: Measurement,
    unused: Measurement,
}

struct GpuMeasurement {
    snapshot: ProcessSnapshot,
    used: Measurement,
}

struct FragmentationMeasurement {
    free_pages: Measurement,
    fragmentation: Measurement,
}

/// Accumulators for everything this metric samples. BTreeMaps keep the
/// report ordering stable between runs.
struct MemoryData {
    linux: BTreeMap<&'static str, Measurement>,
    cma: BTreeMap<String, CmaMeasurement>,
    cma_free: Measurement,
    cma_borrowed: Measurement,
    gpu: BTreeMap<i32, GpuMeasurement>,
    containers: BTreeMap<String, Measurement>,
    bandwidth: Measurement,
    bmem: BTreeMap<String, Measurement>,
    fragmentation: BTreeMap<String, Vec<FragmentationMeasurement>>,
}

const LINUX_CATEGORIES: &[&str] = &[
    "Total",
    "Used",
    "Buffered",
    "Cached",
    "Free",
    "Available",
    "Slab Total",
    "Slab Reclaimable",
    "Slab Unreclaimable",
    "Swap Used",
];

impl MemoryData {
    fn new() -> Self {
        let mut linux = BTreeMap::new();
        for category in LINUX_CATEGORIES {
            linux.insert(*category, Measurement::new("Value KB"));
        }

        Self {
            linux,
            cma: BTreeMap::new(),
            cma_free: Measurement::new("Value (KB)"),
            cma_borrowed: Measurement::new("Value (KB)"),
            gpu: BTreeMap::new(),
            containers: BTreeMap::new(),
            bandwidth: Measurement::new("Memory Bandwidth (kbps)"),
            bmem: BTreeMap::new(),
            fragmentation: BTreeMap::new(),
        }
    }
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
}

struct State {
    quit: bool,
    data: MemoryData,
}

/// The system-wide memory metric: owns its sampling thread and accumulators.
pub struct MemoryMetric {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
    platform: Platform,
    page_size: u64,
    proc_root: PathBuf,
}

impl MemoryMetric {
    pub fn new(platform: Platform, proc_root: impl Into<PathBuf>) -> Self {
        // Several debug counters report pages rather than bytes
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(0) as u64;

        // The Amlogic DDR bandwidth counter only produces data while
        // explicitly enabled
        if platform.supports_memory_bandwidth() && Path::new(AML_DDR_MODE).exists() {
            if let Err(e) = fs::write(AML_DDR_MODE, "1") {
                warn!("Failed to enable DDR bandwidth monitoring: {}", e);
            }
        }

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    quit: false,
                    data: MemoryData::new(),
                }),
                wakeup: Condvar::new(),
            }),
            thread: None,
            platform,
            page_size,
            proc_root: proc_root.into(),
        }
    }

    fn collect(platform: Platform, page_size: u64, proc_root: &Path, data: &mut MemoryData) {
        let meminfo = MemInfo::read(Path::new(MEMINFO_PATH));

        collect_linux_memory(&meminfo, data);
        collect_cma(platform, page_size, &meminfo, Path::new(CMA_DEBUG_ROOT), data);
        collect_gpu(platform, page_size, proc_root, data);
        collect_containers(Path::new(MEMORY_CGROUP_ROOT), data);
        collect_bandwidth(platform, data);
        collect_fragmentation(platform, Path::new(BUDDYINFO_PATH), data);

        if platform == Platform::Broadcom {
            collect_bmem(Path::new(BRCM_CORE_INFO), data);
        }
    }

    fn run(
        shared: Arc<Shared>,
        platform: Platform,
        page_size: u64,
        proc_root: PathBuf,
        interval: Duration,
    ) {
        let mut state = shared.state.lock().expect("memory metric state poisoned");

        loop {
            let start = Instant::now();
            Self::collect(platform, page_size, &proc_root, &mut state.data);
            debug!(
                "System memory sweep completed in {} ms",
                start.elapsed().as_millis()
            );

            // Monotonic timed wait: boot-time NTP steps must not perturb
            // the sampling cadence.
            let (guard, _) = shared
                .wakeup
                .wait_timeout(state, interval)
                .expect("memory metric state poisoned");
            state = guard;

            if state.quit {
                break;
            }
        }

        info!("Collection thread quit");
    }
}

impl Metric for MemoryMetric {
    fn start_collection(&mut self, interval: Duration) {
        if self.thread.is_some() {
            warn!("Memory collection already running");
            return;
        }

        self.shared
            .state
            .lock()
            .expect("memory metric state poisoned")
            .quit = false;

        let shared = Arc::clone(&self.shared);
        let platform = self.platform;
        let page_size = self.page_size;
        let proc_root = self.proc_root.clone();

        let handle = thread::Builder::new()
            .name("memory-sampler".into())
            .spawn(move || Self::run(shared, platform, page_size, proc_root, interval))
            .expect("failed to spawn memory sampler thread");
        self.thread = Some(handle);
    }

    fn stop_collection(&mut self) {
        {
            let mut state = self.shared.state.lock().expect("memory metric state poisoned");
            state.quit = true;
            self.shared.wakeup.notify_all();
        }

        if let Some(handle) = self.thread.take() {
            info!("Waiting for memory collection thread to terminate");
            let _ = handle.join();
        }
    }

    fn save_results(&mut self, report: &mut ReportGenerator) {
        let state = self.shared.state.lock().expect("memory metric state poisoned");
        let data = &state.data;

        // Linux memory categories
        let rows: Vec<Vec<ReportItem>> = data
            .linux
            .iter()
            .map(|(category, measurement)| {
                vec![
                    ReportItem::label("Value", *category),
                    ReportItem::metric(measurement.clone()),
                ]
            })
            .collect();
        report.add_dataset("Linux Memory", &rows);

        if let Some(used) = data.linux.get("Used") {
            if used.count() > 0 {
                report.set_average_linux_memory_usage(used.average_rounded());
            }
        }

        // GPU allocations per process
        let rows: Vec<Vec<ReportItem>> = data
            .gpu
            .values()
            .map(|gpu| {
                vec![
                    ReportItem::label("PID", gpu.snapshot.pid().to_string()),
                    ReportItem::label("Process", gpu.snapshot.name()),
                    ReportItem::label(
                        "Container",
                        gpu.snapshot.container().unwrap_or("-"),
                    ),
                    ReportItem::label("Cmdline", gpu.snapshot.cmdline()),
                    ReportItem::metric(gpu.used.clone()),
                ]
            })
            .collect();
        report.add_dataset("GPU Memory", &rows);

        let gpu_sum: f64 = data.gpu.values().map(|g| g.used.average()).sum();
        report.add_to_accumulated_memory_usage(gpu_sum);

        // CMA regions and summary
        let rows: Vec<Vec<ReportItem>> = data
            .cma
            .iter()
            .map(|(region, cma)| {
                vec![
                    ReportItem::label("Region", region.as_str()),
                    ReportItem::label("Size KB", cma.size_kb.to_string()),
                    ReportItem::metric(cma.used.clone()),
                    ReportItem::metric(cma.unused.clone()),
                ]
            })
            .collect();
        report.add_dataset("CMA Regions", &rows);

        let cma_sum: f64 = data.cma.values().map(|c| c.used.average()).sum();
        report.add_to_accumulated_memory_usage(cma_sum);

        if data.cma_free.count() > 0 {
            report.add_dataset(
                "CMA Summary",
                &[
                    vec![
                        ReportItem::label("Value", "CMA Free"),
                        ReportItem::metric(data.cma_free.clone()),
                    ],
                    vec![
                        ReportItem::label("Value", "CMA Borrowed by Kernel"),
                        ReportItem::metric(data.cma_borrowed.clone()),
                    ],
                ],
            );
        }

        // Per-container memory
        let rows: Vec<Vec<ReportItem>> = data
            .containers
            .iter()
            .map(|(container, measurement)| {
                vec![
                    ReportItem::label("Container", container.as_str()),
                    ReportItem::metric(measurement.clone()),
                ]
            })
            .collect();
        report.add_dataset("Containers", &rows);

        // DDR bandwidth
        if data.bandwidth.count() > 0 {
            report.add_dataset(
                "Memory Bandwidth",
                &[vec![ReportItem::metric(data.bandwidth.clone())]],
            );
        }

        // Fragmentation, one dataset per zone
        for (zone, orders) in &data.fragmentation {
            let rows: Vec<Vec<ReportItem>> = orders
                .iter()
                .enumerate()
                .map(|(order, m)| {
                    vec![
                        ReportItem::label("Order", order.to_string()),
                        ReportItem::metric(m.free_pages.clone()),
                        ReportItem::metric(m.fragmentation.clone()),
                    ]
                })
                .collect();
            report.add_dataset(&format!("Memory Fragmentation - Zone {}", zone), &rows);
        }

        // Broadcom BMEM heaps
        if self.platform == Platform::Broadcom {
            let rows: Vec<Vec<ReportItem>> = data
                .bmem
                .iter()
                .map(|(region, measurement)| {
                    vec![
                        ReportItem::label("Region", region.as_str()),
                        ReportItem::metric(measurement.clone()),
                    ]
                })
                .collect();
            report.add_dataset("BMEM", &rows);

            let bmem_sum: f64 = data.bmem.values().map(|m| m.average()).sum();
            report.add_to_accumulated_memory_usage(bmem_sum);
        }
    }
}

impl Drop for MemoryMetric {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop_collection();
        }

        if self.platform.supports_memory_bandwidth() && Path::new(AML_DDR_MODE).exists() {
            let _ = fs::write(AML_DDR_MODE, "0");
        }
    }
}

fn collect_linux_memory(meminfo: &MemInfo, data: &mut MemoryData) {
    let points: &[(&str, u64)] = &[
        ("Total", meminfo.total_kb),
        ("Used", meminfo.used_kb),
        ("Buffered", meminfo.buffers_kb),
        ("Cached", meminfo.cached_kb),
        ("Free", meminfo.free_kb),
        ("Available", meminfo.available_kb),
        ("Slab Total", meminfo.slab_kb),
        ("Slab Reclaimable", meminfo.slab_reclaimable_kb),
        ("Slab Unreclaimable", meminfo.slab_unreclaimable_kb),
        ("Swap Used", meminfo.swap_used_kb()),
    ];

    for (category, value) in points {
        if let Some(measurement) = data.linux.get_mut(category) {
            measurement.add_data_point(*value as f64);
        }
    }
}

/// CMA region usage from the kernel debug tree. `count` and `used` report
/// pages; sizes are stored in kB.
fn collect_cma(
    platform: Platform,
    page_size: u64,
    meminfo: &MemInfo,
    cma_root: &Path,
    data: &mut MemoryData,
) {
    let entries = match fs::read_dir(cma_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to open CMA debug directory: {}", e);
            return;
        }
    };

    let mut total_kb = 0.0f64;
    let mut total_used_kb = 0.0f64;
    let mut found_any = false;

    for entry in entries.flatten() {
        let dir_name = entry.file_name().to_string_lossy().to_string();

        let region = match platform.cma_region_name(&dir_name) {
            Some(name) => name,
            None => {
                error!("Could not find CMA name for directory {}", dir_name);
                continue;
            }
        };

        let count_pages = read_number(&entry.path().join("count")).unwrap_or(0);
        let used_pages = read_number(&entry.path().join("used")).unwrap_or(0);

        let size_kb = (count_pages * page_size) as f64 / 1024.0;
        let used_kb = (used_pages * page_size) as f64 / 1024.0;
        let unused_kb = size_kb - used_kb;

        total_kb += size_kb;
        total_used_kb += used_kb;
        found_any = true;

        match data.cma.get_mut(region) {
            Some(cma) => {
                cma.size_kb = size_kb as i64;
                cma.used.add_data_point(used_kb);
                cma.unused.add_data_point(unused_kb);
            }
            None => {
                let mut used = Measurement::new("Used KB");
                used.add_data_point(used_kb);
                let mut unused = Measurement::new("Unused KB");
                unused.add_data_point(unused_kb);

                data.cma.insert(
                    region.to_string(),
                    CmaMeasurement {
                        size_kb: size_kb as i64,
                        used,
                        unused,
                    },
                );
            }
        }
    }

    if !found_any {
        return;
    }

    // Under memory pressure the kernel borrows unused CMA pages for movable
    // allocations; the shortfall against CmaFree is that borrowed amount.
    data.cma_free.add_data_point(meminfo.cma_free_kb as f64);

    let total_unused = total_kb - total_used_kb;
    let borrowed = total_unused - meminfo.cma_free_kb as f64;
    data.cma_borrowed.add_data_point(borrowed);
}

fn collect_gpu(platform: Platform, page_size: u64, proc_root: &Path, data: &mut MemoryData) {
    match platform {
        Platform::Amlogic | Platform::Amlogic950d4 => {
            collect_gpu_mali(Path::new(MALI_GPU_MEMORY), proc_root, data, |line| {
                parse_amlogic_gpu_line(line).map(|(pid, pages)| (pid, pages * page_size))
            });
        }
        Platform::Realtek | Platform::Realtek64 => {
            collect_gpu_mali(Path::new(MALI_GPU_MEMORY), proc_root, data, |line| {
                parse_realtek_gpu_line(line).map(|(pid, pages)| (pid, pages * page_size))
            });
        }
        Platform::Broadcom => collect_gpu_broadcom(Path::new(DRI_DEBUG_ROOT), proc_root, data),
    }
}

/// Shared walk over the two Mali gpu_memory flavours: one allocation line
/// per kernel context, attributed to a PID.
fn collect_gpu_mali(
    gpu_memory: &Path,
    proc_root: &Path,
    data: &mut MemoryData,
    parse_line: impl Fn(&str) -> Option<(i32, u64)>,
) {
    let content = match fs::read_to_string(gpu_memory) {
        Ok(c) => c,
        Err(_) => {
            warn!("Could not open gpu_memory file");
            return;
        }
    };

    for line in content.lines() {
        if let Some((pid, bytes)) = parse_line(line) {
            record_gpu_usage(data, proc_root, pid, bytes as f64 / 1024.0);
        }
    }
}

/// Broadcom exposes GPU allocations as one `client` file per allocating
/// thread under the DRI debug tree; directory names are `<tid>-<hex>` and
/// the tid is resolved to its thread group leader for correlation.
fn collect_gpu_broadcom(dri_root: &Path, proc_root: &Path, data: &mut MemoryData) {
    let entries = match fs::read_dir(dri_root) {
        Ok(entries) => entries,
        Err(_) => {
            warn!("Could not open {}", dri_root.display());
            return;
        }
    };

    for entry in entries.flatten() {
        let dir_name = entry.file_name().to_string_lossy().to_string();
        let tid = match dir_name.split('-').next().and_then(|t| t.parse::<i32>().ok()) {
            Some(tid) => tid,
            None => continue,
        };

        let client = entry.path().join("client");
        let content = match fs::read_to_string(&client) {
            Ok(c) => c,
            Err(_) => {
                warn!("Could not open gpu_memory file {}", client.display());
                continue;
            }
        };

        for line in content.lines() {
            if let Some(bytes) = parse_broadcom_client_line(line) {
                let pid = tid_to_parent_pid(proc_root, tid).unwrap_or(-1);
                record_gpu_usage(data, proc_root, pid, bytes as f64 / 1024.0);
            }
        }
    }
}

fn record_gpu_usage(data: &mut MemoryData, proc_root: &Path, pid: i32, used_kb: f64) {
    match data.gpu.get_mut(&pid) {
        Some(gpu) => gpu.used.add_data_point(used_kb),
        None => {
            let snapshot = ProcessSnapshot::capture(proc_root, pid);
            let mut used = Measurement::new("Memory Usage KB");
            used.add_data_point(used_kb);
            data.gpu.insert(pid, GpuMeasurement { snapshot, used });
        }
    }
}

/// Report memory usage of each cgroup under the v1 memory controller.
/// Not every cgroup is a container, but on these builds the mapping holds
/// apart from the fixed system entries.
fn collect_containers(cgroup_root: &Path, data: &mut MemoryData) {
    let entries = match fs::read_dir(cgroup_root) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if CONTAINER_IGNORE_LIST.contains(&name.as_str()) {
            continue;
        }

        let usage_bytes = match read_number(&entry.path().join("memory.usage_in_bytes")) {
            Some(v) => v,
            None => continue,
        };
        let usage_kb = usage_bytes as f64 / 1024.0;

        match data.containers.get_mut(&name) {
            Some(measurement) => measurement.add_data_point(usage_kb),
            None => {
                let mut measurement = Measurement::new("Memory Used KB");
                measurement.add_data_point(usage_kb);
                data.containers.insert(name, measurement);
            }
        }
    }
}

fn collect_bandwidth(platform: Platform, data: &mut MemoryData) {
    if !platform.supports_memory_bandwidth() {
        return;
    }

    let content = match fs::read_to_string(AML_DDR_BANDWIDTH) {
        Ok(c) => c,
        Err(_) => {
            warn!("Cannot get DDR usage");
            return;
        }
    };

    for line in content.lines() {
        if let Some(kbps) = parse_bandwidth_line(line) {
            if kbps != 0 {
                data.bandwidth.add_data_point(kbps as f64);
            }
        }
    }
}

fn collect_bmem(core_info: &Path, data: &mut MemoryData) {
    let content = match fs::read_to_string(core_info) {
        Ok(c) => c,
        Err(_) => {
            warn!("Could not open {}", core_info.display());
            return;
        }
    };

    for line in content.lines() {
        if let Some((region, usage_kb)) = parse_bmem_line(line) {
            match data.bmem.get_mut(&region) {
                Some(measurement) => measurement.add_data_point(usage_kb),
                None => {
                    let mut measurement = Measurement::new("Memory Usage (KB)");
                    measurement.add_data_point(usage_kb);
                    data.bmem.insert(region, measurement);
                }
            }
        }
    }
}

fn collect_fragmentation(platform: Platform, buddyinfo: &Path, data: &mut MemoryData) {
    let content = match fs::read_to_string(buddyinfo) {
        Ok(c) => c,
        Err(_) => {
            warn!("Could not open buddyinfo");
            return;
        }
    };

    for line in content.lines() {
        let (zone, free_pages) =
            match parse_buddyinfo_line(line, platform.buddyinfo_columns()) {
                Some(parsed) => parsed,
                None => continue,
            };

        let percentages = fragmentation_percentages(&free_pages);

        match data.fragmentation.get_mut(&zone) {
            Some(orders) => {
                for (order, measurement) in orders.iter_mut().enumerate() {
                    measurement
                        .free_pages
                        .add_data_point(free_pages[order] as f64);
                    measurement
                        .fragmentation
                        .add_data_point(percentages[order] * 100.0);
                }
            }
            None => {
                let mut orders = Vec::with_capacity(free_pages.len());
                for order in 0..free_pages.len() {
                    let mut free = Measurement::new("Free Pages");
                    free.add_data_point(free_pages[order] as f64);

                    let mut frag = Measurement::new("Fragmentation %");
                    frag.add_data_point(percentages[order] * 100.0);

                    orders.push(FragmentationMeasurement {
                        free_pages: free,
                        fragmentation: frag,
                    });
                }
                data.fragmentation.insert(zone, orders);
            }
        }
    }
}

/// Parse one buddyinfo zone line into (zone name, free pages per order).
///
/// Format: `Node 0, zone   Normal   210  167   92 ...` with one count per
/// buddy order. A column count other than the platform's expected one means
/// a kernel we don't understand; the line is skipped with a warning.
fn parse_buddyinfo_line(line: &str, expected_columns: usize) -> Option<(String, Vec<u64>)> {
    if !line.starts_with("Node") {
        return None;
    }

    let segments: Vec<&str> = line.split_whitespace().collect();
    if segments.len() != expected_columns {
        warn!(
            "Failed to parse buddyinfo - invalid number of columns (got {}, expected {})",
            segments.len(),
            expected_columns
        );
        return None;
    }

    let zone = segments[3].to_string();
    let free_pages = segments[4..]
        .iter()
        .map(|s| s.parse().unwrap_or(0))
        .collect();

    Some((zone, free_pages))
}

/// Fragmentation fraction per order: the share of free memory that sits in
/// blocks too small to satisfy an allocation of that order.
fn fragmentation_percentages(free_pages: &[u64]) -> Vec<f64> {
    let total_free: f64 = free_pages
        .iter()
        .enumerate()
        .map(|(order, &count)| (1u64 << order) as f64 * count as f64)
        .sum();

    if total_free == 0.0 {
        return vec![0.0; free_pages.len()];
    }

    (0..free_pages.len())
        .map(|order| {
            let available: f64 = free_pages
                .iter()
                .enumerate()
                .skip(order)
                .map(|(j, &count)| (1u64 << j) as f64 * count as f64)
                .sum();
            (total_free - available) / total_free
        })
        .collect()
}

/// Amlogic gpu_memory allocation line: `<kctx-addr-hex> <pid> <used_pages>`.
fn parse_amlogic_gpu_line(line: &str) -> Option<(i32, u64)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 3 {
        return None;
    }

    if !tokens[0].chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let pid = tokens[1].parse().ok()?;
    let pages = tokens[2].parse().ok()?;
    Some((pid, pages))
}

/// Realtek gpu_memory allocation line: `kctx-0x<addr> <used_pages> <pid>`.
fn parse_realtek_gpu_line(line: &str) -> Option<(i32, u64)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 3 || !tokens[0].starts_with("kctx-0x") {
        return None;
    }

    let pages = tokens[1].parse().ok()?;
    let pid = tokens[2].parse().ok()?;
    Some((pid, pages))
}

/// Broadcom DRI client line: `<name> <objects> <virtual><unit> ...`,
/// e.g. `SkyBrowserLaunc 2 4096KB 0KB 4MB`. Returns the virtual size in
/// bytes.
fn parse_broadcom_client_line(line: &str) -> Option<u64> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }

    // Second column must be a plain object count; this rejects the header
    tokens[1].parse::<u64>().ok()?;

    let virtual_mem = tokens[2];
    let digits_end = virtual_mem
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(virtual_mem.len());
    let value: u64 = virtual_mem[..digits_end].parse().ok()?;

    match &virtual_mem[digits_end..] {
        "KB" => Some(value * 1024),
        "MB" => Some(value * 1024 * 1024),
        "GB" => Some(value * 1024 * 1024 * 1024),
        _ => {
            warn!("Could not parse this line: '{}'", line);
            None
        }
    }
}

/// Amlogic DDR counter line: `Total bandwidth: <n> KB/s, usage: <p>%`.
fn parse_bandwidth_line(line: &str) -> Option<u64> {
    line.strip_prefix("Total bandwidth:")?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Broadcom core info heap line; yields (region name, used kB).
///
/// The file reports each heap's size in MB and its usage as a percentage:
/// `0 MEM 0 e 512 MB 76% 51% GFX`.
fn parse_bmem_line(line: &str) -> Option<(String, f64)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 9 {
        return None;
    }

    tokens[0].parse::<i64>().ok()?;
    tokens[2].parse::<i64>().ok()?;
    let size_mb: f64 = tokens[4].parse().ok()?;
    let usage_percent: f64 = tokens[6].strip_suffix('%')?.parse().ok()?;
    tokens[7].strip_suffix('%')?;
    let region = tokens[8].to_string();

    let usage_kb = size_mb * (usage_percent / 100.0) * 1024.0;
    Some((region, usage_kb))
}

/// Resolve a thread id to its thread group leader via the Tgid line of the
/// thread's status file.
fn tid_to_parent_pid(proc_root: &Path, tid: i32) -> Option<i32> {
    let status = proc_root.join(tid.to_string()).join("status");
    let content = match fs::read_to_string(&status) {
        Ok(c) => c,
        Err(_) => {
            warn!("Failed to open file {}", status.display());
            return None;
        }
    };

    for line in content.lines() {
        if let Some(v) = line.strip_prefix("Tgid:") {
            return v.trim().parse().ok();
        }
    }

    None
}

/// Read a file containing a single integer.
fn read_number(path: &Path) -> Option<u64> {
    fs::read_to_string(path)
        .ok()?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}
