//! Delta-based sampling of host counters.
//!
//! A sample brackets a short measurement window: cumulative counters are
//! read before and after it, and the record carries the difference. The
//! window is independent of how often samples are taken.

use std::collections::HashSet;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;

use super::procfs::{CollectError, CpuTimes, DiskCounters, NetworkCounters, ProcCounters};
use super::traits::FileSystem;
use crate::storage::model::{DiskIo, MAX_CPU_LOAD, NetworkIo, TelemetryRecord};

/// Default measurement window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Produces one `TelemetryRecord` per call to [`Sampler::sample`].
pub struct Sampler<F: FileSystem> {
    counters: ProcCounters<F>,
    window: Duration,
}

impl<F: FileSystem> Sampler<F> {
    /// Creates a sampler reading counters below `proc_path`.
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            counters: ProcCounters::new(fs, proc_path),
            window: DEFAULT_WINDOW,
        }
    }

    /// Overrides the measurement window. A zero window skips the wait.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Takes one sample. Blocks for the measurement window.
    ///
    /// Any failed counter read discards the whole sample.
    pub fn sample(&self) -> Result<TelemetryRecord, CollectError> {
        let start = Instant::now();

        let disks_before = self.counters.read_disks()?;
        let net_before = self.counters.read_network()?;
        let cpu_before = self.counters.read_cpu_times()?;

        if !self.window.is_zero() {
            thread::sleep(self.window);
        }

        let cpu_after = self.counters.read_cpu_times()?;
        let memory = self.counters.read_memory()?;
        let disks_after = self.counters.read_disks()?;
        let net_after = self.counters.read_network()?;

        let record = TelemetryRecord {
            timestamp: unix_now(),
            cpu_load: cpu_loads(&cpu_before, &cpu_after),
            memory,
            disks: disk_deltas(&disks_before, &disks_after),
            network: network_delta(net_before, net_after),
        };

        debug!(
            cores = record.cpu_load.len(),
            disks = record.disks.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "sample taken"
        );

        Ok(record)
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

/// Difference of two cumulative readings. A counter that went backwards yields 0.
pub fn counter_delta(before: u64, after: u64) -> u64 {
    after.saturating_sub(before)
}

/// Per-disk deltas in `before` order.
///
/// A disk missing from `after` keeps its `before` cumulative reading.
/// Disks that appear only in `after` are ignored. Repeated names keep the
/// first occurrence.
pub fn disk_deltas(before: &[DiskCounters], after: &[DiskCounters]) -> Vec<DiskIo> {
    let mut seen = HashSet::with_capacity(before.len());
    before
        .iter()
        .filter(|disk| seen.insert(disk.name.as_str()))
        .map(|b| match after.iter().find(|a| a.name == b.name) {
            Some(a) => DiskIo {
                name: b.name.clone(),
                read_bytes: counter_delta(b.read_bytes, a.read_bytes),
                write_bytes: counter_delta(b.write_bytes, a.write_bytes),
            },
            None => DiskIo {
                name: b.name.clone(),
                read_bytes: b.read_bytes,
                write_bytes: b.write_bytes,
            },
        })
        .collect()
}

pub fn network_delta(before: NetworkCounters, after: NetworkCounters) -> NetworkIo {
    NetworkIo {
        bytes_sent: counter_delta(before.bytes_sent, after.bytes_sent),
        bytes_received: counter_delta(before.bytes_received, after.bytes_received),
    }
}

/// Per-core load in `after` order, percentage × 100.
///
/// Cores are matched by id. A core with no earlier reading, or with no
/// elapsed ticks, reports 0.
pub fn cpu_loads(before: &[CpuTimes], after: &[CpuTimes]) -> Vec<u32> {
    after
        .iter()
        .map(|a| {
            before
                .iter()
                .find(|b| b.cpu_id == a.cpu_id)
                .map_or(0, |b| cpu_load(b, a))
        })
        .collect()
}

fn cpu_load(before: &CpuTimes, after: &CpuTimes) -> u32 {
    let total = counter_delta(before.total, after.total);
    if total == 0 {
        return 0;
    }
    let busy = counter_delta(before.busy, after.busy);
    let load = u128::from(busy) * u128::from(MAX_CPU_LOAD) / u128::from(total);
    // bounded by MAX_CPU_LOAD, fits u32
    load.min(u128::from(MAX_CPU_LOAD)) as u32
}
