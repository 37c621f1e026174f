//! Telemetry record model.
//!
//! One `TelemetryRecord` is produced per sampler tick and stored as one frame
//! in the log. Disk and network figures are deltas over the sampler's
//! measurement window, memory figures are absolute snapshots.

use serde::{Deserialize, Serialize};

/// Fixed-point scale for CPU load: percentage × 100.
pub const CPU_LOAD_SCALE: u32 = 100;

/// Largest valid CPU load value (100 %).
pub const MAX_CPU_LOAD: u32 = 100 * CPU_LOAD_SCALE;

/// One host telemetry sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Seconds since epoch at sample completion.
    pub timestamp: u64,
    /// Per-core utilization, percentage × 100.
    pub cpu_load: Vec<u32>,
    pub memory: MemoryUsage,
    /// Per-disk throughput over the measurement window. Names are unique.
    pub disks: Vec<DiskIo>,
    pub network: NetworkIo,
}

/// Absolute memory snapshot in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used: u64,
    pub free: u64,
}

/// Bytes read and written by one disk during the measurement window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskIo {
    pub name: String,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Bytes sent and received across all interfaces during the measurement window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIo {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl TelemetryRecord {
    /// Checks field ranges a decoded record must satisfy.
    pub fn validate(&self) -> Result<(), String> {
        if let Some((core, load)) = self
            .cpu_load
            .iter()
            .enumerate()
            .find(|(_, load)| **load > MAX_CPU_LOAD)
        {
            return Err(format!(
                "cpu load {} on core {} exceeds {}",
                load, core, MAX_CPU_LOAD
            ));
        }

        let mut seen = std::collections::HashSet::with_capacity(self.disks.len());
        for disk in &self.disks {
            if !seen.insert(disk.name.as_str()) {
                return Err(format!("duplicate disk name '{}'", disk.name));
            }
        }

        Ok(())
    }
}
