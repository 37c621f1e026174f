//! Raw counter readings from `/proc`.
//!
//! Every method performs exactly one file read and returns cumulative
//! counters, except `read_memory` which returns an absolute snapshot.

use std::path::PathBuf;

use thiserror::Error;

use super::parser::{
    ParseError, parse_cpu_stat, parse_diskstats, parse_meminfo, parse_net_dev,
};
use crate::collector::traits::FileSystem;
use crate::storage::model::MemoryUsage;

/// Bytes per sector as reported by `/proc/diskstats`, independent of the device.
pub const SECTOR_SIZE: u64 = 512;

/// Error reading counters from `/proc`.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Cumulative tick counters of one core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub cpu_id: u32,
    pub busy: u64,
    pub total: u64,
}

/// Cumulative bytes transferred by one block device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskCounters {
    pub name: String,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Cumulative bytes over all interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Reads counter files below a proc root (normally `/proc`).
pub struct ProcCounters<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
}

impl<F: FileSystem> ProcCounters<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    fn read<T>(
        &self,
        file: &str,
        parse: impl FnOnce(&str) -> Result<T, ParseError>,
    ) -> Result<T, CollectError> {
        let path = self.proc_path.join(file);
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|source| CollectError::Io {
                path: path.clone(),
                source,
            })?;
        parse(&content).map_err(|source| CollectError::Parse { path, source })
    }

    /// Per-core tick counters from `stat`, in file order.
    pub fn read_cpu_times(&self) -> Result<Vec<CpuTimes>, CollectError> {
        let stats = self.read("stat", parse_cpu_stat)?;
        Ok(stats
            .iter()
            .filter_map(|stat| {
                stat.cpu_id.map(|cpu_id| CpuTimes {
                    cpu_id,
                    busy: stat.busy(),
                    total: stat.total(),
                })
            })
            .collect())
    }

    /// Memory snapshot from `meminfo`, in bytes.
    ///
    /// `used` excludes free memory, buffers and reclaimable caches.
    pub fn read_memory(&self) -> Result<MemoryUsage, CollectError> {
        let info = self.read("meminfo", parse_meminfo)?;
        let used_kb = info
            .mem_total
            .saturating_sub(info.mem_free)
            .saturating_sub(info.buffers)
            .saturating_sub(info.cached)
            .saturating_sub(info.s_reclaimable);
        Ok(MemoryUsage {
            used: used_kb.saturating_mul(1024),
            free: info.mem_free.saturating_mul(1024),
        })
    }

    /// Per-device byte counters from `diskstats`.
    ///
    /// Devices that never completed a read or a write are skipped.
    pub fn read_disks(&self) -> Result<Vec<DiskCounters>, CollectError> {
        let stats = self.read("diskstats", parse_diskstats)?;
        Ok(stats
            .into_iter()
            .filter(|disk| disk.reads != 0 || disk.writes != 0)
            .map(|disk| DiskCounters {
                name: disk.device,
                read_bytes: disk.read_sectors.saturating_mul(SECTOR_SIZE),
                write_bytes: disk.write_sectors.saturating_mul(SECTOR_SIZE),
            })
            .collect())
    }

    /// Byte counters from `net/dev`, summed over interfaces.
    pub fn read_network(&self) -> Result<NetworkCounters, CollectError> {
        let devices = self.read("net/dev", parse_net_dev)?;
        Ok(devices
            .iter()
            .fold(NetworkCounters::default(), |acc, dev| NetworkCounters {
                bytes_sent: acc.bytes_sent.wrapping_add(dev.tx_bytes),
                bytes_received: acc.bytes_received.wrapping_add(dev.rx_bytes),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    #[test]
    fn test_read_cpu_times_skips_aggregate() {
        let counters = ProcCounters::new(MockFs::typical_host(), "/proc");
        let cpus = counters.read_cpu_times().unwrap();

        assert_eq!(cpus.len(), 2);
        assert_eq!(
            cpus[0],
            CpuTimes {
                cpu_id: 0,
                busy: 1500,
                total: 10000
            }
        );
        assert_eq!(cpus[1].cpu_id, 1);
        assert_eq!(cpus[1].busy, 3000);
    }

    #[test]
    fn test_read_memory_in_bytes() {
        let counters = ProcCounters::new(MockFs::typical_host(), "/proc");
        let mem = counters.read_memory().unwrap();

        assert_eq!(mem.used, 5_376_000 * 1024);
        assert_eq!(mem.free, 8_192_000 * 1024);
    }

    #[test]
    fn test_read_disks_skips_idle_devices() {
        let counters = ProcCounters::new(MockFs::typical_host(), "/proc");
        let disks = counters.read_disks().unwrap();

        let names: Vec<_> = disks.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["sda", "nvme0n1"]);
        assert_eq!(disks[0].read_bytes, 2000 * 512);
        assert_eq!(disks[0].write_bytes, 1000 * 512);
    }

    #[test]
    fn test_read_network_sums_interfaces() {
        let counters = ProcCounters::new(MockFs::typical_host(), "/proc");
        let net = counters.read_network().unwrap();

        assert_eq!(net.bytes_received, 51000);
        assert_eq!(net.bytes_sent, 21000);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let mut fs = MockFs::typical_host();
        fs.remove_file("/proc/meminfo");
        let counters = ProcCounters::new(fs, "/proc");

        let err = counters.read_memory().unwrap_err();
        assert!(matches!(err, CollectError::Io { .. }));
        assert!(err.to_string().contains("/proc/meminfo"));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let mut fs = MockFs::typical_host();
        fs.add_file("/proc/stat", "intr 1 2 3\n");
        let counters = ProcCounters::new(fs, "/proc");

        assert!(matches!(
            counters.read_cpu_times(),
            Err(CollectError::Parse { .. })
        ));
    }
}
