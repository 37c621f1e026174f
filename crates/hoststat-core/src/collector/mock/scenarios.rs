//! Pre-built mock filesystem scenarios for testing.
//!
//! Counter files carry two readings, one for each edge of the sampler's
//! measurement window. The expected deltas are spelled out next to each file.

use super::filesystem::MockFs;

/// Readings of `/proc/stat` at window start and end.
///
/// cpu0: busy +75 of +100 ticks (75.00 %), cpu1: busy +10 of +100 ticks (10.00 %).
const STAT_BEFORE: &str = "\
cpu  3000 0 1500 14000 1500 0 0 0 0 0
cpu0 1000 0 500 8000 500 0 0 0 0 0
cpu1 2000 0 1000 6000 1000 0 0 0 0 0
intr 1000000 50 0 0
ctxt 500000
btime 1700000000
processes 12345
";
const STAT_AFTER: &str = "\
cpu  3060 0 1525 14115 1500 0 0 0 0 0
cpu0 1050 0 525 8025 500 0 0 0 0 0
cpu1 2010 0 1000 6090 1000 0 0 0 0 0
intr 1000100 50 0 0
ctxt 500100
btime 1700000000
processes 12350
";

/// sda: +200 sectors read, +100 written. nvme0n1: +8 read. loop0 never used.
const DISKSTATS_BEFORE: &str = "\
   7       0 loop0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
   8       0 sda 100 0 2000 100 50 0 1000 200 0 150 300 0 0 0 0
 259       0 nvme0n1 10 0 80 5 0 0 0 0 0 5 5 0 0 0 0
";
const DISKSTATS_AFTER: &str = "\
   7       0 loop0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
   8       0 sda 110 0 2200 110 55 0 1100 210 0 160 320 0 0 0 0
 259       0 nvme0n1 11 0 88 6 0 0 0 0 0 6 6 0 0 0 0
";

/// Totals over all interfaces: +10500 received, +3500 sent.
const NET_DEV_BEFORE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:    1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0:   50000     500    0    0    0     0          0         0    20000     200    0    0    0     0       0          0
";
const NET_DEV_AFTER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:    1500      15    0    0    0     0          0         0     1500      15    0    0    0     0       0          0
  eth0:   60000     600    0    0    0     0          0         0    23000     230    0    0    0     0       0          0
";

/// used = 16384000 - 8192000 - 512000 - 2048000 - 256000 = 5376000 kB.
const MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
Slab:             512000 kB
SReclaimable:     256000 kB
";

impl MockFs {
    /// A two-core host with two disks and two interfaces under `/proc`.
    pub fn typical_host() -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/meminfo", MEMINFO);
        fs.add_file_sequence("/proc/stat", [STAT_BEFORE, STAT_AFTER]);
        fs.add_file_sequence("/proc/diskstats", [DISKSTATS_BEFORE, DISKSTATS_AFTER]);
        fs.add_file_sequence("/proc/net/dev", [NET_DEV_BEFORE, NET_DEV_AFTER]);
        fs
    }

    /// A host whose `nvme0n1` disappears during the window.
    pub fn with_unplugged_disk() -> Self {
        let mut fs = Self::typical_host();
        let after = DISKSTATS_AFTER
            .lines()
            .filter(|line| !line.contains("nvme0n1"))
            .collect::<Vec<_>>()
            .join("\n");
        fs.add_file_sequence("/proc/diskstats", [DISKSTATS_BEFORE.to_string(), after]);
        fs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::traits::FileSystem;
    use std::path::Path;

    #[test]
    fn test_typical_host_has_required_files() {
        let fs = MockFs::typical_host();
        for path in ["/proc/meminfo", "/proc/stat", "/proc/diskstats", "/proc/net/dev"] {
            assert!(fs.read_to_string(Path::new(path)).is_ok(), "{path} missing");
        }
    }

    #[test]
    fn test_unplugged_disk_gone_on_second_read() {
        let fs = MockFs::with_unplugged_disk();
        let path = Path::new("/proc/diskstats");
        assert!(fs.read_to_string(path).unwrap().contains("nvme0n1"));
        assert!(!fs.read_to_string(path).unwrap().contains("nvme0n1"));
    }
}
