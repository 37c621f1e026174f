//! Counter readers for the Linux `/proc` filesystem.

mod counters;
pub mod parser;

pub use counters::{
    CollectError, CpuTimes, DiskCounters, NetworkCounters, ProcCounters, SECTOR_SIZE,
};
