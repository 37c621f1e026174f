//! Host counter sampling.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                    Sampler                    │
//! │  t0: disks, network, cpu                      │
//! │  ── measurement window (1 s) ──               │
//! │  t1: cpu, memory, disks, network              │
//! │  => TelemetryRecord (deltas t1 - t0)          │
//! └───────────────────────┬───────────────────────┘
//!                         │
//!                 ┌───────▼───────┐
//!                 │ ProcCounters  │  /proc/{stat,meminfo,diskstats,net/dev}
//!                 └───────┬───────┘
//!                         │
//!                 ┌───────▼───────┐
//!                 │  FileSystem   │ (trait)
//!                 └───────┬───────┘
//!              ┌──────────┴──────────┐
//!       ┌──────▼──────┐       ┌──────▼──────┐
//!       │   RealFs    │       │   MockFs    │
//!       │  (Linux)    │       │ (scenarios) │
//!       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use hoststat_core::collector::{RealFs, Sampler};
//!
//! let sampler = Sampler::new(RealFs::new(), "/proc");
//! let record = sampler.sample()?;
//! ```

pub mod mock;
pub mod procfs;
mod sampler;
mod traits;

pub use mock::MockFs;
pub use procfs::{CollectError, ProcCounters};
pub use sampler::{
    DEFAULT_WINDOW, Sampler, counter_delta, cpu_loads, disk_deltas, network_delta,
};
pub use traits::{FileSystem, RealFs};
