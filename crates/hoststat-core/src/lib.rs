//! hoststat-core - shared library for the hoststat collector.
//!
//! Provides:
//! - `collector` - `/proc` counter readers and the delta sampler
//! - `storage` - record model, frame codec, append-only log writer/reader, queries
//! - `scheduler` - cancellable periodic task driving sample-then-append ticks
//! - `util` - helper utilities (time parsing for query bounds)

pub mod collector;
pub mod scheduler;
pub mod storage;
pub mod util;

/// Crate version, shared by the binaries for `--version` and startup logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
