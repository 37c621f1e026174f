//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait allows the sampler to work with both the real `/proc`
//! filesystem on Linux and mock implementations for tests on other platforms.

use std::io;
use std::path::Path;

/// Read access to counter files.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}
