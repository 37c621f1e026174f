//! Append-only log writer.
//!
//! The log is opened with `O_APPEND`, so every write lands at end-of-file
//! regardless of other handles. A frame is written with one `write_all` from a
//! single buffer and synced before `append` returns. The writer is the only
//! appender: `append` takes `&mut self`, and the scheduler owns the writer and
//! never runs two ticks at once, so frames from different samples cannot
//! interleave. The file is never truncated and never seeked.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::storage::frame;
use crate::storage::model::TelemetryRecord;

pub struct LogWriter {
    path: PathBuf,
    file: File,
    frames_written: u64,
}

impl LogWriter {
    /// Opens `path` for appending, creating the file (and parent directories) if absent.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            frames_written: 0,
        })
    }

    /// Appends one already-encoded frame.
    pub fn append(&mut self, frame: &[u8]) -> io::Result<()> {
        self.file.write_all(frame)?;
        self.file.sync_data()?;
        self.frames_written += 1;
        debug!(bytes = frame.len(), path = %self.path.display(), "frame appended");
        Ok(())
    }

    /// Encodes `record` and appends it. Returns the frame size in bytes.
    pub fn append_record(&mut self, record: &TelemetryRecord) -> io::Result<usize> {
        let frame = frame::encode(record);
        self.append(&frame)?;
        Ok(frame.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of frames appended through this writer since it was opened.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
