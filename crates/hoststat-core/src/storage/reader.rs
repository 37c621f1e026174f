//! Streaming log reader.
//!
//! `LogReader::read_all` reopens the log on every call and yields records
//! lazily, one frame at a time. A missing log reads as empty.
//!
//! Corruption policy: when a frame fails to decode, the iterator yields that
//! error once and then ends. Records yielded before the error are valid and
//! stay usable, so one damaged tail frame never hides the history before it.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::frame::{self, FrameError};
use crate::storage::model::TelemetryRecord;

/// Failure while reading the log back.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to open log {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    /// A frame starting at byte `offset` could not be decoded.
    #[error("corrupt frame at offset {offset}: {source}")]
    Frame { offset: u64, source: FrameError },
}

impl ReadError {
    /// Byte offset of the damaged frame, if the failure was a decode error.
    pub fn offset(&self) -> Option<u64> {
        match self {
            ReadError::Open { .. } => None,
            ReadError::Frame { offset, .. } => Some(*offset),
        }
    }
}

/// Reader for one log file.
#[derive(Debug, Clone)]
pub struct LogReader {
    path: PathBuf,
}

impl LogReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a fresh pass over the log from its first byte.
    pub fn read_all(&self) -> Result<Records<BufReader<File>>, ReadError> {
        match File::open(&self.path) {
            Ok(file) => Ok(Records::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Records::empty()),
            Err(source) => Err(ReadError::Open {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Walks the whole log and reports what it holds without keeping records.
    pub fn scan(&self) -> Result<LogSummary, ReadError> {
        let file_len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(source) => {
                return Err(ReadError::Open {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let mut summary = LogSummary {
            file_len,
            ..LogSummary::default()
        };
        let mut records = self.read_all()?;
        for item in records.by_ref() {
            match item {
                Ok(record) => {
                    summary.records += 1;
                    summary.first_timestamp.get_or_insert(record.timestamp);
                    summary.last_timestamp = Some(record.timestamp);
                }
                Err(e) => summary.error = Some(e),
            }
        }
        summary.valid_bytes = records.offset();
        Ok(summary)
    }
}

/// Result of `LogReader::scan`.
#[derive(Debug, Default)]
pub struct LogSummary {
    pub records: u64,
    pub first_timestamp: Option<u64>,
    pub last_timestamp: Option<u64>,
    /// Bytes covered by successfully decoded frames.
    pub valid_bytes: u64,
    pub file_len: u64,
    pub error: Option<ReadError>,
}

impl LogSummary {
    /// Bytes after the last valid frame.
    pub fn damaged_bytes(&self) -> u64 {
        self.file_len.saturating_sub(self.valid_bytes)
    }
}

/// Lazy record sequence over any byte stream of concatenated frames.
pub struct Records<R> {
    reader: Option<R>,
    offset: u64,
}

impl<R: Read> Records<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
            offset: 0,
        }
    }

    fn empty() -> Self {
        Self {
            reader: None,
            offset: 0,
        }
    }

    /// Byte offset just past the last successfully decoded frame.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: Read> Iterator for Records<R> {
    type Item = Result<TelemetryRecord, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        match frame::read_frame(reader) {
            Ok(Some((record, consumed))) => {
                self.offset += consumed as u64;
                Some(Ok(record))
            }
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(source) => {
                self.reader = None;
                Some(Err(ReadError::Frame {
                    offset: self.offset,
                    source,
                }))
            }
        }
    }
}

impl<R: Read> FusedIterator for Records<R> {}
