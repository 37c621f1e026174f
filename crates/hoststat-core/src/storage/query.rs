//! Time-range queries over the log and their two output encodings.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::frame;
use crate::storage::model::TelemetryRecord;
use crate::storage::reader::{LogReader, ReadError};

/// Inclusive `[since, until]` window. Absent bounds impose no constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub since: Option<u64>,
    pub until: Option<u64>,
}

impl TimeRange {
    pub fn new(since: Option<u64>, until: Option<u64>) -> Self {
        Self { since, until }
    }

    /// Window with no bounds.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        self.since.is_none_or(|since| timestamp >= since)
            && self.until.is_none_or(|until| timestamp <= until)
    }
}

/// Keeps records inside `range`, preserving input order.
pub fn filter<I>(records: I, range: TimeRange) -> impl Iterator<Item = TelemetryRecord>
where
    I: IntoIterator<Item = TelemetryRecord>,
{
    records
        .into_iter()
        .filter(move |record| range.contains(record.timestamp))
}

/// Records matching a query, plus the decode error that cut the read short, if any.
#[derive(Debug)]
pub struct QueryResult {
    pub records: Vec<TelemetryRecord>,
    pub error: Option<ReadError>,
}

impl QueryResult {
    /// `true` when the whole log decoded cleanly.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

}

/// Reads the log and keeps the records inside `range`.
///
/// Opening failures are returned as `Err`. A decode failure mid-log ends the
/// read: the matching records decoded before it are returned together with
/// the error.
pub fn query(reader: &LogReader, range: TimeRange) -> Result<QueryResult, ReadError> {
    let mut error = None;
    let mut scanned = 0usize;

    let decoded = reader.read_all()?.map_while(|item| match item {
        Ok(record) => {
            scanned += 1;
            Some(record)
        }
        Err(e) => {
            warn!(
                path = %reader.path().display(),
                offset = e.offset(),
                error = %e,
                "log read stopped at corrupt frame"
            );
            error = Some(e);
            None
        }
    });
    let records: Vec<_> = filter(decoded, range).collect();

    debug!(
        scanned,
        matched = records.len(),
        since = range.since,
        until = range.until,
        "query completed"
    );

    Ok(QueryResult { records, error })
}

/// Output encoding of a query result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON array of records.
    #[default]
    Json,
    /// Concatenated frames, same encoding as the log itself.
    Binary,
}

impl OutputFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json",
            OutputFormat::Binary => "application/octet-stream",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown output format '{0}' (expected json or binary)")]
pub struct UnknownFormat(String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "json" => Ok(OutputFormat::Json),
            "binary" | "proto" | "raw" => Ok(OutputFormat::Binary),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Binary => f.write_str("binary"),
        }
    }
}

/// Re-encodes records as concatenated frames.
pub fn encode_frames(records: &[TelemetryRecord]) -> Vec<u8> {
    let mut buf = Vec::new();
    for record in records {
        frame::encode_into(record, &mut buf);
    }
    buf
}

/// Serializes records in the requested format.
pub fn render(records: &[TelemetryRecord], format: OutputFormat) -> serde_json::Result<Vec<u8>> {
    match format {
        OutputFormat::Json => serde_json::to_vec(records),
        OutputFormat::Binary => Ok(encode_frames(records)),
    }
}
