use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;

use hoststat_core::storage::query::{self, render};
use hoststat_core::storage::{LogReader, LogSummary, OutputFormat, TelemetryRecord, TimeRange};
use hoststat_core::util::parse_time;

/// Exit status when the log has a damaged frame. Records before it were still written.
const EXIT_DAMAGED: u8 = 2;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "hoststat-query", about = "Query hoststat telemetry logs", version)]
struct Cli {
    /// Log file to read
    #[arg(default_value = "stats.log")]
    path: PathBuf,

    /// Earliest timestamp to include (unix seconds, ISO 8601, or relative like -1h)
    #[arg(long, allow_hyphen_values = true, value_parser = parse_bound)]
    since: Option<u64>,

    /// Latest timestamp to include (same forms as --since)
    #[arg(long, allow_hyphen_values = true, value_parser = parse_bound)]
    until: Option<u64>,

    /// Output format: json (default) or binary
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Describe the log instead of printing records (text, or JSON with --format json)
    #[arg(long)]
    summary: bool,
}

fn parse_bound(s: &str) -> Result<u64, String> {
    parse_time(s).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let reader = LogReader::new(&cli.path);

    if cli.summary {
        summarize(&reader, &cli)
    } else {
        dump_records(&reader, &cli)
    }
}

// ── Formatting helpers ───────────────────────────────────────────────────────

fn human_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= GIB {
        format!("{:.1} GiB", b / GIB)
    } else if b >= MIB {
        format!("{:.1} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.1} KiB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn fmt_ts(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn write_output(path: Option<&Path>, body: &[u8]) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, body),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(body)?;
            stdout.flush()
        }
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

fn encode_records(
    records: &[TelemetryRecord],
    format: OutputFormat,
    pretty: bool,
) -> serde_json::Result<Vec<u8>> {
    match format {
        OutputFormat::Json if pretty => serde_json::to_vec_pretty(records),
        _ => render(records, format),
    }
}

fn dump_records(reader: &LogReader, cli: &Cli) -> ExitCode {
    let range = TimeRange::new(cli.since, cli.until);
    let result = match query::query(reader, range) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let format = cli.format.unwrap_or_default();
    let mut body = match encode_records(&result.records, format, cli.pretty) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error encoding records: {e}");
            return ExitCode::FAILURE;
        }
    };
    if format == OutputFormat::Json && cli.output.is_none() {
        body.push(b'\n');
    }

    if let Err(e) = write_output(cli.output.as_deref(), &body) {
        eprintln!("Error writing output: {e}");
        return ExitCode::FAILURE;
    }

    match result.error {
        Some(e) => {
            eprintln!(
                "Warning: {} ({} records before the damage were written)",
                e,
                result.records.len()
            );
            ExitCode::from(EXIT_DAMAGED)
        }
        None => ExitCode::SUCCESS,
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SummaryJson {
    file: String,
    file_size: u64,
    records: u64,
    first_timestamp: Option<u64>,
    last_timestamp: Option<u64>,
    valid_bytes: u64,
    damaged_bytes: u64,
    error: Option<String>,
}

impl SummaryJson {
    fn new(path: &Path, summary: &LogSummary) -> Self {
        Self {
            file: path.display().to_string(),
            file_size: summary.file_len,
            records: summary.records,
            first_timestamp: summary.first_timestamp,
            last_timestamp: summary.last_timestamp,
            valid_bytes: summary.valid_bytes,
            damaged_bytes: summary.damaged_bytes(),
            error: summary.error.as_ref().map(ToString::to_string),
        }
    }
}

fn summary_text(path: &Path, summary: &LogSummary) -> String {
    let mut out = format!(
        "File: {} ({})\nRecords: {}\n",
        path.display(),
        human_bytes(summary.file_len),
        summary.records
    );
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        out.push_str(&format!(
            "Time range: {} .. {} UTC ({}s)\n",
            fmt_ts(first),
            fmt_ts(last),
            last.saturating_sub(first)
        ));
    }
    if summary.records > 0 {
        out.push_str(&format!(
            "Avg frame: {}\n",
            human_bytes(summary.valid_bytes / summary.records)
        ));
    }
    if let Some(e) = &summary.error {
        out.push_str(&format!(
            "Damaged tail: {} after offset {} ({e})\n",
            human_bytes(summary.damaged_bytes()),
            summary.valid_bytes
        ));
    }
    out
}

fn summarize(reader: &LogReader, cli: &Cli) -> ExitCode {
    let summary = match reader.scan() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let body = match cli.format {
        Some(OutputFormat::Json) => {
            let json = SummaryJson::new(reader.path(), &summary);
            let encoded = if cli.pretty {
                serde_json::to_string_pretty(&json)
            } else {
                serde_json::to_string(&json)
            };
            match encoded {
                Ok(s) => s + "\n",
                Err(e) => {
                    eprintln!("Error encoding summary: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        Some(OutputFormat::Binary) => {
            eprintln!("Error: --summary supports text or json output only");
            return ExitCode::FAILURE;
        }
        None => summary_text(reader.path(), &summary),
    };

    if let Err(e) = write_output(cli.output.as_deref(), body.as_bytes()) {
        eprintln!("Error writing output: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoststat_core::storage::LogWriter;
    use tempfile::tempdir;

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(1023), "1023 B");
        assert_eq!(human_bytes(1536), "1.5 KiB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(human_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn fmt_ts_renders_utc() {
        assert_eq!(fmt_ts(0), "1970-01-01 00:00:00");
        assert_eq!(fmt_ts(1_738_944_000), "2025-02-07 16:00:00");
        assert_eq!(fmt_ts(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn cli_accepts_relative_and_format() {
        let cli = Cli::try_parse_from([
            "hoststat-query",
            "data.log",
            "--since",
            "-1h",
            "--until",
            "1738944000",
            "--format",
            "proto",
        ])
        .unwrap();
        assert_eq!(cli.path, PathBuf::from("data.log"));
        assert!(cli.since.is_some());
        assert_eq!(cli.until, Some(1_738_944_000));
        assert_eq!(cli.format, Some(OutputFormat::Binary));

        assert!(Cli::try_parse_from(["hoststat-query", "--format", "xml"]).is_err());
        assert!(Cli::try_parse_from(["hoststat-query", "--since", "yesterday"]).is_err());
    }

    #[test]
    fn summary_describes_damage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.log");
        {
            let mut writer = LogWriter::open(&path).unwrap();
            for timestamp in [0, 60] {
                writer
                    .append_record(&TelemetryRecord {
                        timestamp,
                        ..TelemetryRecord::default()
                    })
                    .unwrap();
            }
            writer.append(&[0x80]).unwrap();
        }

        let summary = LogReader::new(&path).scan().unwrap();
        let text = summary_text(&path, &summary);
        assert!(text.contains("Records: 2"));
        assert!(text.contains("1970-01-01 00:00:00 .. 1970-01-01 00:01:00 UTC (60s)"));
        assert!(text.contains("Damaged tail: 1 B"));

        let json = serde_json::to_value(SummaryJson::new(&path, &summary)).unwrap();
        assert_eq!(json["records"], 2);
        assert_eq!(json["damaged_bytes"], 1);
        assert!(json["error"].is_string());
    }

    #[test]
    fn pretty_json_only_changes_layout() {
        let records = vec![TelemetryRecord {
            timestamp: 7,
            cpu_load: vec![50],
            ..TelemetryRecord::default()
        }];
        let compact = encode_records(&records, OutputFormat::Json, false).unwrap();
        let pretty = encode_records(&records, OutputFormat::Json, true).unwrap();
        let a: serde_json::Value = serde_json::from_slice(&compact).unwrap();
        let b: serde_json::Value = serde_json::from_slice(&pretty).unwrap();
        assert_eq!(a, b);
        assert!(pretty.len() > compact.len());
    }
}
