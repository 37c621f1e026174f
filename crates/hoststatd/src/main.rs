//! hoststatd - host telemetry collector daemon.
//!
//! Samples CPU, memory, disk and network counters once per interval and
//! appends each sample as a frame to an append-only log.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(not(target_os = "linux"))]
use hoststat_core::collector::MockFs;
#[cfg(target_os = "linux")]
use hoststat_core::collector::RealFs;
use hoststat_core::collector::{FileSystem, Sampler};
use hoststat_core::scheduler::{CollectionJob, Scheduler};
use hoststat_core::storage::{LogReader, LogSummary, LogWriter};

/// Host telemetry collector daemon.
#[derive(Parser, Debug)]
#[command(name = "hoststatd", about = "Host telemetry collector daemon", version)]
struct Args {
    /// Collection interval in seconds.
    #[arg(
        short,
        long,
        default_value = "10",
        env = "HOSTSTAT_INTERVAL",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval: u64,

    /// Log file records are appended to.
    #[arg(short, long, default_value = "stats.log", env = "HOSTSTAT_LOG_FILE")]
    log_file: PathBuf,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: PathBuf,

    /// Measurement window for disk, network and CPU deltas, in milliseconds.
    #[arg(long, default_value = "1000")]
    window_ms: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["hoststatd", "hoststat_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// One-line description of an existing log for the startup banner.
fn describe_log(summary: &LogSummary) -> String {
    let mut desc = format!("{} records, {} bytes", summary.records, summary.file_len);
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        desc.push_str(&format!(", timestamps {}..{}", first, last));
    }
    if summary.error.is_some() {
        desc.push_str(&format!(", {} damaged tail bytes", summary.damaged_bytes()));
    }
    desc
}

/// Reports what the log already holds. Never modifies the file.
fn report_existing_log(path: &Path) {
    match LogReader::new(path).scan() {
        Ok(summary) if summary.file_len == 0 => {
            info!(path = %path.display(), "starting new log");
        }
        Ok(summary) => {
            info!(path = %path.display(), "existing log: {}", describe_log(&summary));
            if let Some(e) = &summary.error {
                warn!(
                    path = %path.display(),
                    offset = e.offset(),
                    error = %e,
                    "log tail is damaged; records after the damage will not be readable"
                );
            }
        }
        Err(e) => warn!(error = %e, "could not scan existing log"),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("hoststatd {} starting", hoststat_core::VERSION);
    info!(
        interval_s = args.interval,
        log_file = %args.log_file.display(),
        proc_path = %args.proc_path.display(),
        window_ms = args.window_ms,
        "config"
    );

    let interval = Duration::from_secs(args.interval);
    let window = Duration::from_millis(args.window_ms);
    if window >= interval {
        warn!(
            window_ms = args.window_ms,
            interval_ms = interval.as_millis() as u64,
            "measurement window is not shorter than the interval; ticks will be skipped"
        );
    }

    report_existing_log(&args.log_file);

    let writer = match LogWriter::open(&args.log_file) {
        Ok(w) => w,
        Err(e) => {
            error!(path = %args.log_file.display(), error = %e, "failed to open log");
            return ExitCode::FAILURE;
        }
    };

    #[cfg(target_os = "linux")]
    let sampler = Sampler::new(RealFs::new(), &args.proc_path).with_window(window);
    #[cfg(not(target_os = "linux"))]
    let sampler = {
        warn!("not running on Linux; sampling a simulated host");
        Sampler::new(MockFs::typical_host(), &args.proc_path).with_window(window)
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(interval, CollectionJob::new(sampler, writer)))
}

async fn run<F: FileSystem + 'static>(interval: Duration, job: CollectionJob<F>) -> ExitCode {
    let scheduler = match Scheduler::spawn(interval, job) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to start scheduler");
            return ExitCode::FAILURE;
        }
    };

    let stop = scheduler.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        stop.stop();
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting collection loop");

    match scheduler.join().await {
        Ok(stats) => {
            info!(
                ticks = stats.runs,
                failures = stats.failures,
                "Shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "collection task failed");
            ExitCode::FAILURE
        }
    }
}
