//! Periodic background work.
//!
//! The [`Scheduler`] runs a [`Job`] once per period on tokio's blocking pool,
//! one run at a time. The first run happens one full period after spawning.
//! Failed or panicking runs are logged and the schedule continues. A stop
//! request prevents further runs without interrupting one in progress.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::collector::{CollectError, FileSystem, Sampler};
use crate::storage::writer::LogWriter;

/// Blocking unit of work run on every tick.
pub trait Job: Send + 'static {
    type Error: fmt::Display;

    fn run(&mut self) -> Result<(), Self::Error>;
}

/// Counters reported when the schedule ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks that started, including failed ones.
    pub runs: u64,
    /// Ticks that returned an error or panicked.
    pub failures: u64,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler period must be non-zero")]
    ZeroPeriod,
}

/// Requests a scheduler stop from outside the async context (signal handlers).
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Handle to a running periodic task.
///
/// Dropping the scheduler together with every [`StopHandle`] also ends the
/// schedule after the current run.
pub struct Scheduler {
    stop: StopHandle,
    task: JoinHandle<TickStats>,
}

impl Scheduler {
    /// Starts running `job` every `period`. Must be called within a tokio runtime.
    pub fn spawn<J: Job>(period: Duration, job: J) -> Result<Self, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod);
        }

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(tick_loop(job, period, rx));
        debug!(period_ms = period.as_millis() as u64, "scheduler started");

        Ok(Self {
            stop: StopHandle { tx: Arc::new(tx) },
            task,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stops the schedule and waits for an in-flight run to finish.
    pub async fn stop(self) -> Result<TickStats, JoinError> {
        self.stop.stop();
        self.task.await
    }

    /// Waits until the schedule is stopped through a [`StopHandle`].
    pub async fn join(self) -> Result<TickStats, JoinError> {
        let Self { stop, task, .. } = self;
        // keep our sender alive so only an explicit stop ends the loop
        let result = task.await;
        drop(stop);
        result
    }
}

async fn tick_loop<J: Job>(
    job: J,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) -> TickStats {
    let job = Arc::new(Mutex::new(job));
    let mut tick = interval_at(Instant::now() + period, period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats = TickStats::default();

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow_and_update() {
                    break;
                }
                continue;
            }
            _ = tick.tick() => {}
        }

        let job = Arc::clone(&job);
        let t0 = std::time::Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let mut job = job.lock().unwrap_or_else(PoisonError::into_inner);
            job.run().map_err(|e| e.to_string())
        })
        .await;
        let elapsed = t0.elapsed();
        stats.runs += 1;

        match result {
            Ok(Ok(())) => {
                debug!(
                    duration_ms = elapsed.as_millis() as u64,
                    runs = stats.runs,
                    "tick completed"
                );
            }
            Ok(Err(e)) => {
                stats.failures += 1;
                warn!(
                    error = %e,
                    duration_ms = elapsed.as_millis() as u64,
                    "tick failed"
                );
            }
            Err(e) => {
                stats.failures += 1;
                error!(error = %e, "tick panicked in spawn_blocking");
            }
        }

        if elapsed > period / 2 {
            warn!(
                duration_ms = elapsed.as_millis() as u64,
                interval_ms = period.as_millis() as u64,
                "tick exceeded 50% of interval"
            );
        }
    }

    info!(
        runs = stats.runs,
        failures = stats.failures,
        "scheduler stopped"
    );
    stats
}

/// One collection tick failed.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("sample failed: {0}")]
    Collect(#[from] CollectError),
    #[error("append failed: {0}")]
    Append(#[from] io::Error),
}

/// Samples the host and appends the record to the log.
pub struct CollectionJob<F: FileSystem> {
    sampler: Sampler<F>,
    writer: LogWriter,
}

impl<F: FileSystem> CollectionJob<F> {
    pub fn new(sampler: Sampler<F>, writer: LogWriter) -> Self {
        Self { sampler, writer }
    }

    pub fn writer(&self) -> &LogWriter {
        &self.writer
    }

    /// One sample-then-append step.
    pub fn collect_once(&mut self) -> Result<(), TickError> {
        let record = self.sampler.sample()?;
        let bytes = self.writer.append_record(&record)?;
        debug!(
            timestamp = record.timestamp,
            bytes,
            frames = self.writer.frames_written(),
            "record appended"
        );
        Ok(())
    }
}

impl<F: FileSystem + 'static> Job for CollectionJob<F> {
    type Error = TickError;

    fn run(&mut self) -> Result<(), TickError> {
        self.collect_once()
    }
}
