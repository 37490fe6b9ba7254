//! Sampling loop.
//!
//! Each round invokes every command entry in order, turns the raw samples
//! into rates through the shared `RateTracker`, and hands every rate to the
//! sink. Rounds are separated by the configured interval; the sleep is
//! sliced so a cleared `running` flag is noticed within ~100 ms.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace};

use crate::collector::reader::{CollectError, RawSample};
use crate::rates::RateTracker;
use crate::registry::CommandEntry;
use crate::sink::{Sink, SinkError};
use crate::table::TableBuffer;

/// Granularity at which the inter-round sleep checks the running flag.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Error type for a sampling run.
#[derive(Debug)]
pub enum SampleError {
    /// A source could not be re-read or parsed.
    Collect { path: PathBuf, source: CollectError },
    /// The sink rejected a value.
    Sink(SinkError),
    /// The CSV export could not be written.
    Export { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleError::Collect { path, source } => {
                write!(f, "failed to sample {}: {}", path.display(), source)
            }
            SampleError::Sink(e) => write!(f, "{}", e),
            SampleError::Export { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SampleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SampleError::Collect { source, .. } => Some(source),
            SampleError::Sink(e) => Some(e),
            SampleError::Export { source, .. } => Some(source),
        }
    }
}

impl From<SinkError> for SampleError {
    fn from(e: SinkError) -> Self {
        SampleError::Sink(e)
    }
}

/// Invalid loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Interval and round limit of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Delay between rounds. Zero means back-to-back.
    pub interval: Duration,
    /// Round limit. `None` runs until stopped.
    pub rounds: Option<u64>,
}

impl LoopConfig {
    pub fn new(interval: Duration, rounds: Option<u64>) -> Self {
        Self { interval, rounds }
    }

    /// Derives the round limit from a total duration: `duration / interval`
    /// rounds, rounded down. `None` duration means unbounded.
    pub fn for_duration(interval: Duration, duration: Option<Duration>) -> Result<Self, ConfigError> {
        let Some(duration) = duration else {
            return Ok(Self::new(interval, None));
        };
        if interval.is_zero() {
            return Err(ConfigError {
                message: "cannot derive a round count from a duration with a zero interval; pass --rounds"
                    .to_string(),
            });
        }
        let rounds = duration.as_nanos() / interval.as_nanos();
        Ok(Self::new(interval, Some(u64::try_from(rounds).unwrap_or(u64::MAX))))
    }
}

/// Outcome of a completed or stopped run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rounds: u64,
    pub samples: u64,
    /// The run ended because `running` was cleared.
    pub stopped: bool,
    /// Where the CSV was written, if it was.
    pub exported: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

/// State shared by every command entry within a run.
#[derive(Debug)]
pub struct SampleContext<S: Sink> {
    tracker: RateTracker,
    period: usize,
    sink: S,
    table: Option<TableBuffer>,
    emitted: u64,
}

impl<S: Sink> SampleContext<S> {
    /// `period` is floored at 1.
    pub fn new(sink: S, period: usize) -> Self {
        Self {
            tracker: RateTracker::new(),
            period: period.max(1),
            sink,
            table: None,
            emitted: 0,
        }
    }

    /// Buffers every rate for CSV export.
    pub fn with_table(mut self) -> Self {
        self.table = Some(TableBuffer::new());
        self
    }

    /// Derives the rate for one raw sample and emits it.
    pub fn record(&mut self, sample: &RawSample, timestamp: DateTime<Utc>) -> Result<f64, SinkError> {
        let rate = self.tracker.observe(&sample.topic, sample.value, self.period);
        trace!("{} raw={} rate={}", sample.topic, sample.value, rate);

        self.sink.emit(sample.topic.as_str(), rate, Some(timestamp))?;
        if let Some(table) = &mut self.table {
            table.record(&sample.topic, rate);
        }
        self.emitted += 1;
        Ok(rate)
    }

    /// Closes the current tick: commits the table row and flushes the sink.
    pub fn end_tick(&mut self) -> Result<(), SinkError> {
        if let Some(table) = &mut self.table {
            table.commit_row();
        }
        self.sink.flush()
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn tracker(&self) -> &RateTracker {
        &self.tracker
    }

    pub fn table(&self) -> Option<&TableBuffer> {
        self.table.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Drives the command entries through rounds.
#[derive(Debug)]
pub struct Sampler<S: Sink> {
    commands: Vec<CommandEntry>,
    context: SampleContext<S>,
    export: Option<PathBuf>,
}

impl<S: Sink> Sampler<S> {
    pub fn new(commands: Vec<CommandEntry>, sink: S, period: usize) -> Self {
        Self {
            commands,
            context: SampleContext::new(sink, period),
            export: None,
        }
    }

    /// Writes a CSV of every rate to `path` when a bounded run completes.
    pub fn with_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.context = self.context.with_table();
        self.export = Some(path.into());
        self
    }

    pub fn commands(&self) -> &[CommandEntry] {
        &self.commands
    }

    pub fn context(&self) -> &SampleContext<S> {
        &self.context
    }

    pub fn into_sink(self) -> S {
        self.context.into_sink()
    }

    /// Runs one round over every command entry. All rates of the round share
    /// one timestamp. Returns the number of rates emitted.
    pub fn tick(&mut self) -> Result<usize, SampleError> {
        let timestamp = Utc::now();
        let mut count = 0;

        for entry in &mut self.commands {
            let samples = entry.sample().map_err(|source| SampleError::Collect {
                path: entry.path().to_path_buf(),
                source,
            })?;
            for sample in &samples {
                self.context.record(sample, timestamp)?;
            }
            count += samples.len();
        }

        self.context.end_tick()?;
        Ok(count)
    }

    /// Runs rounds until the limit is reached or `running` is cleared.
    ///
    /// There is no sleep after the final round. The CSV export, if
    /// configured, is written only when the round limit is reached.
    pub fn run(&mut self, config: &LoopConfig, running: &AtomicBool) -> Result<RunSummary, SampleError> {
        match config.rounds {
            Some(limit) => info!(
                "Sampling {} sources: {} rounds every {:?}",
                self.commands.len(),
                limit,
                config.interval
            ),
            None => info!(
                "Sampling {} sources every {:?} until stopped",
                self.commands.len(),
                config.interval
            ),
        }

        let mut rounds: u64 = 0;
        let mut stopped = false;

        loop {
            if config.rounds.is_some_and(|limit| rounds >= limit) {
                break;
            }
            if !running.load(Ordering::SeqCst) {
                stopped = true;
                break;
            }

            let count = self.tick()?;
            rounds += 1;
            debug!("Round #{}: {} rates", rounds, count);

            if config.rounds.is_some_and(|limit| rounds >= limit) {
                break;
            }
            sleep_while_running(config.interval, running);
        }

        let exported = match (&self.export, stopped) {
            (Some(path), false) => {
                self.write_export(path)?;
                Some(path.clone())
            }
            (Some(path), true) => {
                info!("Stopped early, skipping CSV export to {}", path.display());
                None
            }
            (None, _) => None,
        };

        Ok(RunSummary {
            rounds,
            samples: self.context.emitted(),
            stopped,
            exported,
        })
    }

    fn write_export(&self, path: &Path) -> Result<(), SampleError> {
        let Some(table) = self.context.table() else {
            return Ok(());
        };
        table
            .write_csv_file(path)
            .map_err(|source| SampleError::Export {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            "Wrote {} rows x {} columns to {}",
            table.rows(),
            table.header().len(),
            path.display()
        );
        Ok(())
    }
}

/// Sleeps for `interval` in short slices, returning early once `running`
/// is cleared.
fn sleep_while_running(interval: Duration, running: &AtomicBool) {
    let mut remaining = interval;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let slice = remaining.min(SLEEP_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
