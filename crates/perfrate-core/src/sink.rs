//! Output sinks for derived rates.
//!
//! A run writes every (topic, rate) pair to exactly one sink, chosen at
//! startup: `PrintSink` for human-readable lines, `PublishSink` for one JSON
//! message per metric. Sinks write synchronously; a slow sink stalls the
//! sampling loop.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Error type for sink failures.
#[derive(Debug)]
pub enum SinkError {
    /// Writing to the destination failed.
    Io(io::Error),
    /// The metric could not be encoded.
    Encode(serde_json::Error),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "sink I/O error: {}", e),
            SinkError::Encode(e) => write!(f, "sink encode error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Encode(e) => Some(e),
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        SinkError::Io(e)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Encode(e)
    }
}

/// Destination for derived rates.
pub trait Sink {
    /// Emits one value. `timestamp` is the tick time when known.
    fn emit(
        &mut self,
        topic: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), SinkError>;

    /// Flushes buffered output. Called at the end of every tick.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn emit(
        &mut self,
        topic: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), SinkError> {
        (**self).emit(topic, value, timestamp)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn emit(
        &mut self,
        topic: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), SinkError> {
        (**self).emit(topic, value, timestamp)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

// ---------------------------------------------------------------------------
// Print sink
// ---------------------------------------------------------------------------

/// Writes `topic: value` lines.
#[derive(Debug)]
pub struct PrintSink<W: Write> {
    out: W,
}

impl PrintSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> PrintSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for PrintSink<W> {
    fn emit(&mut self, topic: &str, value: f64, _: Option<DateTime<Utc>>) -> Result<(), SinkError> {
        writeln!(self.out, "{}: {}", topic, value)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Publish sink
// ---------------------------------------------------------------------------

/// Wire form of one published metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedMetric<'a> {
    pub name: &'a str,
    pub value: f64,
    /// Unix time in nanoseconds.
    pub timestamp: i64,
}

/// Publishes one JSON message per metric, newline-delimited.
#[derive(Debug)]
pub struct PublishSink<W: Write> {
    out: W,
    published: u64,
}

impl PublishSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl PublishSink<BufWriter<File>> {
    /// Publishes to a file, truncating it.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> PublishSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, published: 0 }
    }

    /// Number of messages published so far.
    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for PublishSink<W> {
    fn emit(
        &mut self,
        topic: &str,
        value: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<(), SinkError> {
        let timestamp = timestamp.unwrap_or_else(Utc::now);
        let message = PublishedMetric {
            name: topic,
            value,
            timestamp: timestamp.timestamp_nanos_opt().unwrap_or_default(),
        };
        serde_json::to_writer(&mut self.out, &message)?;
        self.out.write_all(b"\n")?;
        self.published += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.out.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording sink
// ---------------------------------------------------------------------------

/// Keeps every emitted pair in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub records: Vec<(String, f64)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values emitted for `topic`, in order.
    pub fn values(&self, topic: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|&(_, v)| v)
            .collect()
    }
}

impl Sink for RecordingSink {
    fn emit(&mut self, topic: &str, value: f64, _: Option<DateTime<Utc>>) -> Result<(), SinkError> {
        self.records.push((topic.to_string(), value));
        Ok(())
    }
}
