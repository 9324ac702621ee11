//! Telemetry sinks.
//!
//! The loop hands a [`TelemetrySample`] to a [`TelemetrySink`] every
//! `telemetry_interval` ticks. A failing sink never stops the loop; the
//! runner logs the first error and counts the rest.

use std::io::Write;

use heapless::HistoryBuffer;
use motorlab_common::telemetry::TelemetrySample;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a telemetry sink.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry encode: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination for telemetry samples.
pub trait TelemetrySink {
    /// Take one sample. Called from the tick; must not block for long.
    fn record(&mut self, sample: &TelemetrySample) -> Result<(), TelemetryError>;

    /// Push buffered samples out. Called on shutdown and fatal stop.
    fn flush(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Box<T> {
    #[inline]
    fn record(&mut self, sample: &TelemetrySample) -> Result<(), TelemetryError> {
        (**self).record(sample)
    }

    fn flush(&mut self) -> Result<(), TelemetryError> {
        (**self).flush()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    #[inline]
    fn record(&mut self, _sample: &TelemetrySample) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Fixed-capacity ring keeping the newest `N` samples. Never allocates.
pub struct TelemetryRecorder<const N: usize> {
    ring: HistoryBuffer<TelemetrySample, N>,
    total: u64,
}

impl<const N: usize> TelemetryRecorder<N> {
    /// Empty ring.
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuffer::new(),
            total: 0,
        }
    }

    /// Samples currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// No samples held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Samples ever recorded, including those overwritten.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Newest sample.
    #[inline]
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.ring.recent()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.ring.oldest_ordered()
    }

    /// Drain into another sink (e.g. a file after the run).
    pub fn replay<S: TelemetrySink + ?Sized>(&self, sink: &mut S) -> Result<(), TelemetryError> {
        for s in self.iter() {
            sink.record(s)?;
        }
        sink.flush()
    }

    /// Drop all samples and the total.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.total = 0;
    }
}

impl<const N: usize> Default for TelemetryRecorder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TelemetrySink for TelemetryRecorder<N> {
    #[inline]
    fn record(&mut self, sample: &TelemetrySample) -> Result<(), TelemetryError> {
        self.ring.write(*sample);
        self.total += 1;
        Ok(())
    }
}

/// Line format for [`LineWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryFormat {
    /// `t,reference,estimate,command` with a header line.
    #[default]
    Csv,
    /// One JSON object per line.
    JsonLines,
}

/// Line-oriented writer over any `io::Write`.
pub struct LineWriter<W: Write> {
    out: W,
    format: TelemetryFormat,
    header_written: bool,
    line: String,
}

impl<W: Write> LineWriter<W> {
    /// Writer emitting `format` to `out`.
    pub fn new(out: W, format: TelemetryFormat) -> Self {
        Self {
            out,
            format,
            header_written: false,
            line: String::with_capacity(96),
        }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TelemetrySink for LineWriter<W> {
    fn record(&mut self, sample: &TelemetrySample) -> Result<(), TelemetryError> {
        match self.format {
            TelemetryFormat::Csv => {
                if !self.header_written {
                    writeln!(self.out, "{}", TelemetrySample::CSV_HEADER)?;
                    self.header_written = true;
                }
                self.line.clear();
                // Writing into a String cannot fail.
                let _ = sample.write_csv(&mut self.line);
                self.line.push('\n');
                self.out.write_all(self.line.as_bytes())?;
            }
            TelemetryFormat::JsonLines => {
                serde_json::to_writer(&mut self.out, sample)?;
                self.out.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TelemetryError> {
        self.out.flush()?;
        Ok(())
    }
}
