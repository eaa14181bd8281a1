//! Output sinks for compacted events
//!
//! A sink receives the ordered stream of [`CompactedEvent`]s of one capture
//! session and writes them through a compressor to a single artifact.
//!
//! - [`TextSink`] - Text records through a streaming zstd encoder
//! - [`ColumnarSink`] - Typed Parquet columns with zstd pages
//!
//! Sinks never reorder events. [`EventSink::finish`] writes the compression
//! trailer and flushes; both sinks also finalize best-effort when dropped
//! unfinished, so an aborted session still leaves a readable file holding the
//! events accepted so far.

pub mod columnar;
pub mod text;

pub use columnar::ColumnarSink;
pub use text::TextSink;

use crate::config::{OutputFormat, OutputSettings};
use crate::error::{CaptureError, Result};
use crate::types::{ClockMode, CompactedEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a finished sink wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    /// Output file, if the sink wrote to one
    pub path: Option<PathBuf>,
    /// Container format
    pub format: OutputFormat,
    /// Events accepted
    pub events_written: u64,
    /// Compressed bytes written
    pub bytes_written: u64,
}

/// Destination for compacted events
pub trait EventSink {
    /// Append one event
    fn write_event(&mut self, event: &CompactedEvent) -> Result<()>;

    /// Append several events in order
    fn write_events(&mut self, events: &[CompactedEvent]) -> Result<()> {
        events.iter().try_for_each(|e| self.write_event(e))
    }

    /// Events accepted so far
    fn events_written(&self) -> u64;

    /// Flush and finalize the output
    ///
    /// Calling `finish` again returns the same report. Writing after
    /// `finish` is an error.
    fn finish(&mut self) -> Result<SinkReport>;
}

/// Create the sink selected by `settings` at `path`
///
/// The file is created (or truncated) immediately.
pub fn open_sink(
    settings: &OutputSettings,
    path: &Path,
    clock_mode: ClockMode,
) -> Result<Box<dyn EventSink>> {
    let sink: Box<dyn EventSink> = match settings.format {
        OutputFormat::Text => Box::new(TextSink::create(path, settings.zstd_level)?),
        OutputFormat::Parquet => {
            Box::new(ColumnarSink::create(path, settings.zstd_level, clock_mode)?)
        }
    };
    tracing::info!("Writing {} output to {:?}", settings.format, path);
    Ok(sink)
}

/// Sink that keeps events in memory
///
/// Clones share one event buffer, so a handle kept outside a session can
/// read the events after the session consumed its own handle.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    events: Vec<CompactedEvent>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Events accepted so far
    pub fn events(&self) -> Vec<CompactedEvent> {
        self.state().events.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.state().finished
    }
}

impl EventSink for MemorySink {
    fn write_event(&mut self, event: &CompactedEvent) -> Result<()> {
        let mut state = self.state();
        if state.finished {
            return Err(sink_closed());
        }
        state.events.push(*event);
        Ok(())
    }

    fn events_written(&self) -> u64 {
        self.state().events.len() as u64
    }

    fn finish(&mut self) -> Result<SinkReport> {
        let mut state = self.state();
        state.finished = true;
        Ok(SinkReport {
            path: None,
            format: OutputFormat::Text,
            events_written: state.events.len() as u64,
            bytes_written: 0,
        })
    }
}

/// Error for writes after `finish`
pub(crate) fn sink_closed() -> CaptureError {
    CaptureError::Stream(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "sink already finished",
    ))
}
