//! zstd-compressed text output
//!
//! Each event is written as one line in the layout it was captured in:
//!
//! ```text
//! clock irq nmi chip register value     # events carrying interrupt markers
//! clock address value                   # legacy events, address = chip * 32 + register
//! ```

use super::{sink_closed, EventSink, SinkReport};
use crate::config::OutputFormat;
use crate::error::{CaptureError, Result};
use crate::types::CompactedEvent;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use zstd::stream::write::Encoder;

/// Counts bytes passing through to the inner writer
#[derive(Debug)]
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes events as text lines through a streaming zstd encoder
pub struct TextSink<W: Write = BufWriter<File>> {
    encoder: Option<Encoder<'static, CountingWriter<W>>>,
    path: Option<PathBuf>,
    events_written: u64,
    report: Option<SinkReport>,
}

impl TextSink<BufWriter<File>> {
    /// Create (or truncate) the output file at `path`
    pub fn create(path: impl AsRef<Path>, level: i32) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| CaptureError::io("create", path, e))?;
        let mut sink = Self::new(BufWriter::new(file), level)?;
        sink.path = Some(path.to_path_buf());
        Ok(sink)
    }
}

impl<W: Write> TextSink<W> {
    /// Wrap an arbitrary writer
    pub fn new(writer: W, level: i32) -> Result<Self> {
        let counting = CountingWriter {
            inner: writer,
            written: 0,
        };
        let encoder = Encoder::new(counting, level)?;
        Ok(Self {
            encoder: Some(encoder),
            path: None,
            events_written: 0,
            report: None,
        })
    }

    /// Finish the stream and return the inner writer
    pub fn into_inner(mut self) -> Result<W> {
        let encoder = self.encoder.take().ok_or_else(sink_closed)?;
        let mut counting = encoder.finish()?;
        counting.flush()?;
        Ok(counting.inner)
    }

    fn io_error(&self, op: &'static str, err: io::Error) -> CaptureError {
        match &self.path {
            Some(path) => CaptureError::io(op, path, err),
            None => CaptureError::Stream(err),
        }
    }
}

/// Format one event as a text line, including the newline
pub fn write_event_line<W: Write>(out: &mut W, event: &CompactedEvent) -> io::Result<()> {
    match (event.irq, event.nmi) {
        (Some(irq), Some(nmi)) => writeln!(
            out,
            "{} {} {} {} {} {}",
            event.clock, irq, nmi, event.chip_index, event.register, event.value
        ),
        _ => writeln!(out, "{} {} {}", event.clock, event.address(), event.value),
    }
}

impl<W: Write> EventSink for TextSink<W> {
    fn write_event(&mut self, event: &CompactedEvent) -> Result<()> {
        let encoder = self.encoder.as_mut().ok_or_else(sink_closed)?;
        if let Err(e) = write_event_line(encoder, event) {
            return Err(self.io_error("write", e));
        }
        self.events_written += 1;
        Ok(())
    }

    fn events_written(&self) -> u64 {
        self.events_written
    }

    fn finish(&mut self) -> Result<SinkReport> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }
        let encoder = self.encoder.take().ok_or_else(sink_closed)?;

        let mut counting = match encoder.finish() {
            Ok(c) => c,
            Err(e) => return Err(self.io_error("finish", e)),
        };
        if let Err(e) = counting.flush() {
            return Err(self.io_error("flush", e));
        }

        let report = SinkReport {
            path: self.path.clone(),
            format: OutputFormat::Text,
            events_written: self.events_written,
            bytes_written: counting.written,
        };
        tracing::debug!(
            "Text sink finished: {} events, {} bytes",
            report.events_written,
            report.bytes_written
        );
        self.report = Some(report.clone());
        Ok(report)
    }
}

impl<W: Write> Drop for TextSink<W> {
    fn drop(&mut self) {
        // Unfinished sink: write the frame trailer so the file stays readable
        if let Some(mut encoder) = self.encoder.take() {
            let result = encoder.do_finish().and_then(|_| encoder.get_mut().flush());
            match result {
                Ok(()) => tracing::warn!(
                    "Text sink dropped without finish, finalized after {} events",
                    self.events_written
                ),
                Err(e) => tracing::error!("Failed to finalize text sink on drop: {}", e),
            }
        }
    }
}
