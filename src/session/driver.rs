//! Capture session loop
//!
//! [`CaptureSession`] pumps bytes from a [`ByteSource`] through the frame
//! reader and the compactor into an [`EventSink`] until the producer has
//! exited and the source has stayed quiet for the quiescence window.
//!
//! A producer may exit while the last bytes are still in transit, and a
//! fifo reports end-of-file while no writer is attached. Neither ends the
//! session on its own; only liveness together with idle time does.

use std::time::Instant;

use super::{SessionOptions, SessionReport};
use crate::compactor::{Compactor, LineOutcome};
use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result, ResultExt, Stage};
use crate::frame::FrameReader;
use crate::sink::EventSink;
use crate::source::{ByteSource, ProducerLiveness, ReadOutcome};

/// One capture: source to sink
pub struct CaptureSession {
    source: Box<dyn ByteSource>,
    liveness: Box<dyn ProducerLiveness>,
    sink: Box<dyn EventSink>,
    frame: FrameReader,
    compactor: Compactor,
    options: SessionOptions,
}

impl CaptureSession {
    /// Create a session from a validated configuration
    pub fn new(
        config: &CaptureConfig,
        source: Box<dyn ByteSource>,
        sink: Box<dyn EventSink>,
        liveness: Box<dyn ProducerLiveness>,
    ) -> Self {
        Self {
            source,
            liveness,
            sink,
            frame: FrameReader::new(config.input.max_line_len),
            compactor: Compactor::new(&config.compaction),
            options: SessionOptions::from(&config.input),
        }
    }

    /// Override the loop timing
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the capture to completion
    ///
    /// On a fatal error the sink is still finished, so the output holds every
    /// event emitted before the failure.
    pub fn run(mut self) -> Result<SessionReport> {
        let started = Instant::now();
        tracing::info!(
            "Capturing from {} ({} layout, {} clock)",
            self.source.describe(),
            self.compactor.layout(),
            self.compactor.clock_mode()
        );

        if let Err(e) = self.pump(started) {
            match self.sink.finish() {
                Ok(report) => tracing::warn!(
                    "Capture aborted, kept {} events written before the failure",
                    report.events_written
                ),
                Err(finish_err) => {
                    tracing::error!("Failed to finish output after abort: {}", finish_err)
                }
            }
            return Err(e);
        }

        let sink = self.sink.finish().at_stage(Stage::Write)?;
        let report = SessionReport {
            compactor: self.compactor.stats(),
            frame: self.frame.stats(),
            sink,
            elapsed: started.elapsed(),
        };

        let stats = &report.compactor;
        tracing::info!(
            "Capture complete: {} records in, {} events out ({} duplicates, {} filtered, {} malformed) in {:.2?}",
            stats.lines_in,
            stats.lines_out,
            stats.duplicates,
            stats.filtered,
            stats.malformed,
            report.elapsed
        );
        if let (Some(min), Some(max)) = (stats.irq_min, stats.irq_max) {
            tracing::debug!("IRQ marker range: {}..={}", min, max);
        }
        Ok(report)
    }

    /// Read until the producer is gone and the source is quiet, then drain
    fn pump(&mut self, started: Instant) -> Result<()> {
        let mut buf = vec![0u8; self.options.read_chunk_size];
        let mut last_data = started;
        let mut last_progress = started;

        loop {
            let outcome = self
                .source
                .read_chunk(&mut buf)
                .map_err(|e| self.read_error(e))?;

            match outcome {
                ReadOutcome::Data(n) => {
                    self.frame.push(&buf[..n]);
                    last_data = Instant::now();
                    self.drain_lines()?;
                }
                ReadOutcome::WouldBlock | ReadOutcome::Closed => {
                    if !self.liveness.is_alive()
                        && last_data.elapsed() >= self.options.quiescence
                    {
                        tracing::debug!(
                            "Producer gone and source quiet for {:?}, finishing",
                            last_data.elapsed()
                        );
                        break;
                    }
                    self.source
                        .wait_readable(self.options.poll_backoff)
                        .map_err(|e| self.read_error(e))?;
                }
            }

            if last_progress.elapsed() >= self.options.progress_interval {
                last_progress = Instant::now();
                self.log_progress(started);
            }
        }

        // The producer may end without a final newline
        let tail = self.frame.finish().at_stage(Stage::Parse)?;
        if let Some(line) = tail {
            let outcome = self.compactor.process_line(line).at_stage(Stage::Parse)?;
            write_outcome(self.sink.as_mut(), &outcome)?;
        }
        Ok(())
    }

    /// Hand every complete buffered line to the compactor
    fn drain_lines(&mut self) -> Result<()> {
        while let Some(line) = self.frame.next_line().at_stage(Stage::Parse)? {
            let outcome = self.compactor.process_line(line).at_stage(Stage::Parse)?;
            write_outcome(self.sink.as_mut(), &outcome)?;
        }
        Ok(())
    }

    fn read_error(&self, err: std::io::Error) -> CaptureError {
        CaptureError::from(err)
            .with_context(format!("Failed to read {}", self.source.describe()))
            .at_stage(Stage::Read)
    }

    fn log_progress(&self, started: Instant) {
        let stats = self.compactor.stats();
        tracing::debug!(
            "Progress after {:.1?}: {} bytes, {} records, {} events, clock {}",
            started.elapsed(),
            self.frame.stats().bytes_received,
            stats.lines_in,
            stats.lines_out,
            stats.running_clock
        );
    }
}

fn write_outcome(sink: &mut dyn EventSink, outcome: &LineOutcome) -> Result<()> {
    match outcome.event() {
        Some(event) => sink.write_event(event).at_stage(Stage::Write),
        None => Ok(()),
    }
}
