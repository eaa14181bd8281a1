//! Session data types

use serde::Serialize;
use std::time::Duration;

use crate::compactor::CompactorStats;
use crate::config::InputSettings;
use crate::frame::FrameStats;
use crate::sink::SinkReport;

/// Timing knobs of the session loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Size of the read buffer
    pub read_chunk_size: usize,
    /// Idle time after producer exit before the capture is considered complete
    pub quiescence: Duration,
    /// Longest single wait for readiness
    pub poll_backoff: Duration,
    /// Interval between progress log lines
    pub progress_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&InputSettings::default())
    }
}

impl From<&InputSettings> for SessionOptions {
    fn from(input: &InputSettings) -> Self {
        Self {
            read_chunk_size: input.read_chunk_size.max(1),
            quiescence: input.quiescence(),
            poll_backoff: input.poll_backoff(),
            progress_interval: input.progress_interval(),
        }
    }
}

/// Outcome of a completed capture session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub compactor: CompactorStats,
    pub frame: FrameStats,
    pub sink: SinkReport,
    /// Wall-clock duration of the session
    pub elapsed: Duration,
}

impl SessionReport {
    /// Fraction of parsed records that survived compaction
    pub fn retention(&self) -> f64 {
        if self.compactor.lines_in == 0 {
            0.0
        } else {
            self.compactor.lines_out as f64 / self.compactor.lines_in as f64
        }
    }
}
