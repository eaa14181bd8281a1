//! Settings groups that make up a [`CaptureConfig`](super::CaptureConfig)
//!
//! - [`CompactionSettings`] - Input layout, timing and register filtering
//! - [`InputSettings`] - Read sizes, polling backoff and quiescence
//! - [`OutputSettings`] - Output container and compression level

use crate::types::{ClockMode, RecordLayout, DEFAULT_MAX_REGISTER};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default zstd compression level
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Default cap on an unterminated line
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Default size of one read from the source
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Default quiescence window after the producer exits
pub const DEFAULT_QUIESCENCE_MS: u64 = 1000;

/// Default wait when the source has nothing to read
pub const DEFAULT_POLL_BACKOFF_US: u64 = 500;

/// Default interval between progress log lines
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 5000;

/// How records are interpreted and compacted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionSettings {
    /// Input field layout
    pub layout: RecordLayout,
    /// Timing of emitted events
    pub clock_mode: ClockMode,
    /// Highest register index kept (`None` keeps all)
    pub max_register: Option<u8>,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            layout: RecordLayout::Full,
            clock_mode: ClockMode::Absolute,
            max_register: Some(DEFAULT_MAX_REGISTER),
        }
    }
}

/// How the byte source is read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Bytes requested per read
    pub read_chunk_size: usize,
    /// Longest unterminated line accepted (`None` = unbounded)
    pub max_line_len: Option<usize>,
    /// Idle time required after producer exit before finishing
    pub quiescence_ms: u64,
    /// Wait between empty reads, in microseconds
    pub poll_backoff_us: u64,
    /// Interval between progress log lines
    pub progress_interval_ms: u64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_line_len: Some(DEFAULT_MAX_LINE_LEN),
            quiescence_ms: DEFAULT_QUIESCENCE_MS,
            poll_backoff_us: DEFAULT_POLL_BACKOFF_US,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl InputSettings {
    /// Quiescence window as a Duration
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    /// Poll backoff as a Duration
    pub fn poll_backoff(&self) -> Duration {
        Duration::from_micros(self.poll_backoff_us)
    }

    /// Progress interval as a Duration
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// Output container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// zstd-compressed text records
    #[default]
    Text,
    /// zstd-compressed Parquet columns
    Parquet,
}

impl OutputFormat {
    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "dump.zst",
            OutputFormat::Parquet => "dump.parquet",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Parquet => write!(f, "parquet"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "zst" => Ok(OutputFormat::Text),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(format!("unknown output format '{}' (expected text or parquet)", other)),
        }
    }
}

/// How compacted events are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Output container
    pub format: OutputFormat,
    /// zstd level for either container
    pub zstd_level: i32,
    /// Write a JSON summary next to the output
    pub write_summary: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            zstd_level: DEFAULT_ZSTD_LEVEL,
            write_summary: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_durations() {
        let input = InputSettings::default();
        assert_eq!(input.quiescence(), Duration::from_secs(1));
        assert_eq!(input.poll_backoff(), Duration::from_micros(500));
    }

    #[test]
    fn test_default_register_limit() {
        assert_eq!(CompactionSettings::default().max_register, Some(24));
    }

    #[test]
    fn test_output_extension() {
        assert_eq!(OutputFormat::Parquet.extension(), "dump.parquet");
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!("parquet".parse::<OutputFormat>(), Ok(OutputFormat::Parquet));
        assert!("csv".parse::<OutputFormat>().is_err());
    }
}
