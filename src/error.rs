//! Error handling for sidcap-rs
//!
//! This module defines the capture error type and a Result alias for use
//! throughout the crate. Malformed records are not errors: the compactor
//! counts and skips them. Everything in here is fatal to a session.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage that produced a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading bytes from the source
    Read,
    /// Framing and parsing records
    Parse,
    /// Writing compacted events to the sink
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Read => "read",
            Stage::Parse => "parse",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// Main error type for capture operations
#[derive(Error, Debug)]
pub enum CaptureError {
    /// A framed line is not valid UTF-8
    #[error("Decode error in line {line} (stream offset {offset}): {source}")]
    Decode {
        line: u64,
        offset: u64,
        #[source]
        source: std::str::Utf8Error,
    },

    /// The producer sent more than the allowed bytes without a newline
    #[error("Line exceeds {limit} bytes without a terminator (stream offset {offset})")]
    LineTooLong { limit: usize, offset: u64 },

    /// An emitted clock or marker does not fit the 32-bit event fields
    #[error("Clock {clock} of record {record} does not fit in 32 bits")]
    ClockOverflow { clock: u64, record: u64 },

    /// IO errors with the failing operation and path
    #[error("Failed to {op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO errors without a path (pipes, already-open handles)
    #[error("IO error: {0}")]
    Stream(#[from] std::io::Error),

    /// Columnar container errors
    #[error("Parquet error: {0}")]
    Parquet(String),

    /// Errors related to configuration loading/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A fatal error tagged with the pipeline stage it came from
    #[error("Capture failed during {stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<CaptureError>,
    },

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CaptureError>,
    },
}

impl CaptureError {
    /// Build an IO error carrying the operation and path
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CaptureError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CaptureError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Tag an error with the stage it occurred in
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            // Already tagged by an inner call
            CaptureError::Stage { .. } => self,
            other => CaptureError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was tagged with, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            CaptureError::Stage { stage, .. } => Some(*stage),
            CaptureError::WithContext { source, .. } => source.stage(),
            _ => None,
        }
    }
}

impl From<parquet::errors::ParquetError> for CaptureError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        CaptureError::Parquet(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for CaptureError {
    fn from(err: arrow::error::ArrowError) -> Self {
        CaptureError::Parquet(err.to_string())
    }
}

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Tag an error result with a pipeline stage
    fn at_stage(self, stage: Stage) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }

    fn at_stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.at_stage(stage))
    }
}
