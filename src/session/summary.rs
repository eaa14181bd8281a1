//! JSON sidecar describing a finished capture

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::SessionReport;
use crate::config::OutputFormat;
use crate::error::{CaptureError, Result};
use crate::types::{ClockMode, RecordLayout};

/// Suffix appended to the output path for the summary file
pub const SUMMARY_SUFFIX: &str = ".summary.json";

/// Metadata for a recorded capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// When the capture finished
    pub recorded_at: DateTime<Utc>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
    pub layout: RecordLayout,
    pub clock_mode: ClockMode,
    pub lines_in: u64,
    pub lines_out: u64,
    pub malformed: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub annotations: u64,
    pub bytes_received: u64,
    pub bytes_written: u64,
    /// Total emulated cycles covered by the capture
    pub clock_cycles: u64,
    pub irq_min: Option<u64>,
    pub irq_max: Option<u64>,
    pub elapsed_secs: f64,
}

impl SessionSummary {
    pub fn from_report(
        report: &SessionReport,
        input: Option<&Path>,
        layout: RecordLayout,
        clock_mode: ClockMode,
    ) -> Self {
        let stats = &report.compactor;
        Self {
            recorded_at: Utc::now(),
            input: input.map(Path::to_path_buf),
            output: report.sink.path.clone(),
            format: report.sink.format,
            layout,
            clock_mode,
            lines_in: stats.lines_in,
            lines_out: stats.lines_out,
            malformed: stats.malformed,
            duplicates: stats.duplicates,
            filtered: stats.filtered,
            annotations: stats.annotations,
            bytes_received: report.frame.bytes_received,
            bytes_written: report.sink.bytes_written,
            clock_cycles: stats.running_clock,
            irq_min: stats.irq_min,
            irq_max: stats.irq_max,
            elapsed_secs: report.elapsed.as_secs_f64(),
        }
    }

    /// Write the summary as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize summary: {}", e)))?;
        std::fs::write(path, json).map_err(|e| CaptureError::io("write", path, e))?;
        tracing::info!("Saved capture summary to {:?}", path);
        Ok(())
    }

    /// Load a summary written by [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| CaptureError::io("read", path, e))?;
        serde_json::from_str(&json)
            .map_err(|e| CaptureError::Config(format!("Failed to parse summary: {}", e)))
    }
}

/// `out.dump.zst` -> `out.dump.zst.summary.json`
pub fn summary_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(SUMMARY_SUFFIX);
    PathBuf::from(name)
}
