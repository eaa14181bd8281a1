//! Configuration module for sidcap-rs
//!
//! A capture is driven by a [`CaptureConfig`], which can be built in code,
//! loaded from a TOML file, and then overridden from the command line.
//!
//! # Config Location
//!
//! Without an explicit `--config`, the binary looks in the platform config
//! directory under `sidcap`:
//!
//! - **Linux**: `~/.config/sidcap/config.toml`
//! - **macOS**: `~/Library/Application Support/sidcap/config.toml`
//! - **Windows**: `%APPDATA%\sidcap\config.toml`
//!
//! # Example
//!
//! ```toml
//! [compaction]
//! layout = "full"
//! clock_mode = "delta"
//! max_register = 24
//!
//! [input]
//! quiescence_ms = 1000
//!
//! [output]
//! format = "parquet"
//! zstd_level = 9
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{CaptureError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "sidcap";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete configuration of one capture session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Record interpretation
    pub compaction: CompactionSettings,
    /// Source reading
    pub input: InputSettings,
    /// Output writing
    pub output: OutputSettings,
}

impl CaptureConfig {
    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| CaptureError::io("read", path, e))?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            CaptureError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config at `path`, or the default location, falling back to defaults
    ///
    /// A missing file is not an error. A file that exists but cannot be parsed is
    /// logged and replaced by defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CaptureError::io("create directory", parent, e))?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| CaptureError::io("write", path, e))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.input.read_chunk_size == 0 {
            return Err(CaptureError::Config(
                "input.read_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.input.max_line_len == Some(0) {
            return Err(CaptureError::Config(
                "input.max_line_len must be greater than zero".to_string(),
            ));
        }
        let levels = zstd::compression_level_range();
        if !levels.contains(&self.output.zstd_level) {
            return Err(CaptureError::Config(format!(
                "output.zstd_level {} outside {}..={}",
                self.output.zstd_level,
                levels.start(),
                levels.end()
            )));
        }
        // Parquet pages only accept the positive zstd levels
        if self.output.format == OutputFormat::Parquet && self.output.zstd_level < 1 {
            return Err(CaptureError::Config(format!(
                "output.zstd_level {} is not supported for parquet output",
                self.output.zstd_level
            )));
        }
        Ok(())
    }
}
