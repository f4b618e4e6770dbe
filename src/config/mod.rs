//! Configuration module for scriptfilter
//!
//! This module handles node configuration including:
//! - The five node options (module and hook names, init argument string)
//! - Engine settings (module search path, optional limits, per-frame error policy)
//! - An optional timeline window outside of which frames bypass the script
//!
//! # Config File
//!
//! Configuration is a TOML file. Without an explicit path the binary looks in
//! the platform config directory:
//!
//! - **Linux**: `~/.config/scriptfilter/config.toml`
//! - **macOS**: `~/Library/Application Support/scriptfilter/config.toml`
//! - **Windows**: `%APPDATA%\scriptfilter\config.toml`
//!
//! # Example
//!
//! ```toml
//! [filter]
//! module = "invert"
//! filter_function = "filter"
//! init_function = "setup"
//! init_args = "strength=0.5"
//!
//! [engine]
//! module_paths = ["scripts"]
//! on_frame_error = "log"
//!
//! [timeline]
//! start = 1.0
//! end = 10.0
//! ```

pub mod options;

pub use options::{find_option, FilterOptions, OptionDescriptor, OPTIONS};

use crate::error::{BridgeError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "scriptfilter";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// What to do when the filter hook raises an error for a frame.
///
/// The frame is forwarded downstream in both cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameErrorPolicy {
    /// Log at warn level, count it, keep streaming.
    #[default]
    Log,
    /// Surface the fault to the pipeline as `BridgeError::FilterHookFailed`.
    Fail,
}

/// Settings for the embedded engine.
///
/// Limits default to 0, which means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Directories searched for modules, before `SCRIPTFILTER_PATH` and `.`.
    pub module_paths: Vec<PathBuf>,
    /// Maximum operations per hook call (0 = unlimited).
    pub max_operations: u64,
    /// Maximum function call depth (0 = engine default).
    pub max_call_levels: usize,
    /// Maximum string length (0 = unlimited).
    pub max_string_size: usize,
    /// Maximum array length (0 = unlimited).
    pub max_array_size: usize,
    /// Per-frame fault handling.
    pub on_frame_error: FrameErrorPolicy,
}

impl EngineSettings {
    pub fn with_module_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.module_paths.push(path.into());
        self
    }
}

/// Time window, in stream seconds, during which the script is applied.
///
/// Frames outside the window pass through without a hook call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineWindow {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl TimelineWindow {
    /// Whether the script applies to a frame at `time_secs`.
    ///
    /// Frames without a timestamp (NaN) are always processed.
    pub fn contains(&self, time_secs: f64) -> bool {
        if time_secs.is_nan() {
            return true;
        }
        self.start.map_or(true, |s| time_secs >= s) && self.end.map_or(true, |e| time_secs <= e)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub filter: FilterOptions,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub timeline: TimelineWindow,
}

impl BridgeConfig {
    pub fn new(filter: FilterOptions) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        Self::from_toml(&content).with_context(|| format!("{}", path.display()))
    }

    /// Load from the default location, if a file exists there
    pub fn load_default() -> Result<Option<Self>> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(path).map(Some),
            _ => Ok(None),
        }
    }

    /// Save config file to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }

    pub fn validate(&self) -> Result<()> {
        self.filter.validate()?;
        if let (Some(start), Some(end)) = (self.timeline.start, self.timeline.end) {
            if start > end {
                return Err(BridgeError::Config(format!(
                    "Timeline start {} is after end {}",
                    start, end
                )));
            }
        }
        Ok(())
    }
}
