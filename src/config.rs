//! Configuration module.
//!
//! Handles loading, validating, and merging `simple-crop.toml`. Stock
//! defaults are the base layer; a user file only overrides the keys it sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! log_level = "warn"        # Used when RUST_LOG is not set
//!
//! [storage]
//! root = "media"            # Local directory or http(s) base URL
//! public_url = "/media"     # Base URL for rendered thumbnail URLs
//! timeout_secs = 30         # Remote storage request timeout
//!
//! [output]
//! format = "jpeg"           # jpeg | png
//! quality = 95              # Encoder quality (1-100)
//!
//! [render]
//! create_on_load = true     # Generate missing thumbnails when a tag renders
//! placeholder = false       # Render placeholder URLs instead
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality};
use crate::process::OutputSettings;
use crate::tag::RenderSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Configuration loaded from `simple-crop.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub storage: StorageConfig,
    pub output: OutputConfig,
    pub render: RenderConfig,
    pub processing: ProcessingConfig,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            storage: StorageConfig::default(),
            output: OutputConfig::default(),
            render: RenderConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl CropConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "log_level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        if self.storage.root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.root must not be empty".into(),
            ));
        }
        if self.storage.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "storage.timeout_secs must be greater than zero".into(),
            ));
        }
        if !(1..=100).contains(&self.output.quality) {
            return Err(ConfigError::Validation(
                "output.quality must be 1-100".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn output_settings(&self) -> OutputSettings {
        OutputSettings {
            format: self.output.format,
            quality: Quality::new(self.output.quality),
        }
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            public_url: self.storage.public_url.clone(),
            create_on_load: self.render.create_on_load,
            placeholder: self.render.placeholder,
        }
    }
}

/// Where sources and derived files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Local directory, or an `http(s)://` base URL for remote storage.
    pub root: String,
    pub public_url: String,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "media".to_string(),
            public_url: "/media".to_string(),
            timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Encoding of every derived file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            quality: Quality::default().value(),
        }
    }
}

/// Tag rendering switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub create_on_load: bool,
    pub placeholder: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            create_on_load: true,
            placeholder: false,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel regeneration workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(CropConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<CropConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CropConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file.
///
/// A missing file yields the stock defaults. Invalid TOML, unknown keys and
/// out-of-range values are errors.
pub fn load_config(path: &Path) -> Result<CropConfig, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Returns a fully-commented stock `simple-crop.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Simple Crop Configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Log filter used when RUST_LOG is not set: off, error, warn, info, debug, trace.
log_level = "warn"

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Where source images and derived thumbnails live. Either a local directory
# or an http(s) base URL answering GET/HEAD/PUT/DELETE per key.
root = "media"

# Base URL prepended to thumbnail paths when rendering tags.
public_url = "/media"

# Request timeout for remote storage, in seconds.
timeout_secs = 30

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# Container for every derived file: "jpeg" or "png".
# File names keep the source extension either way.
format = "jpeg"

# Encoder quality (1-100). Ignored for png.
quality = 95

# ---------------------------------------------------------------------------
# Tag rendering
# ---------------------------------------------------------------------------
[render]
# Generate a missing thumbnail while its tag is rendered.
create_on_load = true

# Point every tag at https://placehold.it instead of the real thumbnail.
placeholder = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for batch regeneration. Omit for auto (= CPU cores).
# max_processes = 4
"##
}
