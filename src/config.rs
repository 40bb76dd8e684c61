//! Pipeline configuration.
//!
//! Handles loading, merging, and validating `thumbkit.toml`. Every threshold
//! the pipeline uses lives here; stock defaults are overridden by whatever a
//! user config file sets.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [main]
//! max_side = 1280           # Longer side of the display variant (never upscaled)
//!
//! [thumbnail]
//! max_side = 500            # Shorter side after the cover resize
//! box_size = [500, 400]     # Final crop box [width, height]
//! source = "intermediate"   # "intermediate" or "original"
//!
//! [encoding]
//! quality = 85              # Lossy quality (1-100)
//! format = "jpeg"           # "jpeg", "png" or "webp"
//!
//! [processing]
//! max_processes = 4         # Max parallel batch workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [thumbnail]
//! box_size = [500, 500]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "thumbkit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `thumbkit.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Display variant settings.
    pub main: MainConfig,
    /// Thumbnail settings (cover size, crop box, source image).
    pub thumbnail: ThumbnailConfig,
    /// Encoding shared by both variants.
    pub encoding: EncodingConfig,
    /// Parallel batch settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.encoding.quality) {
            return Err(ConfigError::Validation(
                "encoding.quality must be 1-100".into(),
            ));
        }
        if self.main.max_side == 0 {
            return Err(ConfigError::Validation(
                "main.max_side must be non-zero".into(),
            ));
        }
        if self.thumbnail.max_side == 0 {
            return Err(ConfigError::Validation(
                "thumbnail.max_side must be non-zero".into(),
            ));
        }
        let [box_w, box_h] = self.thumbnail.box_size;
        if box_w == 0 || box_h == 0 {
            return Err(ConfigError::Validation(
                "thumbnail.box_size values must be non-zero".into(),
            ));
        }
        // The cover resize only guarantees `max_side` on the shorter axis.
        if box_w > self.thumbnail.max_side || box_h > self.thumbnail.max_side {
            return Err(ConfigError::Validation(format!(
                "thumbnail.box_size {}x{} does not fit inside thumbnail.max_side {}",
                box_w, box_h, self.thumbnail.max_side
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Display variant settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MainConfig {
    /// Cap on the longer side. Smaller images keep their size.
    pub max_side: u32,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self { max_side: 1280 }
    }
}

/// Which image the thumbnail is cut from when a display variant was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailSource {
    /// The already-resized display variant.
    #[default]
    Intermediate,
    /// A fresh decode of the input.
    Original,
}

/// Thumbnail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailConfig {
    /// Shorter side after the cover resize.
    pub max_side: u32,
    /// Final crop box as `[width, height]`.
    pub box_size: [u32; 2],
    /// Image the thumbnail is planned from (ignored for pass-through formats).
    pub source: ThumbnailSource,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_side: 500,
            box_size: [500, 400],
            source: ThumbnailSource::default(),
        }
    }
}

/// Encoding settings shared by the display variant and the thumbnail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// Lossy encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    /// Output encoding.
    pub format: OutputFormat,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            quality: 85,
            format: OutputFormat::Jpeg,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel batch workers.
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

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(Config::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {}", e)))
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
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// An explicit `path` must exist. Without one, `thumbkit.toml` in the working
/// directory is used when present, stock defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return resolve_config(None);
            }
            default
        }
    };
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Returns a fully-commented stock `thumbkit.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# thumbkit configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Display variant
# ---------------------------------------------------------------------------
[main]
# Longer side of the display image. Smaller images are never upscaled.
# GIF input skips this step and is passed through byte-for-byte.
max_side = 1280

# ---------------------------------------------------------------------------
# Thumbnail
# ---------------------------------------------------------------------------
[thumbnail]
# The image is scaled (up or down) so its shorter side equals max_side...
max_side = 500

# ...then center-cropped to this [width, height] box.
# Both values must be <= max_side. [500, 500] gives square thumbnails.
box_size = [500, 400]

# Which image the thumbnail is cut from:
#   "intermediate" - the resized display variant
#   "original"     - the decoded input
source = "intermediate"

# ---------------------------------------------------------------------------
# Encoding (both variants)
# ---------------------------------------------------------------------------
[encoding]
# Lossy quality, 1 (worst) to 100 (best). PNG and WebP output are lossless.
quality = 85

# "jpeg", "png" or "webp"
format = "jpeg"

# ---------------------------------------------------------------------------
# Batch processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `thumbkit batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
