//! Stitch configuration.
//!
//! Handles loading, validating, and layering the settings for one run.
//! Values are resolved in three layers, each overriding the previous:
//!
//! ```text
//! stock defaults  →  <working-dir>/stitch.toml  →  command-line flags
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! columns = 2               # Tiles per row
//! rows = 2                  # Tiles per column
//! direction = "horizontal"  # Fill order: "horizontal" or "vertical"
//! scale_factor = 1.0        # < 1 shrinks every tile; >= 1 keeps them as is
//! empty_slots = []          # Grid indices rendered as black placeholders
//!
//! [crop]
//! width = 0                 # 0 disables cropping
//! height = 0                # 0 keeps the canvas height
//!
//! [thumbnail]
//! enabled = false
//! max_width = 2000          # Thumbnail only when the canvas is wider
//!
//! [scaling]                 # Used when the tiles carry no scale
//! x = 1.0
//! y = 1.0
//! unit = "nm"
//! editor = "FEI-MAPS"
//!
//! [output]
//! open = false              # Open the result in the system viewer
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::scaling::ScalingDescriptor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory config file.
pub const CONFIG_FILE: &str = "stitch.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Unsupported option: {0}")]
    UnsupportedOption(String),
}

/// Order in which the flat tile list fills the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Left to right, then the next row.
    #[default]
    Horizontal,
    /// Top to bottom, then the next column.
    Vertical,
}

impl Direction {
    pub fn name(self) -> &'static str {
        match self {
            Direction::Horizontal => "horizontal",
            Direction::Vertical => "vertical",
        }
    }
}

/// Settings for one stitch run.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StitchConfig {
    pub columns: u32,
    pub rows: u32,
    pub direction: Direction,
    /// Factor applied to every tile before placement. Values of 1 or more
    /// leave tiles untouched.
    pub scale_factor: f64,
    /// Grid indices that hold no tile and render as black placeholders.
    pub empty_slots: Vec<usize>,
    pub crop: CropConfig,
    pub thumbnail: ThumbnailConfig,
    /// Fallback scale when the first tile carries none.
    pub scaling: ScalingConfig,
    pub output: OutputConfig,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            columns: 2,
            rows: 2,
            direction: Direction::Horizontal,
            scale_factor: 1.0,
            empty_slots: Vec::new(),
            crop: CropConfig::default(),
            thumbnail: ThumbnailConfig::default(),
            scaling: ScalingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl StitchConfig {
    /// Number of grid cells, i.e. the exact tile count a run expects.
    pub fn tile_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(ConfigError::Validation(
                "columns and rows must be at least 1".into(),
            ));
        }
        if !(self.scale_factor > 0.0 && self.scale_factor.is_finite()) {
            return Err(ConfigError::Validation(
                "scale_factor must be a positive number".into(),
            ));
        }
        if self.thumbnail.max_width == 0 {
            return Err(ConfigError::Validation(
                "thumbnail.max_width must be non-zero".into(),
            ));
        }
        if let Some(slot) = self.empty_slots.iter().find(|&&s| s >= self.tile_count()) {
            return Err(ConfigError::Validation(format!(
                "empty slot {} is outside the {}x{} grid",
                slot, self.columns, self.rows
            )));
        }
        if !(self.scaling.x > 0.0 && self.scaling.y > 0.0) {
            return Err(ConfigError::Validation(
                "scaling.x and scaling.y must be positive".into(),
            ));
        }
        for (key, text) in [
            ("scaling.unit", &self.scaling.unit),
            ("scaling.editor", &self.scaling.editor),
        ] {
            if text.chars().any(char::is_control) {
                return Err(ConfigError::Validation(format!(
                    "{key} must not contain control characters"
                )));
            }
        }
        if self.scaling.unit.trim().is_empty() {
            return Err(ConfigError::Validation("scaling.unit must not be empty".into()));
        }
        Ok(())
    }
}

/// Top-left anchored crop box. A width of 0 disables cropping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CropConfig {
    pub width: u32,
    pub height: u32,
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailConfig {
    pub enabled: bool,
    /// A thumbnail is written only when the result is wider than this.
    pub max_width: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_width: 2000,
        }
    }
}

/// Default physical pixel size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalingConfig {
    pub x: f64,
    pub y: f64,
    pub unit: String,
    pub editor: String,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            unit: "nm".to_string(),
            editor: "FEI-MAPS".to_string(),
        }
    }
}

impl ScalingConfig {
    pub fn descriptor(&self) -> ScalingDescriptor {
        ScalingDescriptor {
            x: self.x,
            y: self.y,
            unit: self.unit.clone(),
            editor: self.editor.clone(),
        }
    }
}

/// Where and under which name results are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Output directory. Defaults to the parent of the tile directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// Result base name. Defaults to the tile directory's name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Open the result in the system viewer after writing.
    pub open: bool,
}

/// Values given on the command line. `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub columns: Option<u32>,
    pub rows: Option<u32>,
    pub vertical: bool,
    pub scale_factor: Option<f64>,
    pub thumbnail: bool,
    pub open: bool,
    pub crop_width: Option<u32>,
    pub crop_height: Option<u32>,
    pub output_directory: Option<PathBuf>,
    pub name: Option<String>,
    pub empty_slots: Vec<usize>,
}

impl CliOverrides {
    /// Apply the overrides on top of `config`.
    ///
    /// When only one of columns/rows is given, the other mirrors it. Flags
    /// only switch features on; they never switch off a file setting.
    pub fn apply(self, mut config: StitchConfig) -> StitchConfig {
        match (self.columns, self.rows) {
            (Some(columns), Some(rows)) => {
                config.columns = columns;
                config.rows = rows;
            }
            (Some(n), None) | (None, Some(n)) => {
                config.columns = n;
                config.rows = n;
            }
            (None, None) => {}
        }
        if self.vertical {
            config.direction = Direction::Vertical;
        }
        if let Some(factor) = self.scale_factor {
            config.scale_factor = factor;
        }
        if self.thumbnail {
            config.thumbnail.enabled = true;
        }
        if self.open {
            config.output.open = true;
        }
        if let Some(width) = self.crop_width {
            config.crop.width = width;
        }
        if let Some(height) = self.crop_height {
            config.crop.height = height;
        }
        if self.output_directory.is_some() {
            config.output.directory = self.output_directory;
        }
        if self.name.is_some() {
            config.output.name = self.name;
        }
        if !self.empty_slots.is_empty() {
            config.empty_slots = self.empty_slots;
        }
        config
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(StitchConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
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

/// Load `stitch.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config for a tile directory: stock defaults with `stitch.toml`
/// merged on top. Validation happens after CLI overrides are applied.
pub fn load_config(dir: &Path) -> Result<StitchConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(dir)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    Ok(merged.try_into()?)
}

/// Returns a fully-commented stock `stitch.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# tile-stitch configuration
# =========================
# Place this file as stitch.toml inside the tile directory.
# All settings are optional; values shown are the defaults.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# Grid size. Tiles are counted and must equal columns * rows.
columns = 2
rows = 2

# Fill order of the sorted tile list:
#   "horizontal" - left to right, then the next row
#   "vertical"   - top to bottom, then the next column
direction = "horizontal"

# Shrink every tile by this factor before stitching (e.g. 0.5).
# Values of 1 or more keep the tiles at full size.
scale_factor = 1.0

# Grid positions (0-based, in fill order) that have no tile.
# They are rendered as black cells the size of the first tile.
empty_slots = []

# ---------------------------------------------------------------------------
# Crop (anchored at the top-left corner)
# ---------------------------------------------------------------------------
[crop]
# 0 disables cropping.
width = 0
# 0 keeps the full canvas height.
height = 0

# ---------------------------------------------------------------------------
# Thumbnail (written to <output>/thumbnails/)
# ---------------------------------------------------------------------------
[thumbnail]
enabled = false
# Only results wider than this get a thumbnail, scaled to this width.
max_width = 2000

# ---------------------------------------------------------------------------
# Fallback pixel scaling, used when the tiles carry no scale metadata
# ---------------------------------------------------------------------------
[scaling]
x = 1.0
y = 1.0
unit = "nm"
editor = "FEI-MAPS"

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# directory = "/path/to/results"   # default: parent of the tile directory
# name = "mosaic"                  # default: name of the tile directory
open = false
"##
}
