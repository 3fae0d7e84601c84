//! Editor configuration
//!
//! Configuration can be loaded from a JSON file, environment variables, or
//! created programmatically. Every field has a default, so a partial file is
//! valid.

use crate::annotation::{Point, Rgb, Size, StoreLimits};
use crate::download::DirectorySink;
use crate::font_catalog::FontId;
use crate::pdf_export::{ExportOptions, FontFallback};
use crate::viewport::HeightNormalization;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Defaults for annotations created with "add text"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDefaults {
    pub text: String,
    pub position: Point,
    pub font_size: f32,
    pub color: Rgb,
    /// Catalog default when `None`
    pub font: Option<FontId>,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            text: "New text".to_owned(),
            position: Point::new(100.0, 100.0),
            font_size: 16.0,
            color: Rgb::BLACK,
            font: None,
        }
    }
}

/// Defaults for annotations created with "add shape"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeDefaults {
    pub position: Point,
    pub size: Size,
    pub color: Rgb,
    pub opacity: f32,
}

impl Default for ShapeDefaults {
    fn default() -> Self {
        Self {
            position: Point::new(150.0, 150.0),
            size: Size::new(100.0, 50.0),
            color: Rgb::new(0.9, 0.9, 0.0),
            opacity: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontSizeRange {
    pub min: f32,
    pub max: f32,
}

impl Default for FontSizeRange {
    fn default() -> Self {
        Self { min: 8.0, max: 72.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Preview render width used until the host reports one
    pub default_viewport_width: f32,
    pub height_normalization: HeightNormalization,
    /// Smallest shape width/height in preview pixels
    pub min_shape_size: f32,
    pub font_size_range: FontSizeRange,
    /// Hit radius around a shape's bottom-right corner, in preview pixels
    pub resize_handle_radius: f32,
    pub text_defaults: TextDefaults,
    pub shape_defaults: ShapeDefaults,
    pub export: ExportOptions,
    pub font_fetch_timeout_secs: u64,
    /// JSON font catalog replacing the built-in one
    pub font_catalog_path: Option<PathBuf>,
    /// Where exports are written; the user's download directory when unset
    pub download_dir: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_viewport_width: 700.0,
            height_normalization: HeightNormalization::AspectCorrect,
            min_shape_size: 20.0,
            font_size_range: FontSizeRange::default(),
            resize_handle_radius: 10.0,
            text_defaults: TextDefaults::default(),
            shape_defaults: ShapeDefaults::default(),
            export: ExportOptions::default(),
            font_fetch_timeout_secs: 15,
            font_catalog_path: None,
            download_dir: None,
        }
    }
}

impl EditorConfig {
    pub fn with_viewport_width(mut self, width: f32) -> Self {
        self.default_viewport_width = width;
        self
    }

    pub fn with_height_normalization(mut self, normalization: HeightNormalization) -> Self {
        self.height_normalization = normalization;
        self
    }

    pub fn with_min_shape_size(mut self, size: f32) -> Self {
        self.min_shape_size = size;
        self
    }

    pub fn with_font_size_range(mut self, min: f32, max: f32) -> Self {
        self.font_size_range = FontSizeRange { min, max };
        self
    }

    pub fn with_export_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.export.file_prefix = prefix.into();
        self
    }

    pub fn with_font_fallback(mut self, fallback: FontFallback) -> Self {
        self.export.font_fallback = fallback;
        self
    }

    pub fn with_font_catalog_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.font_catalog_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_download_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.download_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Sink writing into `download_dir`, or the user's download directory.
    pub fn download_sink(&self) -> DirectorySink {
        match &self.download_dir {
            Some(dir) => DirectorySink::new(dir),
            None => DirectorySink::downloads(),
        }
    }

    pub fn font_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.font_fetch_timeout_secs)
    }

    /// Bounds the annotation store enforces on every write
    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits {
            min_shape_size: self.min_shape_size,
            min_font_size: self.font_size_range.min,
            max_font_size: self.font_size_range.max,
            default_font_size: self.text_defaults.font_size,
        }
    }

    /// Returns the default configuration file location for the current platform.
    ///
    /// - macOS: ~/Library/Application Support/pdf-overlay/config.json
    /// - Linux: ~/.config/pdf-overlay/config.json
    /// - Windows: %APPDATA%\pdf-overlay\config.json
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("pdf-overlay").join("config.json"),
            None => PathBuf::from("pdf-overlay.json"),
        }
    }

    /// Loads configuration from environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Applies environment overrides:
    ///
    /// - `PDF_OVERLAY_VIEWPORT_WIDTH`: preview width in pixels
    /// - `PDF_OVERLAY_HEIGHT_MODE`: `aspect` or a fixed height in pixels
    /// - `PDF_OVERLAY_MIN_SHAPE_SIZE`: shape size floor in pixels
    /// - `PDF_OVERLAY_EXPORT_PREFIX`: prefix of the exported file name
    /// - `PDF_OVERLAY_FONT_FALLBACK`: `abort` or `standard`
    /// - `PDF_OVERLAY_FONT_TIMEOUT_SECS`: font download timeout
    /// - `PDF_OVERLAY_FONT_CATALOG`: path of a JSON font catalog
    /// - `PDF_OVERLAY_DOWNLOAD_DIR`: directory exports are written to
    pub fn apply_env(mut self) -> Result<Self, ConfigError> {
        if let Some(val) = env_var("PDF_OVERLAY_VIEWPORT_WIDTH") {
            self.default_viewport_width = parse_env("PDF_OVERLAY_VIEWPORT_WIDTH", &val)?;
        }

        if let Some(val) = env_var("PDF_OVERLAY_HEIGHT_MODE") {
            self.height_normalization = match val.trim() {
                "aspect" | "aspect_correct" => HeightNormalization::AspectCorrect,
                other => HeightNormalization::Fixed(parse_env("PDF_OVERLAY_HEIGHT_MODE", other)?),
            };
        }

        if let Some(val) = env_var("PDF_OVERLAY_MIN_SHAPE_SIZE") {
            self.min_shape_size = parse_env("PDF_OVERLAY_MIN_SHAPE_SIZE", &val)?;
        }

        if let Some(val) = env_var("PDF_OVERLAY_EXPORT_PREFIX") {
            self.export.file_prefix = val;
        }

        if let Some(val) = env_var("PDF_OVERLAY_FONT_FALLBACK") {
            self.export.font_fallback = match val.trim() {
                "abort" => FontFallback::Abort,
                "standard" => FontFallback::Standard,
                _ => return Err(ConfigError::InvalidValue("PDF_OVERLAY_FONT_FALLBACK".to_string())),
            };
        }

        if let Some(val) = env_var("PDF_OVERLAY_FONT_TIMEOUT_SECS") {
            self.font_fetch_timeout_secs = parse_env("PDF_OVERLAY_FONT_TIMEOUT_SECS", &val)?;
        }

        if let Some(val) = env_var("PDF_OVERLAY_FONT_CATALOG") {
            self.font_catalog_path = Some(PathBuf::from(val));
        }

        if let Some(val) = env_var("PDF_OVERLAY_DOWNLOAD_DIR") {
            self.download_dir = Some(PathBuf::from(val));
        }

        self.validate()?;
        Ok(self)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Rejects values the editor cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |value: f32| value.is_finite() && value > 0.0;

        if !positive(self.default_viewport_width) {
            return Err(ConfigError::InvalidValue("default_viewport_width".to_string()));
        }
        if let HeightNormalization::Fixed(height) = self.height_normalization {
            if !positive(height) {
                return Err(ConfigError::InvalidValue("height_normalization".to_string()));
            }
        }
        if !(self.min_shape_size.is_finite() && self.min_shape_size >= 0.0) {
            return Err(ConfigError::InvalidValue("min_shape_size".to_string()));
        }
        let range = self.font_size_range;
        if !positive(range.min) || !positive(range.max) || range.min > range.max {
            return Err(ConfigError::InvalidValue("font_size_range".to_string()));
        }
        let size = self.text_defaults.font_size;
        if !(size >= range.min && size <= range.max) {
            return Err(ConfigError::InvalidValue("text_defaults.font_size".to_string()));
        }
        if !(0.0..=1.0).contains(&self.shape_defaults.opacity) {
            return Err(ConfigError::InvalidValue("shape_defaults.opacity".to_string()));
        }
        if !(self.resize_handle_radius.is_finite() && self.resize_handle_radius >= 0.0) {
            return Err(ConfigError::InvalidValue("resize_handle_radius".to_string()));
        }
        if !positive(self.export.line_height) {
            return Err(ConfigError::InvalidValue("export.line_height".to_string()));
        }
        if self.export.file_prefix.contains(|c| c == '/' || c == '\\') {
            return Err(ConfigError::InvalidValue("export.file_prefix".to_string()));
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for configuration key: {0}")]
    InvalidValue(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}
