// src/config.rs

//! Defines the configuration structures for `painter`.
//!
//! Settings are deserialized from a JSON file whose path is given by the
//! `PAINTER_CONFIG` environment variable. Every struct carries
//! `#[serde(default)]`, so a partial file only overrides the keys it names.
//! When the variable is unset, or the file cannot be read or parsed, the
//! defaults below are used.

use serde::{Deserialize, Serialize};
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use once_cell::sync::Lazy;

/// Environment variable holding the path of the JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "PAINTER_CONFIG";

/// Process-wide configuration, loaded on first access.
pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

// --- Top-Level Configuration Structure ---

/// Represents the complete configuration for the drawing surface.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// How operations look once rasterized.
    pub appearance: AppearanceConfig,
    /// Logger defaults.
    pub logging: LoggingConfig,
    /// Frame export settings.
    pub output: OutputConfig,
}

impl Config {
    /// Reads and parses a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Loads the file named by `PAINTER_CONFIG`, falling back to defaults.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os(CONFIG_ENV_VAR) else {
            return Config::default();
        };
        match Config::load(Path::new(&path)) {
            Ok(config) => {
                info!("Config: Loaded {}", Path::new(&path).display());
                config
            }
            Err(e) => {
                warn!("Config: {:#}. Using defaults.", e);
                Config::default()
            }
        }
    }
}

// --- Colors ---

/// An RGBA color as stored in configuration files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    0xff
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 0xff }
    }
}

impl From<Color> for image::Rgba<u8> {
    fn from(c: Color) -> Self {
        image::Rgba([c.r, c.g, c.b, c.a])
    }
}

/// Colors used by the built-in drawing operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColorScheme {
    /// Canvas color before any background is set, and after `reset`.
    pub blank: Color,
    /// Fill used by the `white` command.
    pub white: Color,
    /// Fill used by the `green` command.
    pub green: Color,
    /// Fill used by `bgrect`.
    pub rectangle: Color,
    /// Fill used by figures.
    pub figure: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        ColorScheme {
            blank: Color::rgb(0, 0, 0),
            white: Color::rgb(0xff, 0xff, 0xff),
            green: Color::rgb(0, 0xff, 0),
            rectangle: Color::rgb(0, 0, 0),
            figure: Color::rgb(0xff, 0xff, 0),
        }
    }
}

// --- Appearance Configuration ---

/// Dimensions of the "T" figure, in pixels.
///
/// The figure is a horizontal bar sitting on top of a vertical stem, and the
/// whole shape is centered on the figure's anchor point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FigureConfig {
    pub bar_width: u32,
    pub bar_height: u32,
    pub stem_width: u32,
    pub stem_height: u32,
}

impl Default for FigureConfig {
    fn default() -> Self {
        FigureConfig {
            bar_width: 160,
            bar_height: 40,
            stem_width: 40,
            stem_height: 120,
        }
    }
}

/// Visual settings handed to every texture a screen allocates.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppearanceConfig {
    pub colors: ColorScheme,
    pub figure: FigureConfig,
}

// --- Logging Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            default_filter: "info".to_string(),
        }
    }
}

// --- Output Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// File name prefix for exported frames (`<prefix>-0001.png`).
    pub frame_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            frame_prefix: "frame".to_string(),
        }
    }
}
