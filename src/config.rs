//! Persisted render settings stored as TOML under the app root.

mod defaults;
mod io;

use std::path::PathBuf;

use egui::Color32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::renderer::{Geometry, WaveformRenderer};
use crate::restrict::RestrictRecord;
use crate::waveform::{DEFAULT_EXPORT_QUALITY, ExportFormat, FillStyles, TileFeatures};

use defaults::*;
pub use io::{config_path, load_or_default, load_settings_from, save, save_to_path};

/// Default filename used to store the settings.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors that may occur while loading, saving or applying settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("Colour `{value}` for {field} is not #rrggbb or #rrggbbaa")]
    InvalidColor { field: &'static str, value: String },
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Everything needed to lay out and colour a render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Widest surface a single tile may own.
    #[serde(default = "default_max_tile_width_px")]
    pub max_tile_width_px: u32,
    #[serde(default = "default_height_px")]
    pub height_px: u32,
    /// Horizontal resolution used to derive the total width from a duration.
    #[serde(default = "default_pixels_per_second")]
    pub pixels_per_second: f64,
    #[serde(default = "default_true")]
    pub show_progress: bool,
    #[serde(default = "default_true")]
    pub show_restrict: bool,
    #[serde(default)]
    pub colors: ColorSettings,
    #[serde(default)]
    pub export: ExportSettings,
    /// Last restricted region, restored when the same file is rendered again.
    #[serde(default)]
    pub restrict: Option<RestrictRecord>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_tile_width_px: default_max_tile_width_px(),
            height_px: default_height_px(),
            pixels_per_second: default_pixels_per_second(),
            show_progress: true,
            show_restrict: true,
            colors: ColorSettings::default(),
            export: ExportSettings::default(),
            restrict: None,
        }
    }
}

/// Fill colours as `#rrggbb` or `#rrggbbaa` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSettings {
    #[serde(default = "default_wave_color")]
    pub wave: String,
    #[serde(default = "default_progress_color")]
    pub progress: String,
    #[serde(default = "default_restrict_color")]
    pub restrict: String,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            wave: default_wave_color(),
            progress: default_progress_color(),
            restrict: default_restrict_color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default)]
    pub format: ExportFormat,
    /// JPEG quality factor in `0.0..=1.0`.
    #[serde(default = "default_export_quality")]
    pub quality: f32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            quality: DEFAULT_EXPORT_QUALITY,
        }
    }
}

impl RenderSettings {
    /// Clamp numeric fields into workable ranges.
    pub fn normalized(mut self) -> Self {
        self.max_tile_width_px = clamp_tile_width(self.max_tile_width_px);
        self.height_px = clamp_height(self.height_px);
        self.pixels_per_second = clamp_pixels_per_second(self.pixels_per_second);
        self.export.quality = clamp_quality(self.export.quality);
        self
    }

    pub fn features(&self) -> TileFeatures {
        TileFeatures {
            progress: self.show_progress,
            restrict: self.show_restrict,
        }
    }

    pub fn fill_styles(&self) -> Result<FillStyles, ConfigError> {
        Ok(FillStyles {
            wave: parse_hex_color("wave", &self.colors.wave)?,
            progress: parse_hex_color("progress", &self.colors.progress)?,
            restrict: parse_hex_color("restrict", &self.colors.restrict)?,
        })
    }

    /// Layout for a file of `duration_seconds` at the configured resolution.
    pub fn geometry_for(&self, duration_seconds: f64) -> Geometry {
        let duration = if duration_seconds.is_finite() {
            duration_seconds.max(0.0)
        } else {
            0.0
        };
        let width = (duration * self.pixels_per_second).ceil().clamp(1.0, f64::from(u32::MAX));
        Geometry {
            total_width_px: width as u32,
            max_tile_width_px: self.max_tile_width_px.max(1),
            height_px: self.height_px,
        }
    }

    /// In-memory renderer using these features and colours.
    pub fn renderer(&self) -> Result<WaveformRenderer, ConfigError> {
        Ok(WaveformRenderer::in_memory(self.features(), self.fill_styles()?))
    }
}

/// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional) into an unmultiplied colour.
pub fn parse_hex_color(field: &'static str, value: &str) -> Result<Color32, ConfigError> {
    let invalid = || ConfigError::InvalidColor {
        field,
        value: value.to_string(),
    };
    let hex = value.trim().trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).map_err(|_| invalid());
    let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);
    let a = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Color32::from_rgba_unmultiplied(r, g, b, a))
}

/// Format a colour as `#rrggbb`, or `#rrggbbaa` when translucent.
pub fn format_hex_color(color: Color32) -> String {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    if a == 255 {
        format!("#{r:02x}{g:02x}{b:02x}")
    } else {
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_colors_match_fill_styles() {
        let styles = RenderSettings::default().fill_styles().unwrap();
        assert_eq!(styles, FillStyles::default());
    }

    #[test]
    fn hex_colors_parse_with_and_without_alpha() {
        assert_eq!(
            parse_hex_color("wave", "#ff8000").unwrap(),
            Color32::from_rgb(255, 128, 0)
        );
        assert_eq!(
            parse_hex_color("restrict", "787878c8").unwrap(),
            Color32::from_rgba_unmultiplied(120, 120, 120, 200)
        );
        assert!(matches!(
            parse_hex_color("progress", "#12345"),
            Err(ConfigError::InvalidColor {
                field: "progress",
                ..
            })
        ));
        assert!(parse_hex_color("wave", "#gg0000").is_err());
    }

    #[test]
    fn format_hex_round_trips_opaque_colors() {
        let color = Color32::from_rgb(250, 246, 240);
        assert_eq!(format_hex_color(color), "#faf6f0");
        assert_eq!(parse_hex_color("wave", &format_hex_color(color)).unwrap(), color);
    }

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let settings = RenderSettings {
            max_tile_width_px: 0,
            height_px: 100_000,
            pixels_per_second: f64::NAN,
            export: ExportSettings {
                format: ExportFormat::Jpeg,
                quality: 4.0,
            },
            ..RenderSettings::default()
        }
        .normalized();
        assert_eq!(settings.max_tile_width_px, 1);
        assert_eq!(settings.height_px, MAX_HEIGHT_PX);
        assert_eq!(settings.pixels_per_second, default_pixels_per_second());
        assert_eq!(settings.export.quality, 1.0);
    }

    #[test]
    fn geometry_scales_with_duration() {
        let settings = RenderSettings::default();
        let geometry = settings.geometry_for(180.0);
        assert_eq!(geometry.total_width_px, 9_000);
        assert_eq!(geometry.max_tile_width_px, 4_000);
        assert_eq!(geometry.height_px, 128);
        assert_eq!(settings.geometry_for(0.0).total_width_px, 1);
    }
}
