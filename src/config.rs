use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::encode::ExportFormat;
use crate::error::{EditorError, Result};
use crate::stroke::{Color4, DrawingConfig, TextMetrics, Tool};

/// Tunables for the editor. Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Drawable margin around the image, in natural pixels.
    pub natural_padding: f64,
    /// Shrinks the fitted scale slightly so the image never touches the viewport edge.
    pub margin_factor: f64,
    pub crop_padding: f64,
    pub crop_background: Color4,
    pub mask_threshold: f64,
    pub fill_alpha: f32,
    pub default_line_width: f64,
    pub default_font_size: f64,
    pub default_color: Color4,
    pub label_color: Color4,
    pub label_scale: f64,
    pub label_min_font: f64,
    pub label_max_font: f64,
    pub glyph_width_factor: f64,
    pub glyph_height_factor: f64,
    pub default_format: ExportFormat,
    pub default_quality: u8,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            natural_padding: 1024.0,
            margin_factor: 0.98,
            crop_padding: 32.0,
            crop_background: Color4::WHITE,
            mask_threshold: 128.0,
            fill_alpha: 0.5,
            default_line_width: 6.0,
            default_font_size: 24.0,
            default_color: Color4::default(),
            label_color: Color4::WHITE,
            label_scale: 0.2,
            label_min_font: 12.0,
            label_max_font: 96.0,
            glyph_width_factor: 0.6,
            glyph_height_factor: 1.2,
            default_format: ExportFormat::Png,
            default_quality: 90,
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: EditorConfig = serde_json::from_str(&data)?;
        config.validate()?;
        info!(path = %path.display(), "loaded editor config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("margin_factor", self.margin_factor),
            ("default_line_width", self.default_line_width),
            ("default_font_size", self.default_font_size),
            ("label_min_font", self.label_min_font),
            ("glyph_width_factor", self.glyph_width_factor),
            ("glyph_height_factor", self.glyph_height_factor),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EditorError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.label_max_font < self.label_min_font {
            return Err(EditorError::Config(
                "label_max_font must not be below label_min_font".into(),
            ));
        }
        if self.natural_padding < 0.0 || self.crop_padding < 0.0 {
            return Err(EditorError::Config("padding must not be negative".into()));
        }
        if !(0.0..=1.0).contains(&self.fill_alpha) {
            return Err(EditorError::Config("fill_alpha must be within 0..=1".into()));
        }
        Ok(())
    }

    pub fn text_metrics(&self) -> TextMetrics {
        TextMetrics {
            width_factor: self.glyph_width_factor,
            height_factor: self.glyph_height_factor,
        }
    }

    pub fn drawing_defaults(&self) -> DrawingConfig {
        DrawingConfig {
            tool: Tool::Pen,
            color: self.default_color,
            line_width: self.default_line_width,
            fill: false,
            mask: false,
            font_size: self.default_font_size,
        }
    }
}
