use image::Rgba;
use tracing::debug;

use crate::config::EditorConfig;
use crate::error::Result;
use crate::paint::{paint_stroke, PaintMode, PaintStyle};
use crate::stroke::{Color4, Stroke};
use crate::surface::{PixelSurface, RasterSurface, Surface};
use crate::view::Transform;

const MASK_BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const MASK_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Rec. 709 luma on 8-bit channels.
pub fn luminance(px: &Rgba<u8>) -> f64 {
    0.2126 * f64::from(px[0]) + 0.7152 * f64::from(px[1]) + 0.0722 * f64::from(px[2])
}

/// Burns mask-contributing strokes into a bilevel bitmap at natural resolution.
#[derive(Clone, Debug)]
pub struct MaskRasterizer {
    threshold: f64,
    style: PaintStyle,
}

impl Default for MaskRasterizer {
    fn default() -> Self {
        Self {
            threshold: 128.0,
            style: PaintStyle::default(),
        }
    }
}

impl MaskRasterizer {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            threshold: config.mask_threshold,
            style: PaintStyle::from_config(config),
        }
    }

    /// White everywhere, black under every `is_mask` stroke. Every pixel ends up
    /// either `(0,0,0,255)` or `(255,255,255,255)`.
    pub fn rasterize(&self, width: u32, height: u32, strokes: &[Stroke]) -> Result<RasterSurface> {
        let mut surface = RasterSurface::new(width, height)?;
        surface.clear(Color4::WHITE);
        let mut painted = 0usize;
        for stroke in strokes.iter().filter(|s| s.is_mask) {
            paint_stroke(
                &mut surface,
                stroke,
                &Transform::IDENTITY,
                PaintMode::Mask,
                &self.style,
            );
            painted += 1;
        }
        self.binarize(&mut surface);
        debug!(width, height, painted, "rasterized mask");
        Ok(surface)
    }

    /// Thresholds on luminance and forces alpha to opaque.
    pub fn binarize<S: PixelSurface + ?Sized>(&self, surface: &mut S) {
        for px in surface.pixels_mut().pixels_mut() {
            *px = if luminance(px) < self.threshold {
                MASK_BLACK
            } else {
                MASK_WHITE
            };
        }
    }
}
