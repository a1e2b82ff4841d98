//! Display/natural coordinate mapping.
//!
//! Strokes are stored in natural image space. Everything on screen is derived
//! from a [`ViewMetrics`] recomputed on load and on every viewport resize.

use crate::geometry::Point;

/// Scale and padding between the natural bitmap and its on-screen canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewMetrics {
    /// Display pixels per natural pixel. Always finite and positive.
    pub scale: f64,
    /// Off-image margin on every side, in display pixels.
    pub padding: f64,
    pub display_image_width: f64,
    pub display_image_height: f64,
    pub display_canvas_width: f64,
    pub display_canvas_height: f64,
}

impl ViewMetrics {
    /// Fits the natural image into the available viewport.
    ///
    /// A zero-sized container (or natural size) would produce a non-finite or
    /// non-positive scale; those fall back to `1.0`.
    pub fn compute(
        natural: (u32, u32),
        available: (f64, f64),
        natural_padding: f64,
        margin_factor: f64,
    ) -> Self {
        let (nw, nh) = (f64::from(natural.0), f64::from(natural.1));
        let fit = (available.0 / nw).min(available.1 / nh) * margin_factor;
        let scale = if fit.is_finite() && fit > 0.0 { fit } else { 1.0 };
        Self::with_scale(natural, scale, natural_padding)
    }

    pub fn with_scale(natural: (u32, u32), scale: f64, natural_padding: f64) -> Self {
        let padding = scale * natural_padding.max(0.0);
        let display_image_width = f64::from(natural.0) * scale;
        let display_image_height = f64::from(natural.1) * scale;
        Self {
            scale,
            padding,
            display_image_width,
            display_image_height,
            display_canvas_width: display_image_width + 2.0 * padding,
            display_canvas_height: display_image_height + 2.0 * padding,
        }
    }

    pub fn to_natural(&self, display: Point) -> Point {
        Point::new(
            (display.x - self.padding) / self.scale,
            (display.y - self.padding) / self.scale,
        )
    }

    pub fn to_display(&self, natural: Point) -> Point {
        self.transform().apply(natural)
    }

    pub fn transform(&self) -> Transform {
        Transform {
            scale: self.scale,
            offset_x: self.padding,
            offset_y: self.padding,
        }
    }
}

/// Uniform scale followed by a translation. Maps natural space onto whatever
/// surface is being painted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    pub fn translate(dx: f64, dy: f64) -> Self {
        Self {
            scale: 1.0,
            offset_x: dx,
            offset_y: dy,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.offset_x,
            p.y * self.scale + self.offset_y,
        )
    }

    pub fn length(&self, len: f64) -> f64 {
        len * self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_limiting_axis_with_margin() {
        let m = ViewMetrics::compute((200, 100), (1000.0, 1000.0), 1024.0, 0.98);
        assert!((m.scale - 4.9).abs() < 1e-9);
        assert!((m.padding - 4.9 * 1024.0).abs() < 1e-6);
        assert!((m.display_image_width - 980.0).abs() < 1e-9);
        assert!((m.display_canvas_height - (490.0 + 2.0 * m.padding)).abs() < 1e-9);
    }

    #[test]
    fn degenerate_container_falls_back_to_unit_scale() {
        let zero = ViewMetrics::compute((200, 100), (0.0, 0.0), 10.0, 0.98);
        assert_eq!(zero.scale, 1.0);
        assert_eq!(zero.padding, 10.0);

        let no_image = ViewMetrics::compute((0, 0), (800.0, 600.0), 10.0, 0.98);
        assert_eq!(no_image.scale, 1.0);

        let negative = ViewMetrics::compute((200, 100), (-5.0, 600.0), 10.0, 0.98);
        assert_eq!(negative.scale, 1.0);
    }

    #[test]
    fn mapping_does_not_clamp_to_image() {
        let m = ViewMetrics::with_scale((100, 100), 0.5, 1024.0);
        let p = m.to_natural(Point::new(0.0, 0.0));
        assert_eq!(p, Point::new(-1024.0, -1024.0));
        assert_eq!(m.to_display(p), Point::new(0.0, 0.0));
    }
}
