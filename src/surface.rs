//! Drawing surfaces.
//!
//! [`Surface`] is the small capability set the painters need. Two backends:
//! [`RasterSurface`] rasterises in software onto an `RgbaImage` (exports, mask,
//! tests) and [`PainterSurface`] forwards to an egui painter (the live canvas).

use std::sync::OnceLock;

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use eframe::egui;
use image::{Rgba, RgbaImage};
use tracing::warn;

use crate::error::{EditorError, Result};
use crate::geometry::{Bounds, Point};
use crate::stroke::Color4;

/// Largest side accepted for an offscreen surface.
pub const MAX_SURFACE_SIDE: u32 = 16_384;
const MAX_SURFACE_PIXELS: u64 = 1 << 28;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pen {
    pub width: f64,
    pub color: Color4,
    pub cap: LineCap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlign {
    TopLeft,
    Center,
}

pub trait Surface {
    fn size(&self) -> (f64, f64);

    /// Replaces every pixel with `color`.
    fn clear(&mut self, color: Color4);

    fn fill_rect(&mut self, rect: Bounds, color: Color4);

    /// Strokes a polyline. Interior vertices get round joins.
    fn stroke_path(&mut self, points: &[Point], closed: bool, pen: Pen);

    fn fill_ellipse(&mut self, rect: Bounds, color: Color4);

    fn stroke_ellipse(&mut self, rect: Bounds, pen: Pen);

    fn fill_text(&mut self, text: &str, at: Point, font_size: f64, color: Color4, align: TextAlign);
}

/// Surfaces whose pixels can be read back and rewritten.
pub trait PixelSurface: Surface {
    fn pixels(&self) -> &RgbaImage;
    fn pixels_mut(&mut self) -> &mut RgbaImage;
}

// ── Raster backend ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct RasterSurface {
    image: RgbaImage,
}

impl RasterSurface {
    /// Allocates a transparent surface, refusing empty or oversized requests.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let too_big = width > MAX_SURFACE_SIDE
            || height > MAX_SURFACE_SIDE
            || u64::from(width) * u64::from(height) > MAX_SURFACE_PIXELS;
        if width == 0 || height == 0 || too_big {
            return Err(EditorError::SurfaceUnavailable { width, height });
        }
        Ok(Self {
            image: RgbaImage::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Composites `src` with its top-left corner at `(dx, dy)`.
    pub fn draw_image(&mut self, src: &RgbaImage, dx: i64, dy: i64) {
        let (w, h) = (i64::from(self.width()), i64::from(self.height()));
        for (x, y, px) in src.enumerate_pixels() {
            let tx = i64::from(x) + dx;
            let ty = i64::from(y) + dy;
            if tx < 0 || ty < 0 || tx >= w || ty >= h {
                continue;
            }
            let dst = self.image.get_pixel_mut(tx as u32, ty as u32);
            if px[3] == 255 {
                *dst = *px;
            } else {
                blend_pixel(dst, px.0, 1.0);
            }
        }
    }

    fn blend(&mut self, x: i64, y: i64, color: [u8; 4], coverage: f32) {
        if coverage <= 0.0 || x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.width() || y >= self.height() {
            return;
        }
        blend_pixel(self.image.get_pixel_mut(x, y), color, coverage.min(1.0));
    }

    /// Pixel window covering `rect` grown by `margin`, clipped to the surface.
    fn window(&self, rect: Bounds, margin: f64) -> Option<(i64, i64, i64, i64)> {
        let x0 = ((rect.left - margin).floor() as i64).max(0);
        let y0 = ((rect.top - margin).floor() as i64).max(0);
        let x1 = ((rect.right + margin).ceil() as i64).min(i64::from(self.width()));
        let y1 = ((rect.bottom + margin).ceil() as i64).min(i64::from(self.height()));
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    /// Blends `color` into every pixel of the window using a per-pixel-centre coverage.
    fn shade<F>(&mut self, rect: Bounds, margin: f64, color: Color4, coverage: F)
    where
        F: Fn(f64, f64) -> f64,
    {
        let Some((x0, y0, x1, y1)) = self.window(rect, margin) else {
            return;
        };
        let rgba = color.to_rgba8();
        for y in y0..y1 {
            for x in x0..x1 {
                let c = coverage(x as f64 + 0.5, y as f64 + 0.5);
                self.blend(x, y, rgba, c as f32);
            }
        }
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> (f64, f64) {
        (f64::from(self.width()), f64::from(self.height()))
    }

    fn clear(&mut self, color: Color4) {
        let px = Rgba(color.to_rgba8());
        for p in self.image.pixels_mut() {
            *p = px;
        }
    }

    fn fill_rect(&mut self, rect: Bounds, color: Color4) {
        // Area coverage, so pixel-aligned edges come out hard.
        self.shade(rect, 1.0, color, |cx, cy| {
            let cov_x = ((cx + 0.5).min(rect.right) - (cx - 0.5).max(rect.left)).clamp(0.0, 1.0);
            let cov_y = ((cy + 0.5).min(rect.bottom) - (cy - 0.5).max(rect.top)).clamp(0.0, 1.0);
            cov_x * cov_y
        });
    }

    fn stroke_path(&mut self, points: &[Point], closed: bool, pen: Pen) {
        let Some(extent) = Bounds::from_points(points.iter().copied()) else {
            return;
        };
        let half = pen.width.max(0.0) * 0.5;
        if half <= 0.0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.window(extent, half + 1.0) else {
            return;
        };
        let mut coverage = CoverageBuffer::new(x0, y0, x1, y1);

        let mut segments: Vec<(Point, Point)> = points.windows(2).map(|w| (w[0], w[1])).collect();
        if closed && points.len() > 2 {
            segments.push((points[points.len() - 1], points[0]));
        }
        let last = segments.len().saturating_sub(1);
        for (i, &(a, b)) in segments.iter().enumerate() {
            // Butt caps only at the open ends of the path.
            let cap_start = if closed || i > 0 { LineCap::Round } else { pen.cap };
            let cap_end = if closed || i < last { LineCap::Round } else { pen.cap };
            coverage.segment(a, b, half, cap_start, cap_end);
        }
        if segments.is_empty() {
            coverage.segment(points[0], points[0], half, pen.cap, pen.cap);
        }

        let rgba = pen.color.to_rgba8();
        for (x, y, c) in coverage.iter() {
            self.blend(x, y, rgba, c);
        }
    }

    fn fill_ellipse(&mut self, rect: Bounds, color: Color4) {
        let (rx, ry) = (rect.width() * 0.5, rect.height() * 0.5);
        if rx < 1e-6 || ry < 1e-6 {
            return;
        }
        let c = rect.center();
        self.shade(rect, 1.0, color, |px, py| {
            (0.5 - ellipse_distance(px - c.x, py - c.y, rx, ry)).clamp(0.0, 1.0)
        });
    }

    fn stroke_ellipse(&mut self, rect: Bounds, pen: Pen) {
        let (rx, ry) = (rect.width() * 0.5, rect.height() * 0.5);
        let half = pen.width.max(0.0) * 0.5;
        if half <= 0.0 {
            return;
        }
        if rx < 1e-6 || ry < 1e-6 {
            // Collapsed to a line between the extreme points.
            let flat = Pen {
                cap: LineCap::Round,
                ..pen
            };
            self.stroke_path(
                &[
                    Point::new(rect.left, rect.top),
                    Point::new(rect.right, rect.bottom),
                ],
                false,
                flat,
            );
            return;
        }
        let c = rect.center();
        self.shade(rect, half + 1.0, pen.color, |px, py| {
            let d = ellipse_distance(px - c.x, py - c.y, rx, ry).abs();
            (half + 0.5 - d).clamp(0.0, 1.0)
        });
    }

    fn fill_text(&mut self, text: &str, at: Point, font_size: f64, color: Color4, align: TextAlign) {
        let Some(font) = ui_font() else {
            return;
        };
        if text.is_empty() || font_size <= 0.0 {
            return;
        }
        let scale = PxScale::from(font_size as f32);
        let scaled = font.as_scaled(scale);

        let mut glyphs = Vec::with_capacity(text.len());
        let mut caret = 0.0f32;
        let mut previous = None;
        for ch in text.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push((id, caret));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        let ascent = scaled.ascent();
        let line_height = ascent - scaled.descent();
        let (origin_x, baseline) = match align {
            TextAlign::TopLeft => (at.x as f32, at.y as f32 + ascent),
            TextAlign::Center => (
                at.x as f32 - caret * 0.5,
                at.y as f32 - line_height * 0.5 + ascent,
            ),
        };

        let rgba = color.to_rgba8();
        for (id, x) in glyphs {
            let glyph = id.with_scale_and_position(scale, point(origin_x + x, baseline));
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            let (bx, by) = (bounds.min.x as i64, bounds.min.y as i64);
            outlined.draw(|gx, gy, c| {
                self.blend(bx + i64::from(gx), by + i64::from(gy), rgba, c);
            });
        }
    }
}

impl PixelSurface for RasterSurface {
    fn pixels(&self) -> &RgbaImage {
        &self.image
    }

    fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }
}

/// Source-over on straight (non-premultiplied) RGBA.
fn blend_pixel(dst: &mut Rgba<u8>, src: [u8; 4], coverage: f32) {
    let sa = f32::from(src[3]) / 255.0 * coverage;
    if sa <= 0.0 {
        return;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= f32::EPSILON {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    let mix = |s: u8, d: u8| -> u8 {
        ((f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    *dst = Rgba([
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}

/// First-order signed distance to an axis-aligned ellipse centred at the origin.
fn ellipse_distance(dx: f64, dy: f64, rx: f64, ry: f64) -> f64 {
    let f = ((dx / rx).powi(2) + (dy / ry).powi(2)).sqrt();
    if f < 1e-9 {
        return -rx.min(ry);
    }
    let grad = ((dx / (rx * rx)).powi(2) + (dy / (ry * ry)).powi(2)).sqrt() / f;
    (f - 1.0) / grad
}

/// Max-combined coverage for a whole path, so overlapping segments of one
/// stroke never double-blend a translucent colour.
struct CoverageBuffer {
    x0: i64,
    y0: i64,
    width: i64,
    height: i64,
    cells: Vec<f32>,
}

impl CoverageBuffer {
    fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        let (width, height) = (x1 - x0, y1 - y0);
        Self {
            x0,
            y0,
            width,
            height,
            cells: vec![0.0; (width * height) as usize],
        }
    }

    fn segment(&mut self, a: Point, b: Point, half: f64, cap_a: LineCap, cap_b: LineCap) {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let len = dx.hypot(dy);
        let reach = half + 1.0;
        let x_lo = ((a.x.min(b.x) - reach).floor() as i64).max(self.x0);
        let y_lo = ((a.y.min(b.y) - reach).floor() as i64).max(self.y0);
        let x_hi = ((a.x.max(b.x) + reach).ceil() as i64).min(self.x0 + self.width);
        let y_hi = ((a.y.max(b.y) + reach).ceil() as i64).min(self.y0 + self.height);

        for y in y_lo..y_hi {
            for x in x_lo..x_hi {
                let p = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                let c = segment_coverage(p, a, b, dx, dy, len, half, cap_a, cap_b);
                if c > 0.0 {
                    let idx = ((y - self.y0) * self.width + (x - self.x0)) as usize;
                    self.cells[idx] = self.cells[idx].max(c as f32);
                }
            }
        }
    }

    fn iter(&self) -> impl Iterator<Item = (i64, i64, f32)> + '_ {
        self.cells.iter().enumerate().filter_map(move |(i, &c)| {
            (c > 0.0).then(|| {
                let i = i as i64;
                (self.x0 + i % self.width, self.y0 + i / self.width, c)
            })
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn segment_coverage(
    p: Point,
    a: Point,
    b: Point,
    dx: f64,
    dy: f64,
    len: f64,
    half: f64,
    cap_a: LineCap,
    cap_b: LineCap,
) -> f64 {
    let round = |end: Point| (half + 0.5 - p.distance(end)).clamp(0.0, 1.0);
    if len < 1e-9 {
        return if cap_a == LineCap::Round || cap_b == LineCap::Round {
            round(a)
        } else {
            0.0
        };
    }
    let (ux, uy) = (dx / len, dy / len);
    let along = (p.x - a.x) * ux + (p.y - a.y) * uy;
    let across = ((p.x - a.x) * uy - (p.y - a.y) * ux).abs();
    let body = (half + 0.5 - across).clamp(0.0, 1.0);

    if along < 0.0 {
        return match cap_a {
            LineCap::Round => round(a),
            LineCap::Butt => body * (along + 0.5).clamp(0.0, 1.0),
        };
    }
    if along > len {
        return match cap_b {
            LineCap::Round => round(b),
            LineCap::Butt => body * (len - along + 0.5).clamp(0.0, 1.0),
        };
    }
    let mut c = body;
    if cap_a == LineCap::Butt {
        c *= (along + 0.5).clamp(0.0, 1.0);
    }
    if cap_b == LineCap::Butt {
        c *= (len - along + 0.5).clamp(0.0, 1.0);
    }
    c
}

/// The proportional face egui ships with, parsed once.
fn ui_font() -> Option<&'static FontArc> {
    static FONT: OnceLock<Option<FontArc>> = OnceLock::new();
    FONT.get_or_init(|| match FontArc::try_from_slice(epaint_default_fonts::UBUNTU_LIGHT) {
        Ok(font) => Some(font),
        Err(err) => {
            warn!("text will not be rasterised: {err}");
            None
        }
    })
    .as_ref()
}

// ── egui backend ────────────────────────────────────────────────────────────

/// Paints into an egui layer. `origin` is the screen position of display (0, 0).
pub struct PainterSurface<'a> {
    painter: &'a egui::Painter,
    origin: egui::Pos2,
    size: egui::Vec2,
}

impl<'a> PainterSurface<'a> {
    pub fn new(painter: &'a egui::Painter, rect: egui::Rect) -> Self {
        Self {
            painter,
            origin: rect.min,
            size: rect.size(),
        }
    }

    fn pos(&self, p: Point) -> egui::Pos2 {
        self.origin + egui::vec2(p.x as f32, p.y as f32)
    }

    fn rect(&self, b: Bounds) -> egui::Rect {
        egui::Rect::from_min_max(
            self.pos(Point::new(b.left, b.top)),
            self.pos(Point::new(b.right, b.bottom)),
        )
    }

    fn stroke(pen: Pen) -> egui::Stroke {
        egui::Stroke::new(pen.width as f32, pen.color.to_egui())
    }
}

impl Surface for PainterSurface<'_> {
    fn size(&self) -> (f64, f64) {
        (f64::from(self.size.x), f64::from(self.size.y))
    }

    fn clear(&mut self, color: Color4) {
        // egui redraws every frame from scratch; only an opaque clear paints.
        if color.a > 0.0 {
            let rect = egui::Rect::from_min_size(self.origin, self.size);
            self.painter.rect_filled(rect, 0.0, color.to_egui());
        }
    }

    fn fill_rect(&mut self, rect: Bounds, color: Color4) {
        self.painter
            .rect_filled(self.rect(rect), 0.0, color.to_egui());
    }

    fn stroke_path(&mut self, points: &[Point], closed: bool, pen: Pen) {
        let pts: Vec<egui::Pos2> = points.iter().map(|p| self.pos(*p)).collect();
        if pts.is_empty() {
            return;
        }
        if !closed && pen.cap == LineCap::Round {
            let radius = pen.width as f32 * 0.5;
            for end in [pts[0], pts[pts.len() - 1]] {
                self.painter
                    .circle_filled(end, radius, pen.color.to_egui());
            }
        }
        let shape = if closed {
            egui::Shape::closed_line(pts, Self::stroke(pen))
        } else {
            egui::Shape::line(pts, Self::stroke(pen))
        };
        self.painter.add(shape);
    }

    fn fill_ellipse(&mut self, rect: Bounds, color: Color4) {
        let r = self.rect(rect);
        self.painter.add(egui::Shape::ellipse_filled(
            r.center(),
            r.size() * 0.5,
            color.to_egui(),
        ));
    }

    fn stroke_ellipse(&mut self, rect: Bounds, pen: Pen) {
        let r = self.rect(rect);
        self.painter.add(egui::Shape::ellipse_stroke(
            r.center(),
            r.size() * 0.5,
            Self::stroke(pen),
        ));
    }

    fn fill_text(&mut self, text: &str, at: Point, font_size: f64, color: Color4, align: TextAlign) {
        let anchor = match align {
            TextAlign::TopLeft => egui::Align2::LEFT_TOP,
            TextAlign::Center => egui::Align2::CENTER_CENTER,
        };
        self.painter.text(
            self.pos(at),
            anchor,
            text,
            egui::FontId::proportional(font_size as f32),
            color.to_egui(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(w: u32, h: u32) -> RasterSurface {
        let mut s = RasterSurface::new(w, h).unwrap();
        s.clear(Color4::WHITE);
        s
    }

    fn pen(width: f64, cap: LineCap) -> Pen {
        Pen {
            width,
            color: Color4::BLACK,
            cap,
        }
    }

    #[test]
    fn refuses_empty_and_oversized_surfaces() {
        assert!(matches!(
            RasterSurface::new(0, 10),
            Err(EditorError::SurfaceUnavailable { width: 0, height: 10 })
        ));
        assert!(RasterSurface::new(MAX_SURFACE_SIDE + 1, 1).is_err());
        assert!(RasterSurface::new(1, 1).is_ok());
    }

    #[test]
    fn butt_capped_segment_stops_at_endpoints() {
        let mut s = white(60, 30);
        s.stroke_path(
            &[Point::new(10.0, 10.0), Point::new(50.0, 10.0)],
            false,
            pen(20.0, LineCap::Butt),
        );
        assert_eq!(s.pixel(30, 10), [0, 0, 0, 255]);
        assert_eq!(s.pixel(30, 0), [0, 0, 0, 255]);
        assert_eq!(s.pixel(5, 5), [255, 255, 255, 255]);
        assert_eq!(s.pixel(55, 10), [255, 255, 255, 255]);
    }

    #[test]
    fn round_cap_on_tiny_segment_paints_a_dot() {
        let mut s = white(20, 20);
        let c = Point::new(10.0, 10.0);
        s.stroke_path(&[c, c.offset(0.01, 0.0)], false, pen(8.0, LineCap::Round));
        assert_eq!(s.pixel(10, 10), [0, 0, 0, 255]);
        assert_eq!(s.pixel(10, 7), [0, 0, 0, 255]);
        assert_eq!(s.pixel(10, 1), [255, 255, 255, 255]);
    }

    #[test]
    fn translucent_path_does_not_darken_at_joins() {
        let mut s = white(40, 40);
        let grey = Pen {
            width: 6.0,
            color: Color4::BLACK.with_alpha(0.5),
            cap: LineCap::Butt,
        };
        s.stroke_path(
            &[
                Point::new(5.0, 20.0),
                Point::new(20.0, 20.0),
                Point::new(20.0, 35.0),
            ],
            false,
            grey,
        );
        assert_eq!(s.pixel(20, 20), s.pixel(12, 20));
    }

    #[test]
    fn aligned_fill_rect_is_hard_edged() {
        let mut s = white(10, 10);
        s.fill_rect(Bounds::new(0.0, 0.0, 5.0, 5.0), Color4::BLACK);
        assert_eq!(s.pixel(4, 4), [0, 0, 0, 255]);
        assert_eq!(s.pixel(5, 5), [255, 255, 255, 255]);
        assert_eq!(s.pixel(0, 9), [255, 255, 255, 255]);
    }

    #[test]
    fn filled_ellipse_covers_centre_not_corners() {
        let mut s = white(40, 20);
        s.fill_ellipse(Bounds::new(0.0, 0.0, 40.0, 20.0), Color4::BLACK);
        assert_eq!(s.pixel(20, 10), [0, 0, 0, 255]);
        assert_eq!(s.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(s.pixel(39, 19), [255, 255, 255, 255]);
    }

    #[test]
    fn ellipse_outline_leaves_centre_untouched() {
        let mut s = white(40, 40);
        s.stroke_ellipse(Bounds::new(4.0, 4.0, 36.0, 36.0), pen(2.0, LineCap::Butt));
        assert_eq!(s.pixel(20, 20), [255, 255, 255, 255]);
        assert_eq!(s.pixel(20, 4), [0, 0, 0, 255]);
    }

    #[test]
    fn text_puts_ink_near_anchor() {
        let mut s = white(120, 40);
        s.fill_text("HH", Point::new(4.0, 4.0), 24.0, Color4::BLACK, TextAlign::TopLeft);
        let inked = s.pixels().pixels().filter(|p| p.0[0] < 128).count();
        assert!(inked > 0);
        assert_eq!(s.pixel(110, 35), [255, 255, 255, 255]);
    }

    #[test]
    fn draw_image_clips_negative_offsets() {
        let mut src = RgbaImage::new(4, 4);
        for p in src.pixels_mut() {
            *p = Rgba([9, 8, 7, 255]);
        }
        let mut s = white(4, 4);
        s.draw_image(&src, -2, 1);
        assert_eq!(s.pixel(0, 1), [9, 8, 7, 255]);
        assert_eq!(s.pixel(2, 1), [255, 255, 255, 255]);
        assert_eq!(s.pixel(0, 0), [255, 255, 255, 255]);
    }
}
