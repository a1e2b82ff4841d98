use crate::config::EditorConfig;
use crate::geometry::{Bounds, Point};
use crate::stroke::{Color4, Stroke, StrokeShape};
use crate::surface::{LineCap, Pen, Surface, TextAlign};
use crate::view::Transform;

/// Offset given to a single-point freehand stroke so it still paints a dot.
const DOT_NUDGE: f64 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintMode {
    /// Stroke colours, translucent black fills, labels and text.
    Annotated,
    /// Opaque black geometry only.
    Mask,
}

/// Fill and label settings shared by every painter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintStyle {
    pub fill_alpha: f32,
    pub label_color: Color4,
    pub label_scale: f64,
    pub label_min_font: f64,
    pub label_max_font: f64,
}

impl Default for PaintStyle {
    fn default() -> Self {
        Self {
            fill_alpha: 0.5,
            label_color: Color4::WHITE,
            label_scale: 0.2,
            label_min_font: 12.0,
            label_max_font: 96.0,
        }
    }
}

impl PaintStyle {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            fill_alpha: config.fill_alpha,
            label_color: config.label_color,
            label_scale: config.label_scale,
            label_min_font: config.label_min_font,
            label_max_font: config.label_max_font,
        }
    }

    /// Label size in natural pixels, proportional to the shape's smaller side.
    /// An inverted min/max pair resolves to the max.
    pub fn label_font_size(&self, shape: Bounds) -> f64 {
        (shape.width().min(shape.height()) * self.label_scale)
            .max(self.label_min_font)
            .min(self.label_max_font)
    }
}

/// Paints one stroke through `transform`, following the per-tool geometry rules.
pub fn paint_stroke<S: Surface + ?Sized>(
    surface: &mut S,
    stroke: &Stroke,
    transform: &Transform,
    mode: PaintMode,
    style: &PaintStyle,
) {
    let ink = match mode {
        PaintMode::Annotated => stroke.color,
        PaintMode::Mask => Color4::BLACK,
    };
    let fill = match mode {
        PaintMode::Annotated => Color4::BLACK.with_alpha(style.fill_alpha),
        PaintMode::Mask => Color4::BLACK,
    };
    let pen = Pen {
        width: transform.length(stroke.line_width),
        color: ink,
        cap: LineCap::Butt,
    };

    match &stroke.shape {
        StrokeShape::Freehand { points } => {
            let mapped: Vec<Point> = points.iter().map(|p| transform.apply(*p)).collect();
            match mapped.as_slice() {
                [] => {}
                [only] => surface.stroke_path(
                    &[*only, only.offset(DOT_NUDGE, 0.0)],
                    false,
                    Pen {
                        cap: LineCap::Round,
                        ..pen
                    },
                ),
                path => surface.stroke_path(path, false, pen),
            }
        }
        StrokeShape::Rectangle {
            start,
            end,
            filled,
            label,
        } => {
            let natural = Bounds::from_corners(*start, *end);
            let rect = Bounds::from_corners(transform.apply(*start), transform.apply(*end));
            if *filled {
                surface.fill_rect(rect, fill);
            }
            surface.stroke_path(&rect.corners(), true, pen);
            paint_label(surface, label.as_deref(), natural, transform, mode, style);
        }
        StrokeShape::Ellipse {
            start,
            end,
            filled,
            label,
        } => {
            let natural = Bounds::from_corners(*start, *end);
            let rect = Bounds::from_corners(transform.apply(*start), transform.apply(*end));
            if *filled {
                surface.fill_ellipse(rect, fill);
            }
            surface.stroke_ellipse(rect, pen);
            paint_label(surface, label.as_deref(), natural, transform, mode, style);
        }
        StrokeShape::Text {
            anchor,
            content,
            font_size,
        } => {
            if mode == PaintMode::Annotated {
                surface.fill_text(
                    content,
                    transform.apply(*anchor),
                    transform.length(*font_size),
                    ink,
                    TextAlign::TopLeft,
                );
            }
        }
    }
}

fn paint_label<S: Surface + ?Sized>(
    surface: &mut S,
    label: Option<&str>,
    natural: Bounds,
    transform: &Transform,
    mode: PaintMode,
    style: &PaintStyle,
) {
    let Some(text) = label.filter(|t| !t.is_empty()) else {
        return;
    };
    if mode == PaintMode::Mask {
        return;
    }
    surface.fill_text(
        text,
        transform.apply(natural.center()),
        transform.length(style.label_font_size(natural)),
        style.label_color,
        TextAlign::Center,
    );
}
