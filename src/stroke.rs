use eframe::egui;
use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds, Point};

// ── Color ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color4 {
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub fn to_egui(&self) -> egui::Color32 {
        let [r, g, b, a] = self.to_rgba8();
        egui::Color32::from_rgba_unmultiplied(r, g, b, a)
    }

    pub fn from_rgb(rgb: [f32; 3]) -> Self {
        Self::rgba(rgb[0], rgb[1], rgb[2], 1.0)
    }

    pub fn rgb(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Color4 {
    fn default() -> Self {
        Self::rgba(1.0, 0.0, 0.0, 1.0)
    }
}

// ── Tools ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Pen,
    Eraser,
    Rectangle,
    Ellipse,
    Text,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::Pen,
        Tool::Eraser,
        Tool::Rectangle,
        Tool::Ellipse,
        Tool::Text,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Pen => "Pen",
            Tool::Eraser => "Erase",
            Tool::Rectangle => "Rectangle",
            Tool::Ellipse => "Ellipse",
            Tool::Text => "Text",
        }
    }

    pub fn is_freehand(&self) -> bool {
        matches!(self, Tool::Pen | Tool::Eraser)
    }

    pub fn is_shape(&self) -> bool {
        matches!(self, Tool::Rectangle | Tool::Ellipse)
    }
}

// ── Strokes ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StrokeShape {
    Freehand {
        points: Vec<Point>,
    },
    Rectangle {
        start: Point,
        end: Point,
        #[serde(default)]
        filled: bool,
        #[serde(default)]
        label: Option<String>,
    },
    Ellipse {
        start: Point,
        end: Point,
        #[serde(default)]
        filled: bool,
        #[serde(default)]
        label: Option<String>,
    },
    Text {
        anchor: Point,
        content: String,
        font_size: f64,
    },
}

/// One committed (or draft) annotation. Geometry is in natural image space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub tool: Tool,
    pub color: Color4,
    pub line_width: f64,
    #[serde(default)]
    pub is_mask: bool,
    pub shape: StrokeShape,
}

/// Approximate glyph box used where no font metrics are at hand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextMetrics {
    pub width_factor: f64,
    pub height_factor: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            width_factor: 0.6,
            height_factor: 1.2,
        }
    }
}

impl TextMetrics {
    pub fn text_bounds(&self, anchor: Point, content: &str, font_size: f64) -> Bounds {
        let chars = content.chars().count() as f64;
        Bounds::new(
            anchor.x,
            anchor.y,
            anchor.x + chars * font_size * self.width_factor,
            anchor.y + font_size * self.height_factor,
        )
    }
}

impl Stroke {
    /// Geometric extent in natural space, ignoring line width.
    pub fn bounds(&self, metrics: &TextMetrics) -> Option<Bounds> {
        match &self.shape {
            StrokeShape::Freehand { points } => Bounds::from_points(points.iter().copied()),
            StrokeShape::Rectangle { start, end, .. } | StrokeShape::Ellipse { start, end, .. } => {
                Some(Bounds::from_corners(*start, *end))
            }
            StrokeShape::Text {
                anchor,
                content,
                font_size,
            } => Some(metrics.text_bounds(*anchor, content, *font_size)),
        }
    }

    /// Where a label prompt for this stroke is anchored: the shape's centroid.
    pub fn centroid(&self) -> Option<Point> {
        match &self.shape {
            StrokeShape::Rectangle { start, end, .. } | StrokeShape::Ellipse { start, end, .. } => {
                Some(Bounds::from_corners(*start, *end).center())
            }
            _ => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match &self.shape {
            StrokeShape::Rectangle { label, .. } | StrokeShape::Ellipse { label, .. } => {
                label.as_deref()
            }
            _ => None,
        }
    }

    /// Forces the per-tool mask rule: erasers always mask, text never does.
    /// Pen and shape strokes keep the flag they were created with.
    pub fn normalized(mut self) -> Stroke {
        match self.tool {
            Tool::Eraser => self.is_mask = true,
            Tool::Text => self.is_mask = false,
            Tool::Pen | Tool::Rectangle | Tool::Ellipse => {}
        }
        self
    }

    /// Returns a copy carrying `text` as its label. Non-shape strokes are returned unchanged.
    pub fn with_label(&self, text: String) -> Stroke {
        let mut out = self.clone();
        if let StrokeShape::Rectangle { label, .. } | StrokeShape::Ellipse { label, .. } =
            &mut out.shape
        {
            *label = Some(text);
        }
        out
    }
}

// ── Drawing configuration ───────────────────────────────────────────────────

/// The ambient style consulted when the next draft stroke is created.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawingConfig {
    pub tool: Tool,
    pub color: Color4,
    pub line_width: f64,
    pub fill: bool,
    /// Burns pen/rectangle/ellipse strokes into the edit mask.
    pub mask: bool,
    pub font_size: f64,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            tool: Tool::Pen,
            color: Color4::default(),
            line_width: 6.0,
            fill: false,
            mask: false,
            font_size: 24.0,
        }
    }
}

impl DrawingConfig {
    pub fn is_mask_for(&self, tool: Tool) -> bool {
        match tool {
            Tool::Eraser => true,
            Tool::Text => false,
            Tool::Pen | Tool::Rectangle | Tool::Ellipse => self.mask,
        }
    }

    /// Starts a stroke of the current tool at `start`. Text has no draft.
    pub fn new_stroke(&self, start: Point) -> Option<Stroke> {
        let shape = match self.tool {
            Tool::Pen | Tool::Eraser => StrokeShape::Freehand {
                points: vec![start],
            },
            Tool::Rectangle => StrokeShape::Rectangle {
                start,
                end: start,
                filled: self.fill,
                label: None,
            },
            Tool::Ellipse => StrokeShape::Ellipse {
                start,
                end: start,
                filled: self.fill,
                label: None,
            },
            Tool::Text => return None,
        };
        Some(Stroke {
            tool: self.tool,
            color: self.color,
            line_width: self.line_width,
            is_mask: self.is_mask_for(self.tool),
            shape,
        })
    }

    pub fn text_stroke(&self, anchor: Point, content: String) -> Stroke {
        Stroke {
            tool: Tool::Text,
            color: self.color,
            line_width: self.line_width,
            is_mask: false,
            shape: StrokeShape::Text {
                anchor,
                content,
                font_size: self.font_size,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eraser_always_masks_and_text_never_does() {
        let mut cfg = DrawingConfig::default();
        assert!(cfg.is_mask_for(Tool::Eraser));
        assert!(!cfg.is_mask_for(Tool::Pen));
        cfg.mask = true;
        assert!(cfg.is_mask_for(Tool::Rectangle));
        assert!(!cfg.is_mask_for(Tool::Text));
    }

    #[test]
    fn normalized_enforces_tool_mask_rule() {
        let eraser: Stroke = serde_json::from_str(
            r#"{"tool":"eraser","color":{"r":0.0,"g":0.0,"b":0.0,"a":1.0},"line_width":20.0,
                "shape":{"type":"Freehand","points":[{"x":10.0,"y":10.0},{"x":50.0,"y":10.0}]}}"#,
        )
        .unwrap();
        assert!(!eraser.is_mask);
        assert!(eraser.normalized().is_mask);

        let text = DrawingConfig::default().text_stroke(Point::new(0.0, 0.0), "hi".into());
        let forged = Stroke { is_mask: true, ..text };
        assert!(!forged.normalized().is_mask);

        let pen = DrawingConfig { mask: true, ..DrawingConfig::default() }
            .new_stroke(Point::new(1.0, 1.0))
            .unwrap();
        assert!(pen.normalized().is_mask);
    }

    #[test]
    fn shape_draft_starts_degenerate() {
        let cfg = DrawingConfig {
            tool: Tool::Ellipse,
            fill: true,
            ..DrawingConfig::default()
        };
        let stroke = cfg.new_stroke(Point::new(4.0, 5.0)).unwrap();
        match stroke.shape {
            StrokeShape::Ellipse {
                start, end, filled, ..
            } => {
                assert_eq!(start, end);
                assert!(filled);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        let text = DrawingConfig {
            tool: Tool::Text,
            ..DrawingConfig::default()
        };
        assert!(text.new_stroke(Point::default()).is_none());
    }

    #[test]
    fn text_bounds_use_glyph_heuristic() {
        let cfg = DrawingConfig {
            font_size: 10.0,
            ..DrawingConfig::default()
        };
        let stroke = cfg.text_stroke(Point::new(2.0, 3.0), "abcd".into());
        let b = stroke.bounds(&TextMetrics::default()).unwrap();
        assert!((b.right - (2.0 + 4.0 * 10.0 * 0.6)).abs() < 1e-9);
        assert!((b.bottom - (3.0 + 12.0)).abs() < 1e-9);
    }

    #[test]
    fn stroke_json_is_tagged_by_shape() {
        let json = r#"{"tool":"rectangle","color":{"r":1,"g":0,"b":0,"a":1},
            "line_width":4,"shape":{"type":"Rectangle","start":{"x":1,"y":2},"end":{"x":3,"y":4}}}"#;
        let stroke: Stroke = serde_json::from_str(json).unwrap();
        assert!(!stroke.is_mask);
        assert_eq!(stroke.label(), None);
        assert_eq!(stroke.centroid(), Some(Point::new(2.0, 3.0)));
    }
}
