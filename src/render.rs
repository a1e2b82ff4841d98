use crate::config::EditorConfig;
use crate::history::StrokeHistory;
use crate::paint::{paint_stroke, PaintMode, PaintStyle};
use crate::stroke::{Color4, Stroke};
use crate::surface::Surface;
use crate::view::ViewMetrics;

/// Paints the stroke history onto the visible canvas in display space.
#[derive(Clone, Debug, Default)]
pub struct Renderer {
    style: PaintStyle,
}

impl Renderer {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            style: PaintStyle::from_config(config),
        }
    }

    /// Clears the surface and repaints everything. Same inputs, same pixels.
    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        committed: &[Stroke],
        draft: Option<&Stroke>,
        metrics: &ViewMetrics,
    ) {
        surface.clear(Color4::TRANSPARENT);
        let transform = metrics.transform();
        for stroke in committed.iter().chain(draft) {
            paint_stroke(surface, stroke, &transform, PaintMode::Annotated, &self.style);
        }
    }

    pub fn render_history<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        history: &StrokeHistory,
        metrics: &ViewMetrics,
    ) {
        self.render(surface, history.committed(), history.draft(), metrics);
    }
}
