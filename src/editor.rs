use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::encode::{Blob, ExportOptions};
use crate::error::{EditorError, Result};
use crate::export::{Compositor, ExportHandle, ExportKind, ExportSnapshot};
use crate::geometry::Point;
use crate::history::{PendingInput, StrokeHistory};
use crate::render::Renderer;
use crate::request::EditRequest;
use crate::stroke::{Color4, DrawingConfig, Stroke, Tool};
use crate::surface::Surface;
use crate::view::ViewMetrics;

/// One editing session over one source image.
pub struct Editor {
    config: EditorConfig,
    source: Option<Arc<RgbaImage>>,
    history: StrokeHistory,
    drawing: DrawingConfig,
    viewport: (f64, f64),
    metrics: Option<ViewMetrics>,
    renderer: Renderer,
    compositor: Compositor,
}

impl Editor {
    /// Rejects configurations that fail [`EditorConfig::validate`].
    pub fn new(config: EditorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: EditorConfig) -> Self {
        Self {
            drawing: config.drawing_defaults(),
            renderer: Renderer::new(&config),
            compositor: Compositor::new(&config),
            config,
            source: None,
            history: StrokeHistory::default(),
            viewport: (0.0, 0.0),
            metrics: None,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn open(&mut self, path: &Path) -> Result<()> {
        let image = image::open(path)?.to_rgba8();
        info!(path = %path.display(), width = image.width(), height = image.height(), "opened image");
        self.load_image(image);
        Ok(())
    }

    /// Starts a fresh session on `image`.
    pub fn load_image(&mut self, image: RgbaImage) {
        self.source = Some(Arc::new(image));
        self.history.clear();
        self.recompute_metrics();
    }

    /// Ends the session. Pending exports keep their own snapshot.
    pub fn close(&mut self) {
        debug!(strokes = self.history.committed().len(), "closing editor session");
        self.source = None;
        self.history.clear();
        self.metrics = None;
    }

    pub fn is_ready(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&Arc<RgbaImage>> {
        self.source.as_ref()
    }

    pub fn natural_size(&self) -> Result<(u32, u32)> {
        self.source
            .as_ref()
            .map(|img| img.dimensions())
            .ok_or(EditorError::not_ready("natural_size"))
    }

    // ── View ────────────────────────────────────────────────────────────────

    /// New host viewport size. Strokes are untouched.
    pub fn resize(&mut self, width: f64, height: f64) {
        if self.viewport == (width, height) {
            return;
        }
        self.viewport = (width, height);
        self.recompute_metrics();
    }

    pub fn metrics(&self) -> Result<ViewMetrics> {
        self.metrics.ok_or(EditorError::not_ready("metrics"))
    }

    fn recompute_metrics(&mut self) {
        self.metrics = self.source.as_ref().map(|img| {
            ViewMetrics::compute(
                img.dimensions(),
                self.viewport,
                self.config.natural_padding,
                self.config.margin_factor,
            )
        });
    }

    // ── Pointer input (display space) ───────────────────────────────────────

    fn natural(&self, display: Point) -> Option<Point> {
        let metrics = self.metrics.as_ref();
        if metrics.is_none() {
            debug!("pointer event before image load ignored");
        }
        metrics.map(|m| m.to_natural(display))
    }

    pub fn pointer_down(&mut self, display: Point) {
        if let Some(p) = self.natural(display) {
            self.history.begin_stroke(p, &self.drawing);
        }
    }

    pub fn pointer_move(&mut self, display: Point) {
        if let Some(p) = self.natural(display) {
            self.history.extend_stroke(p);
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(index) = self.history.commit_stroke() {
            debug!(index, tool = ?self.history.committed()[index].tool, "stroke committed");
        }
    }

    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    // ── Drawing configuration ───────────────────────────────────────────────

    pub fn drawing(&self) -> &DrawingConfig {
        &self.drawing
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.drawing.tool = tool;
    }

    pub fn set_color(&mut self, color: Color4) {
        self.drawing.color = color;
    }

    pub fn set_line_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.drawing.line_width = width;
        }
    }

    pub fn set_fill_enabled(&mut self, fill: bool) {
        self.drawing.fill = fill;
    }

    pub fn set_mask_enabled(&mut self, mask: bool) {
        self.drawing.mask = mask;
    }

    pub fn set_font_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 {
            self.drawing.font_size = size;
        }
    }

    // ── History ─────────────────────────────────────────────────────────────

    pub fn history(&self) -> &StrokeHistory {
        &self.history
    }

    pub fn take_pending(&mut self) -> Option<PendingInput> {
        self.history.take_pending()
    }

    pub fn submit_text(&mut self, anchor: Point, text: &str) -> Option<usize> {
        self.history.commit_text(anchor, text, &self.drawing)
    }

    pub fn submit_label(&mut self, index: usize, text: &str) -> bool {
        self.history.attach_label(index, text)
    }

    /// Commits strokes that were produced elsewhere (e.g. loaded from JSON).
    /// Mask flags are normalised per tool on the way in.
    pub fn replay(&mut self, strokes: Vec<Stroke>) -> Result<()> {
        if self.source.is_none() {
            return Err(EditorError::not_ready("replay"));
        }
        for stroke in strokes {
            self.history.push_committed(stroke.normalized());
        }
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    // ── Rendering & export ──────────────────────────────────────────────────

    pub fn render<S: Surface + ?Sized>(&self, surface: &mut S) -> Result<()> {
        let metrics = self.metrics()?;
        self.renderer
            .render_history(surface, &self.history, &metrics);
        Ok(())
    }

    /// Deep copy of the current strokes (draft included) and the source.
    pub fn snapshot(&self) -> Result<ExportSnapshot> {
        let source = self
            .source
            .clone()
            .ok_or(EditorError::not_ready("export"))?;
        Ok(ExportSnapshot {
            source,
            strokes: self.history.snapshot(),
        })
    }

    pub fn export(&self, kind: ExportKind, options: &ExportOptions) -> Result<Blob> {
        self.compositor.export(kind, &self.snapshot()?, options)
    }

    pub fn export_mask(&self, options: &ExportOptions) -> Result<Blob> {
        self.export(ExportKind::Mask, options)
    }

    pub fn export_masked_modified(&self, options: &ExportOptions) -> Result<Blob> {
        self.export(ExportKind::MaskedModified, options)
    }

    pub fn export_cropped_annotated(&self, options: &ExportOptions) -> Result<Blob> {
        self.export(ExportKind::CroppedAnnotated, options)
    }

    /// Snapshot now, rasterise and encode on a worker.
    pub fn spawn_export(&self, kind: ExportKind, options: ExportOptions) -> Result<ExportHandle> {
        self.compositor.spawn(kind, self.snapshot()?, options)
    }

    /// The flattened composite as a `data:` URL.
    pub fn save(&self) -> Result<String> {
        let options = ExportOptions {
            format: self.config.default_format,
            quality: None,
        };
        Ok(self.export(ExportKind::Flattened, &options)?.to_data_url())
    }

    /// Pairs the untouched source with the masked-modified export.
    pub fn edit_request(&self, prompt: &str, options: &ExportOptions) -> Result<EditRequest> {
        let snapshot = self.snapshot()?;
        let original = crate::encode::encode(&snapshot.source, options, self.config.default_quality)?;
        let modified = self
            .compositor
            .export(ExportKind::MaskedModified, &snapshot, options)?;
        EditRequest::new(original, modified, prompt)
    }
}

impl Default for Editor {
    fn default() -> Self {
        Self::with_valid_config(EditorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn ready_editor() -> Editor {
        let mut editor = Editor::default();
        editor.load_image(RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255])));
        editor.resize(400.0, 400.0);
        editor
    }

    #[test]
    fn everything_fails_fast_before_image_load() {
        let editor = Editor::default();
        assert!(matches!(
            editor.export_mask(&ExportOptions::png()),
            Err(EditorError::ImageNotReady { .. })
        ));
        assert!(matches!(
            editor.natural_size(),
            Err(EditorError::ImageNotReady { .. })
        ));
        assert!(editor.save().is_err());
    }

    #[test]
    fn pointer_events_land_in_natural_space() {
        let mut editor = ready_editor();
        let m = editor.metrics().unwrap();
        editor.pointer_down(m.to_display(Point::new(10.0, 20.0)));
        editor.pointer_move(m.to_display(Point::new(30.0, 40.0)));
        editor.pointer_up();
        editor.pointer_leave();

        let strokes = editor.history().committed();
        assert_eq!(strokes.len(), 1);
        match &strokes[0].shape {
            crate::stroke::StrokeShape::Freehand { points } => {
                assert!(points[0].distance(Point::new(10.0, 20.0)) < 1e-9);
                assert!(points[1].distance(Point::new(30.0, 40.0)) < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn text_tool_round_trip_through_pending_prompt() {
        let mut editor = ready_editor();
        editor.set_tool(Tool::Text);
        editor.pointer_down(Point::new(5000.0, 5000.0));
        editor.pointer_up();
        let pending = editor.take_pending().unwrap();
        assert!(editor.submit_text(pending.anchor(), "hello").is_some());
        assert_eq!(editor.history().committed()[0].tool, Tool::Text);
    }

    #[test]
    fn failed_export_leaves_history_intact() {
        let mut editor = ready_editor();
        editor.set_tool(Tool::Rectangle);
        let m = editor.metrics().unwrap();
        editor.pointer_down(m.to_display(Point::new(0.0, 0.0)));
        editor.pointer_move(m.to_display(Point::new(20.0, 20.0)));
        editor.pointer_up();
        let before = editor.history().clone();
        let err = editor.edit_request("  ", &ExportOptions::png()).unwrap_err();
        assert!(matches!(err, EditorError::InvalidRequest(_)));
        assert_eq!(editor.history(), &before);
    }

    #[test]
    fn close_discards_session() {
        let mut editor = ready_editor();
        editor.pointer_down(Point::new(0.0, 0.0));
        editor.pointer_up();
        editor.close();
        assert!(!editor.is_ready());
        assert!(editor.history().is_empty());
        assert!(editor.spawn_export(ExportKind::Mask, ExportOptions::png()).is_err());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = EditorConfig {
            label_min_font: 50.0,
            label_max_font: 10.0,
            ..EditorConfig::default()
        };
        assert!(matches!(Editor::new(config), Err(EditorError::Config(_))));
        assert!(Editor::new(EditorConfig::default()).is_ok());
    }

    #[test]
    fn spawned_export_ignores_strokes_committed_afterwards() {
        let mut editor = ready_editor();
        editor.set_tool(Tool::Rectangle);
        let m = editor.metrics().unwrap();
        editor.pointer_down(m.to_display(Point::new(150.0, 80.0)));
        editor.pointer_move(m.to_display(Point::new(190.0, 95.0)));
        editor.pointer_up();

        let handle = editor
            .spawn_export(ExportKind::CroppedAnnotated, ExportOptions::png())
            .unwrap();
        let far = DrawingConfig::default()
            .new_stroke(Point::new(-500.5, -400.5))
            .unwrap();
        editor.replay(vec![far]).unwrap();

        let blob = handle.wait().unwrap();
        assert_eq!((blob.width, blob.height), (264, 164));
        let now = editor.export_cropped_annotated(&ExportOptions::png()).unwrap();
        assert_eq!((now.width, now.height), (765, 565));
    }

    #[test]
    fn draft_stroke_grows_the_crop() {
        let mut editor = ready_editor();
        editor.set_tool(Tool::Rectangle);
        let m = editor.metrics().unwrap();
        editor.pointer_down(m.to_display(Point::new(-100.5, -50.5)));
        editor.pointer_move(m.to_display(Point::new(-60.5, -20.5)));
        assert!(editor.history().committed().is_empty());

        // [-100.5, -50.5, 200, 100] grown by 32, snapped outward.
        let blob = editor.export_cropped_annotated(&ExportOptions::png()).unwrap();
        assert_eq!((blob.width, blob.height), (365, 215));
    }

    #[test]
    fn zero_size_shape_gesture_commits_nothing() {
        let mut editor = ready_editor();
        editor.set_tool(Tool::Ellipse);
        let at = editor.metrics().unwrap().to_display(Point::new(40.0, 40.0));
        editor.pointer_down(at);
        editor.pointer_up();
        assert!(editor.history().is_empty());
        assert_eq!(editor.take_pending(), None);
        assert!(!editor.undo());
    }

    #[test]
    fn save_returns_data_url() {
        let editor = ready_editor();
        assert!(editor.save().unwrap().starts_with("data:image/png;base64,"));
    }
}
