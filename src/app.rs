use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use eframe::egui;
use tracing::{info, warn};

use annotate_mask::{
    Blob, Color4, Editor, ExportFormat, ExportHandle, ExportKind, ExportOptions, GestureState,
    PainterSurface, PendingInput, Point, Tool,
};

use crate::headless::stem;

const CANVAS_BACKGROUND: egui::Color32 = egui::Color32::from_gray(40);

// ── App ─────────────────────────────────────────────────────────────────────

pub struct AnnotateApp {
    editor: Editor,
    image_path: PathBuf,
    out_dir: Option<PathBuf>,
    texture: Option<egui::TextureHandle>,
    options: ExportOptions,

    // text / label prompt raised by the last gesture
    prompt_input: Option<PendingInput>,
    input_buf: String,

    edit_prompt: String,
    exports: Vec<ExportHandle>,
    status: Option<(String, bool)>,

    viewport: egui::Vec2,
    center_pending: bool,
}

impl AnnotateApp {
    pub fn new(
        editor: Editor,
        image_path: PathBuf,
        out_dir: Option<PathBuf>,
        prompt: Option<String>,
        options: ExportOptions,
    ) -> Self {
        Self {
            editor,
            image_path,
            out_dir,
            texture: None,
            options,
            prompt_input: None,
            input_buf: String::new(),
            edit_prompt: prompt.unwrap_or_default(),
            exports: Vec::new(),
            status: None,
            viewport: egui::Vec2::ZERO,
            center_pending: true,
        }
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        if self.texture.is_some() {
            return;
        }
        if let Some(img) = self.editor.source() {
            let size = [img.width() as usize, img.height() as usize];
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
            self.texture = Some(ctx.load_texture("source", color_image, egui::TextureOptions::LINEAR));
        }
    }

    /// Undo/redo availability; both are off while a text or label prompt is open.
    fn history_actions(&self) -> (bool, bool) {
        if self.prompt_input.is_some() {
            return (false, false);
        }
        let history = self.editor.history();
        (history.can_undo(), history.can_redo())
    }

    fn set_status(&mut self, text: String, ok: bool) {
        if ok {
            info!("{text}");
        } else {
            warn!("{text}");
        }
        self.status = Some((text, ok));
    }

    // ── Exports ─────────────────────────────────────────────────────────────

    fn start_export(&mut self, kind: ExportKind) {
        match self.editor.spawn_export(kind, self.options) {
            Ok(handle) => {
                self.exports.push(handle);
                self.status = Some((format!("exporting {kind}..."), true));
            }
            Err(e) => self.set_status(format!("{kind} export failed: {e}"), false),
        }
    }

    fn poll_exports(&mut self, ctx: &egui::Context) {
        let mut finished = Vec::new();
        self.exports.retain(|handle| match handle.try_take() {
            Some(result) => {
                finished.push((handle.kind(), result));
                false
            }
            None => true,
        });
        for (kind, result) in finished {
            let written = result
                .map_err(anyhow::Error::from)
                .and_then(|blob| self.write_blob(kind, &blob));
            match written {
                Ok(Some(path)) => self.set_status(format!("saved {}", path.display()), true),
                Ok(None) => self.status = None,
                Err(e) => self.set_status(format!("{kind} export failed: {e:#}"), false),
            }
        }
        if !self.exports.is_empty() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }

    /// Writes into `--out-dir` when given, otherwise asks where to save.
    fn write_blob(&self, kind: ExportKind, blob: &Blob) -> Result<Option<PathBuf>> {
        let name = kind.file_name(&stem(&self.image_path), blob.format);
        let path = match &self.out_dir {
            Some(dir) => Some(dir.join(&name)),
            None => rfd::FileDialog::new()
                .set_file_name(&name)
                .add_filter(blob.format.to_string(), &[blob.format.extension()])
                .save_file(),
        };
        let Some(path) = path else {
            return Ok(None);
        };
        fs::write(&path, &blob.bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(Some(path))
    }

    fn write_request(&mut self) {
        let dir_name = format!("{}_request", stem(&self.image_path));
        let base = match &self.out_dir {
            Some(dir) => Some(dir.clone()),
            None => rfd::FileDialog::new().pick_folder(),
        };
        let Some(base) = base else {
            return;
        };
        let result = self
            .editor
            .edit_request(&self.edit_prompt, &self.options)
            .and_then(|request| request.write_to_dir(&base.join(&dir_name)));
        match result {
            Ok(manifest) => self.set_status(format!("request written to {}", display_dir(&manifest)), true),
            Err(e) => self.set_status(format!("request not written: {e}"), false),
        }
    }

    // ── Input ───────────────────────────────────────────────────────────────

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        if self.prompt_input.is_some() {
            return;
        }
        let (undo, redo, save) = ctx.input(|i| {
            let z = i.modifiers.command && i.key_pressed(egui::Key::Z);
            (
                z && !i.modifiers.shift,
                z && i.modifiers.shift,
                i.modifiers.command && i.key_pressed(egui::Key::S),
            )
        });
        if undo {
            self.editor.undo();
        }
        if redo {
            self.editor.redo();
        }
        if save {
            self.start_export(ExportKind::Flattened);
        }
    }

    fn handle_pointer(
        &mut self,
        ctx: &egui::Context,
        response: &egui::Response,
        canvas: egui::Rect,
        visible: egui::Rect,
    ) {
        if self.prompt_input.is_some() {
            return;
        }
        let to_display =
            |p: egui::Pos2| Point::new(f64::from(p.x - canvas.min.x), f64::from(p.y - canvas.min.y));
        let primary = egui::PointerButton::Primary;

        if response.drag_started_by(primary) {
            let origin = ctx.input(|i| i.pointer.press_origin());
            if let Some(p) = origin.or(response.interact_pointer_pos()) {
                self.editor.pointer_down(to_display(p));
            }
        } else if response.clicked_by(primary) {
            if let Some(p) = response.interact_pointer_pos() {
                self.editor.pointer_down(to_display(p));
                self.editor.pointer_up();
            }
        }

        if response.dragged_by(primary) {
            if let Some(p) = response.interact_pointer_pos() {
                if visible.contains(p) {
                    self.editor.pointer_move(to_display(p));
                } else if self.editor.history().state() == GestureState::Drawing {
                    self.editor.pointer_leave();
                }
            }
        }
        if response.drag_stopped_by(primary) {
            self.editor.pointer_up();
        }

        if let Some(pending) = self.editor.take_pending() {
            self.prompt_input = Some(pending);
            self.input_buf.clear();
        }
    }

    // ── UI ──────────────────────────────────────────────────────────────────

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let mut tool = self.editor.drawing().tool;
            for t in Tool::ALL {
                ui.selectable_value(&mut tool, t, t.label());
            }
            if tool != self.editor.drawing().tool {
                self.editor.set_tool(tool);
            }
            ui.separator();

            ui.label("Color:");
            let mut rgb = self.editor.drawing().color.rgb();
            if ui.color_edit_button_rgb(&mut rgb).changed() {
                self.editor.set_color(Color4::from_rgb(rgb));
            }
            ui.label("Width:");
            let mut width = self.editor.drawing().line_width;
            if ui.add(egui::Slider::new(&mut width, 1.0..=200.0).logarithmic(true)).changed() {
                self.editor.set_line_width(width);
            }
            let mut fill = self.editor.drawing().fill;
            if ui.checkbox(&mut fill, "Fill").changed() {
                self.editor.set_fill_enabled(fill);
            }
            let mut mask = self.editor.drawing().mask;
            if ui.checkbox(&mut mask, "Mask").changed() {
                self.editor.set_mask_enabled(mask);
            }
            if self.editor.drawing().tool == Tool::Text {
                ui.label("Font:");
                let mut size = self.editor.drawing().font_size;
                if ui.add(egui::Slider::new(&mut size, 8.0..=200.0)).changed() {
                    self.editor.set_font_size(size);
                }
            }
            ui.separator();

            let (can_undo, can_redo) = self.history_actions();
            if ui.add_enabled(can_undo, egui::Button::new("Undo")).clicked() {
                self.editor.undo();
            }
            if ui.add_enabled(can_redo, egui::Button::new("Redo")).clicked() {
                self.editor.redo();
            }
        });

        ui.horizontal(|ui| {
            egui::ComboBox::from_id_salt("format")
                .selected_text(self.options.format.to_string())
                .show_ui(ui, |ui| {
                    for format in [
                        ExportFormat::Png,
                        ExportFormat::Jpeg,
                        ExportFormat::Webp,
                        ExportFormat::Bmp,
                    ] {
                        ui.selectable_value(&mut self.options.format, format, format.to_string());
                    }
                });
            if self.options.format == ExportFormat::Jpeg {
                let mut quality = self
                    .options
                    .quality
                    .unwrap_or(self.editor.config().default_quality);
                if ui.add(egui::Slider::new(&mut quality, 1..=100).text("Quality")).changed() {
                    self.options.quality = Some(quality);
                }
            }
            ui.separator();
            for kind in [
                ExportKind::Mask,
                ExportKind::MaskedModified,
                ExportKind::CroppedAnnotated,
            ] {
                if ui.button(format!("Export {kind}")).clicked() {
                    self.start_export(kind);
                }
            }
            ui.separator();
            ui.label("Prompt:");
            ui.add(egui::TextEdit::singleline(&mut self.edit_prompt).desired_width(240.0));
            let ready = !self.edit_prompt.trim().is_empty();
            if ui.add_enabled(ready, egui::Button::new("Write request")).clicked() {
                self.write_request();
            }
            if !self.exports.is_empty() {
                ui.spinner();
            }
        });
    }

    fn canvas(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let available = ui.available_size();
        if available != self.viewport {
            self.viewport = available;
            self.center_pending = true;
            self.editor
                .resize(f64::from(available.x), f64::from(available.y));
        }
        let Ok(metrics) = self.editor.metrics() else {
            return;
        };

        let mut scroll = egui::ScrollArea::both().id_salt("canvas");
        if self.center_pending {
            self.center_pending = false;
            let offset = |padding: f64, image: f64, view: f32| {
                (padding - (f64::from(view) - image) * 0.5).max(0.0) as f32
            };
            scroll = scroll.scroll_offset(egui::vec2(
                offset(metrics.padding, metrics.display_image_width, available.x),
                offset(metrics.padding, metrics.display_image_height, available.y),
            ));
        }

        scroll.show(ui, |ui| {
            let size = egui::vec2(
                metrics.display_canvas_width as f32,
                metrics.display_canvas_height as f32,
            );
            let (response, painter) = ui.allocate_painter(size, egui::Sense::click_and_drag());
            let canvas = response.rect;
            painter.rect_filled(canvas, 0.0, CANVAS_BACKGROUND);

            if let Some(tex) = &self.texture {
                let min = canvas.min + egui::vec2(metrics.padding as f32, metrics.padding as f32);
                let image_rect = egui::Rect::from_min_size(
                    min,
                    egui::vec2(
                        metrics.display_image_width as f32,
                        metrics.display_image_height as f32,
                    ),
                );
                painter.image(
                    tex.id(),
                    image_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
            }

            let visible = ui.clip_rect();
            self.handle_pointer(ctx, &response, canvas, visible);

            let mut surface = PainterSurface::new(&painter, canvas);
            if let Err(e) = self.editor.render(&mut surface) {
                warn!("canvas render skipped: {e}");
            }

            self.prompt_overlay(ctx, canvas);
        });
    }

    fn prompt_overlay(&mut self, ctx: &egui::Context, canvas: egui::Rect) {
        let Some(pending) = self.prompt_input.clone() else {
            return;
        };
        let Ok(metrics) = self.editor.metrics() else {
            return;
        };
        let at = metrics.to_display(pending.anchor());
        let screen_pos = canvas.min + egui::vec2(at.x as f32, at.y as f32);

        egui::Area::new(egui::Id::new("prompt_input"))
            .fixed_pos(screen_pos)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                ui.set_max_width(300.0);
                if matches!(pending, PendingInput::Label { .. }) {
                    ui.label("Label:");
                }
                let te = ui.text_edit_singleline(&mut self.input_buf);
                if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                    self.prompt_input = None;
                } else if te.lost_focus() {
                    match pending {
                        PendingInput::Text { anchor } => {
                            self.editor.submit_text(anchor, &self.input_buf);
                        }
                        PendingInput::Label { index, .. } => {
                            self.editor.submit_label(index, &self.input_buf);
                        }
                    }
                    self.input_buf.clear();
                    self.prompt_input = None;
                } else {
                    te.request_focus();
                }
            });
    }
}

fn display_dir(manifest: &Path) -> String {
    manifest
        .parent()
        .unwrap_or(manifest)
        .display()
        .to_string()
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for AnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ensure_texture(ctx);
        self.handle_shortcuts(ctx);
        self.poll_exports(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let history = self.editor.history();
                ui.label(format!(
                    "{} strokes, {} redoable",
                    history.committed().len(),
                    history.redo_len()
                ));
                if let Some((text, ok)) = &self.status {
                    ui.separator();
                    let color = if *ok {
                        ui.visuals().text_color()
                    } else {
                        ui.visuals().error_fg_color
                    };
                    ui.colored_label(color, text);
                }
            });
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(CANVAS_BACKGROUND))
            .show(ctx, |ui| self.canvas(ctx, ui));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn app_with_rectangle() -> AnnotateApp {
        let mut editor = Editor::default();
        editor.load_image(RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255])));
        editor.resize(400.0, 400.0);
        editor.set_tool(Tool::Rectangle);
        let m = editor.metrics().unwrap();
        editor.pointer_down(m.to_display(Point::new(10.0, 10.0)));
        editor.pointer_move(m.to_display(Point::new(60.0, 40.0)));
        editor.pointer_up();
        AnnotateApp::new(
            editor,
            PathBuf::from("scene.png"),
            None,
            None,
            ExportOptions::png(),
        )
    }

    #[test]
    fn label_prompt_disables_undo_and_redo() {
        let mut app = app_with_rectangle();
        app.prompt_input = app.editor.take_pending();
        assert!(matches!(app.prompt_input, Some(PendingInput::Label { .. })));
        assert_eq!(app.history_actions(), (false, false));

        app.prompt_input = None;
        assert_eq!(app.history_actions(), (true, false));
        app.editor.undo();
        app.prompt_input = Some(PendingInput::Text {
            anchor: Point::new(5.0, 5.0),
        });
        assert_eq!(app.history_actions(), (false, false));
        app.prompt_input = None;
        assert_eq!(app.history_actions(), (false, true));
    }
}
