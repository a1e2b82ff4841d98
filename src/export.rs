//! Export artifacts: the bilevel mask, the masked-modified source, the cropped
//! annotated composite and the flattened composite used by `save()`.
//!
//! Every export works on an [`ExportSnapshot`] taken synchronously when the
//! export is requested, so later edits never leak into an in-flight encode.

use std::fmt;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use image::{Rgba, RgbaImage};
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::encode::{encode, Blob, ExportFormat, ExportOptions};
use crate::error::{EditorError, Result};
use crate::geometry::Bounds;
use crate::mask::MaskRasterizer;
use crate::paint::{paint_stroke, PaintMode, PaintStyle};
use crate::stroke::{Color4, Stroke, TextMetrics};
use crate::surface::{RasterSurface, Surface};
use crate::view::Transform;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportKind {
    Mask,
    MaskedModified,
    CroppedAnnotated,
    Flattened,
}

impl ExportKind {
    /// Suffix used when writing the artifact next to its source.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ExportKind::Mask => "mask",
            ExportKind::MaskedModified => "modified",
            ExportKind::CroppedAnnotated => "annotated",
            ExportKind::Flattened => "flattened",
        }
    }

    /// `{stem}_{suffix}.{ext}`, e.g. `photo_mask.png`.
    pub fn file_name(&self, stem: &str, format: ExportFormat) -> String {
        format!("{stem}_{}.{}", self.file_suffix(), format.extension())
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_suffix())
    }
}

/// Immutable copy of what an export needs.
#[derive(Clone, Debug)]
pub struct ExportSnapshot {
    pub source: Arc<RgbaImage>,
    /// Committed strokes in paint order, then the draft if there was one.
    pub strokes: Vec<Stroke>,
}

impl ExportSnapshot {
    pub fn natural_size(&self) -> (u32, u32) {
        self.source.dimensions()
    }
}

#[derive(Clone, Debug)]
pub struct Compositor {
    mask: MaskRasterizer,
    style: PaintStyle,
    text_metrics: TextMetrics,
    crop_padding: f64,
    crop_background: Color4,
    default_quality: u8,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl Compositor {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            mask: MaskRasterizer::new(config),
            style: PaintStyle::from_config(config),
            text_metrics: config.text_metrics(),
            crop_padding: config.crop_padding,
            crop_background: config.crop_background,
            default_quality: config.default_quality,
        }
    }

    pub fn mask(&self, snapshot: &ExportSnapshot) -> Result<RgbaImage> {
        let (w, h) = snapshot.natural_size();
        Ok(self.mask.rasterize(w, h, &snapshot.strokes)?.into_image())
    }

    /// The source with every mask pixel blacked out.
    pub fn masked_modified(&self, snapshot: &ExportSnapshot) -> Result<RgbaImage> {
        let (w, h) = snapshot.natural_size();
        let mask = self.mask.rasterize(w, h, &snapshot.strokes)?;
        let mut out = RasterSurface::new(w, h)?;
        out.draw_image(&snapshot.source, 0, 0);
        let mut out = out.into_image();
        for (dst, m) in out.pixels_mut().zip(mask.into_image().pixels()) {
            if m[0] == 0 {
                *dst = Rgba([0, 0, 0, 255]);
            }
        }
        Ok(out)
    }

    /// Union of every stroke's extent and the image rectangle, grown by the
    /// crop padding. `None` when there are no strokes at all.
    pub fn crop_bounds(&self, snapshot: &ExportSnapshot) -> Option<Bounds> {
        if snapshot.strokes.is_empty() {
            return None;
        }
        let (w, h) = snapshot.natural_size();
        let strokes = snapshot
            .strokes
            .iter()
            .filter_map(|s| s.bounds(&self.text_metrics));
        let union = strokes.fold(Bounds::image(w, h), Bounds::union);
        Some(union.expand(self.crop_padding))
    }

    pub fn cropped_annotated(&self, snapshot: &ExportSnapshot) -> Result<RgbaImage> {
        let Some(bounds) = self.crop_bounds(snapshot) else {
            return self.flattened(snapshot);
        };
        let (left, top, width, height) = bounds.to_pixel_rect();
        let mut surface = RasterSurface::new(width, height)?;
        surface.clear(self.crop_background);
        surface.draw_image(&snapshot.source, -left, -top);
        let transform = Transform::translate(-left as f64, -top as f64);
        self.paint_all(&mut surface, &snapshot.strokes, &transform);
        Ok(surface.into_image())
    }

    /// Source plus every stroke in its own colours, at natural resolution.
    pub fn flattened(&self, snapshot: &ExportSnapshot) -> Result<RgbaImage> {
        let (w, h) = snapshot.natural_size();
        let mut surface = RasterSurface::new(w, h)?;
        surface.draw_image(&snapshot.source, 0, 0);
        self.paint_all(&mut surface, &snapshot.strokes, &Transform::IDENTITY);
        Ok(surface.into_image())
    }

    pub fn render(&self, kind: ExportKind, snapshot: &ExportSnapshot) -> Result<RgbaImage> {
        match kind {
            ExportKind::Mask => self.mask(snapshot),
            ExportKind::MaskedModified => self.masked_modified(snapshot),
            ExportKind::CroppedAnnotated => self.cropped_annotated(snapshot),
            ExportKind::Flattened => self.flattened(snapshot),
        }
    }

    pub fn export(
        &self,
        kind: ExportKind,
        snapshot: &ExportSnapshot,
        options: &ExportOptions,
    ) -> Result<Blob> {
        let started = Instant::now();
        let image = self.render(kind, snapshot)?;
        let blob = encode(&image, options, self.default_quality)?;
        info!(
            %kind,
            width = blob.width,
            height = blob.height,
            bytes = blob.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "export finished"
        );
        Ok(blob)
    }

    /// Runs the export on a worker thread. Dropping the handle discards the result.
    pub fn spawn(
        &self,
        kind: ExportKind,
        snapshot: ExportSnapshot,
        options: ExportOptions,
    ) -> Result<ExportHandle> {
        let (tx, rx) = mpsc::channel();
        let compositor = self.clone();
        thread::Builder::new()
            .name(format!("export-{kind}"))
            .spawn(move || {
                let result = compositor.export(kind, &snapshot, &options);
                if let Err(err) = &result {
                    warn!(%kind, "export failed: {err}");
                }
                if tx.send(result).is_err() {
                    debug!(%kind, "export finished after its handle was dropped");
                }
            })?;
        Ok(ExportHandle {
            kind,
            receiver: rx,
        })
    }

    fn paint_all(&self, surface: &mut RasterSurface, strokes: &[Stroke], transform: &Transform) {
        for stroke in strokes {
            paint_stroke(surface, stroke, transform, PaintMode::Annotated, &self.style);
        }
    }
}

/// Pending result of [`Compositor::spawn`].
#[derive(Debug)]
pub struct ExportHandle {
    kind: ExportKind,
    receiver: Receiver<Result<Blob>>,
}

impl ExportHandle {
    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    /// Non-blocking poll; `None` while the worker is still busy.
    pub fn try_take(&self) -> Option<Result<Blob>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_gone())),
        }
    }

    pub fn wait(self) -> Result<Blob> {
        self.receiver.recv().unwrap_or_else(|_| Err(worker_gone()))
    }
}

fn worker_gone() -> EditorError {
    EditorError::EncodingFailed("export worker exited without a result".into())
}
