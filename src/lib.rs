//! Image annotation and inpainting-mask authoring.
//!
//! Strokes are stored in the image's natural pixel space. The [`Editor`] maps
//! pointer input from display space, keeps the undo/redo history, paints the
//! visible canvas through a [`Surface`] and produces the export artifacts
//! (mask, masked-modified source, cropped annotated composite).

pub mod config;
pub mod editor;
pub mod encode;
pub mod error;
pub mod export;
pub mod geometry;
pub mod history;
pub mod logging;
pub mod mask;
pub mod paint;
pub mod render;
pub mod request;
pub mod stroke;
pub mod surface;
pub mod view;

pub use config::EditorConfig;
pub use editor::Editor;
pub use encode::{Blob, ExportFormat, ExportOptions};
pub use error::{EditorError, Result};
pub use export::{ExportHandle, ExportKind, ExportSnapshot};
pub use geometry::{Bounds, Point};
pub use history::{GestureState, PendingInput, StrokeHistory};
pub use stroke::{Color4, DrawingConfig, Stroke, StrokeShape, Tool};
pub use surface::{PainterSurface, RasterSurface, Surface};
pub use view::{Transform, ViewMetrics};
