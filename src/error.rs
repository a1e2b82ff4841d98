use thiserror::Error;

/// Errors surfaced by the annotation pipeline.
///
/// Pointer misuse never shows up here: the stroke state machine recovers from
/// out-of-order events on its own.
#[derive(Debug, Error)]
pub enum EditorError {
    /// The source bitmap has not been decoded yet, so natural dimensions are unknown.
    #[error("image not ready: {operation} needs a decoded source image")]
    ImageNotReady { operation: &'static str },

    /// A drawing surface of the requested size could not be allocated.
    #[error("drawing surface unavailable for {width}x{height}")]
    SurfaceUnavailable { width: u32, height: u32 },

    /// The encoder reported no data or failed outright.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("invalid edit request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EditorError {
    pub(crate) fn not_ready(operation: &'static str) -> Self {
        Self::ImageNotReady { operation }
    }
}

pub type Result<T, E = EditorError> = std::result::Result<T, E>;
