use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::encode::Blob;
use crate::error::{EditorError, Result};

/// Multipart field names expected by the edit service.
pub const FIELD_ORIGINAL: &str = "original";
pub const FIELD_MODIFIED: &str = "modified";
pub const FIELD_PROMPT: &str = "prompt";

/// What the host submits to the edit service: the untouched source, the
/// blacked-out working image, and a free-text prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct EditRequest {
    pub original: Blob,
    pub modified: Blob,
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartManifest {
    pub field: &'static str,
    pub file: String,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestManifest {
    pub prompt: String,
    pub prompt_field: &'static str,
    pub parts: Vec<PartManifest>,
}

impl EditRequest {
    /// Trims the prompt and checks the pair is submittable.
    pub fn new(original: Blob, modified: Blob, prompt: &str) -> Result<Self> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(EditorError::InvalidRequest("prompt required".into()));
        }
        if (original.width, original.height) != (modified.width, modified.height) {
            return Err(EditorError::InvalidRequest(format!(
                "original and modified must share dimensions ({}x{} vs {}x{})",
                original.width, original.height, modified.width, modified.height
            )));
        }
        Ok(Self {
            original,
            modified,
            prompt: prompt.to_owned(),
        })
    }

    fn file_name(field: &str, blob: &Blob) -> String {
        format!("{field}.{}", blob.format.extension())
    }

    pub fn manifest(&self) -> RequestManifest {
        let part = |field: &'static str, blob: &Blob| PartManifest {
            field,
            file: Self::file_name(field, blob),
            mime: blob.mime(),
            width: blob.width,
            height: blob.height,
        };
        RequestManifest {
            prompt: self.prompt.clone(),
            prompt_field: FIELD_PROMPT,
            parts: vec![
                part(FIELD_ORIGINAL, &self.original),
                part(FIELD_MODIFIED, &self.modified),
            ],
        }
    }

    /// Writes both images and `request.json` into `dir`, creating it if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        fs::write(
            dir.join(Self::file_name(FIELD_ORIGINAL, &self.original)),
            &self.original.bytes,
        )?;
        fs::write(
            dir.join(Self::file_name(FIELD_MODIFIED, &self.modified)),
            &self.modified.bytes,
        )?;
        let manifest_path = dir.join("request.json");
        fs::write(&manifest_path, serde_json::to_string_pretty(&self.manifest())?)?;
        info!(dir = %dir.display(), "wrote edit request bundle");
        Ok(manifest_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::ExportFormat;

    fn blob(width: u32, height: u32) -> Blob {
        Blob {
            bytes: vec![1, 2, 3],
            format: ExportFormat::Png,
            width,
            height,
        }
    }

    #[test]
    fn prompt_is_required() {
        let err = EditRequest::new(blob(4, 4), blob(4, 4), "   ").unwrap_err();
        assert!(err.to_string().contains("prompt required"));
    }

    #[test]
    fn dimensions_must_match() {
        assert!(matches!(
            EditRequest::new(blob(4, 4), blob(4, 5), "add a boat"),
            Err(EditorError::InvalidRequest(_))
        ));
    }

    #[test]
    fn bundle_lands_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let request = EditRequest::new(blob(4, 4), blob(4, 4), "  add a boat ").unwrap();
        let manifest_path = request.write_to_dir(&dir.path().join("bundle")).unwrap();

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(manifest_path).unwrap()).unwrap();
        assert_eq!(manifest["prompt"], "add a boat");
        assert_eq!(manifest["parts"][1]["field"], "modified");
        assert_eq!(manifest["parts"][1]["mime"], "image/png");
        assert_eq!(
            fs::read(dir.path().join("bundle").join("original.png")).unwrap(),
            vec![1, 2, 3]
        );
    }
}
