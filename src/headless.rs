// ── Headless mode ──────────────────────────────────────────────────────────
//
// Replays a JSON array of natural-space strokes onto the image and writes the
// export artifacts next to each other. No window is opened.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use annotate_mask::{Editor, ExportKind, ExportOptions, Stroke};

const ARTIFACTS: [ExportKind; 3] = [
    ExportKind::Mask,
    ExportKind::MaskedModified,
    ExportKind::CroppedAnnotated,
];

pub struct HeadlessJob<'a> {
    pub image: &'a Path,
    pub strokes: &'a Path,
    pub out_dir: &'a Path,
    pub prompt: Option<&'a str>,
    pub options: ExportOptions,
}

pub fn load_strokes(path: &Path) -> Result<Vec<Stroke>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading strokes from {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing strokes in {}", path.display()))
}

pub fn stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
        .to_owned()
}

/// Returns every path written, artifacts first, then the request manifest.
pub fn run(editor: &mut Editor, job: &HeadlessJob<'_>) -> Result<Vec<PathBuf>> {
    editor
        .open(job.image)
        .with_context(|| format!("opening {}", job.image.display()))?;
    let strokes = load_strokes(job.strokes)?;
    info!(count = strokes.len(), "replaying strokes");
    editor.replay(strokes)?;

    fs::create_dir_all(job.out_dir)
        .with_context(|| format!("creating {}", job.out_dir.display()))?;
    let stem = stem(job.image);

    // Spawn all three up front; each works on its own snapshot.
    let handles = ARTIFACTS
        .iter()
        .map(|kind| editor.spawn_export(*kind, job.options))
        .collect::<Result<Vec<_>, _>>()?;

    let mut written = Vec::new();
    for handle in handles {
        let kind = handle.kind();
        let blob = handle.wait().with_context(|| format!("{kind} export"))?;
        let path = job.out_dir.join(kind.file_name(&stem, blob.format));
        fs::write(&path, &blob.bytes).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote {kind}");
        written.push(path);
    }

    if let Some(prompt) = job.prompt {
        let request = editor.edit_request(prompt, &job.options)?;
        let dir = job.out_dir.join(format!("{stem}_request"));
        written.push(request.write_to_dir(&dir)?);
    }

    editor.close();
    Ok(written)
}
