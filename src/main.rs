mod app;
mod headless;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use eframe::egui;

use annotate_mask::{logging, Editor, EditorConfig, ExportFormat, ExportOptions};

use crate::app::AnnotateApp;
use crate::headless::HeadlessJob;

/// Draw annotations and inpainting masks over an image.
///
/// Opens an editor window by default. With `--strokes` the strokes are read
/// from a JSON file and the artifacts are written without a window.
#[derive(Parser, Debug)]
#[command(name = "annotate-mask", version)]
struct Args {
    /// Source image (png, jpeg, webp, bmp).
    image: PathBuf,

    /// JSON editor configuration. Missing keys keep their defaults.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where exports are written. Defaults to the image's directory in
    /// headless mode and to a save dialog in the editor.
    #[arg(long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Edit prompt; also writes an edit-request bundle.
    #[arg(long)]
    prompt: Option<String>,

    /// Replay strokes from this JSON array and exit.
    #[arg(long, value_name = "FILE")]
    strokes: Option<PathBuf>,

    /// Export format: png, jpeg, webp, bmp.
    #[arg(short, long, default_value = "png")]
    format: ExportFormat,

    /// JPEG quality (1-100). Defaults to the configured quality.
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Debug logging; honours RUST_LOG.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    if !args.image.exists() {
        bail!("file not found: {}", args.image.display());
    }
    let config = match &args.config {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EditorConfig::default(),
    };
    let options = ExportOptions {
        format: args.format,
        quality: args.quality,
    };
    let mut editor = Editor::new(config)?;

    if let Some(strokes) = &args.strokes {
        let out_dir = args.out_dir.clone().unwrap_or_else(|| {
            args.image
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default()
        });
        let written = headless::run(
            &mut editor,
            &HeadlessJob {
                image: &args.image,
                strokes,
                out_dir: &out_dir,
                prompt: args.prompt.as_deref(),
                options,
            },
        )?;
        for path in written {
            println!("{}", path.display());
        }
        return Ok(());
    }

    editor
        .open(&args.image)
        .with_context(|| format!("opening {}", args.image.display()))?;

    let title = format!("annotate-mask - {}", headless::stem(&args.image));
    let native = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title(&title),
        ..Default::default()
    };
    let app = AnnotateApp::new(editor, args.image, args.out_dir, args.prompt, options);
    eframe::run_native(&title, native, Box::new(move |_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow::anyhow!("editor window failed: {e}"))
}
