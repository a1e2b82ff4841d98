use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl ExportFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Webp => "image/webp",
            ExportFormat::Bmp => "image/bmp",
        }
    }

    /// File suffix without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Webp => "webp",
            ExportFormat::Bmp => "bmp",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "webp" => Some(ExportFormat::Webp),
            "bmp" => Some(ExportFormat::Bmp),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unsupported format '{s}' (png, jpeg, webp, bmp)"))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// 1–100; only JPEG uses it.
    pub quality: Option<u8>,
}

impl ExportOptions {
    pub fn png() -> Self {
        Self::default()
    }
}

/// Encoded image bytes plus what is needed to label them.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
    pub width: u32,
    pub height: u32,
}

impl Blob {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime(), STANDARD.encode(&self.bytes))
    }

    pub fn decode(&self) -> Result<RgbaImage> {
        Ok(image::load_from_memory(&self.bytes)?.to_rgba8())
    }
}

/// Encodes `image` per `options`, falling back to `default_quality` for JPEG.
pub fn encode(image: &RgbaImage, options: &ExportOptions, default_quality: u8) -> Result<Blob> {
    let (width, height) = image.dimensions();
    let mut bytes = Vec::new();
    let written = match options.format {
        ExportFormat::Png => PngEncoder::new(&mut bytes).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        ExportFormat::Jpeg => {
            let quality = options.quality.unwrap_or(default_quality).clamp(1, 100);
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        ExportFormat::Webp => WebPEncoder::new_lossless(&mut bytes).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        ExportFormat::Bmp => BmpEncoder::new(&mut bytes).write_image(
            image.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };
    written.map_err(|err| EditorError::EncodingFailed(err.to_string()))?;
    if bytes.is_empty() {
        return Err(EditorError::EncodingFailed(format!(
            "{} encoder produced no data",
            options.format
        )));
    }
    Ok(Blob {
        bytes,
        format: options.format,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn checker() -> RgbaImage {
        RgbaImage::from_fn(6, 4, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn png_is_lossless() {
        let img = checker();
        let blob = encode(&img, &ExportOptions::png(), 90).unwrap();
        assert_eq!(blob.mime(), "image/png");
        assert_eq!((blob.width, blob.height), (6, 4));
        assert_eq!(blob.decode().unwrap(), img);
    }

    #[test]
    fn jpeg_drops_alpha_but_keeps_size() {
        let options = ExportOptions {
            format: ExportFormat::Jpeg,
            quality: Some(80),
        };
        let blob = encode(&checker(), &options, 90).unwrap();
        assert!(!blob.is_empty());
        let decoded = blob.decode().unwrap();
        assert_eq!(decoded.dimensions(), (6, 4));
        assert!(decoded.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn data_url_carries_mime() {
        let blob = encode(&checker(), &ExportOptions::png(), 90).unwrap();
        assert!(blob.to_data_url().starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn format_names_parse_like_the_server_table() {
        assert_eq!("JPG".parse::<ExportFormat>(), Ok(ExportFormat::Jpeg));
        assert_eq!("webp".parse::<ExportFormat>(), Ok(ExportFormat::Webp));
        assert!("gif".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Jpeg.extension(), "jpg");
    }
}
