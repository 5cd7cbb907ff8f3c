//! Encoding rendered surfaces into image files, data URLs or background jobs.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use base64::Engine;
use egui::ColorImage;
use image::{ExtendedColorType, ImageEncoder};
use serde::{Deserialize, Serialize};

use super::error::ExportError;

/// Quality used when the caller does not pick one (matches browser canvas defaults).
pub const DEFAULT_EXPORT_QUALITY: f32 = 0.92;

/// Encoded image container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    /// Parse a format name or MIME type such as `png` or `image/jpeg`.
    pub fn parse(value: &str) -> Result<Self, ExportError> {
        let trimmed = value.trim().to_ascii_lowercase();
        match trimmed.strip_prefix("image/").unwrap_or(&trimmed) {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            _ => Err(ExportError::UnsupportedFormat(value.to_string())),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
        }
    }
}

/// How the encoded result should be handed back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportKind {
    /// Encoded bytes, produced synchronously.
    #[default]
    Bytes,
    /// `data:` URL with base64 payload, produced synchronously.
    DataUrl,
    /// Bytes encoded on a background thread.
    Async,
}

/// Result of an export request.
#[derive(Debug)]
pub enum ExportedImage {
    Bytes(Vec<u8>),
    DataUrl(String),
    Pending(ExportHandle),
}

impl ExportedImage {
    /// Resolve to encoded bytes, waiting on a pending job if needed.
    ///
    /// Data URLs are decoded back into their payload.
    pub fn into_bytes(self) -> Result<Vec<u8>, ExportError> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Pending(handle) => handle.wait(),
            Self::DataUrl(url) => {
                let payload = url.split_once(',').map(|(_, data)| data).unwrap_or("");
                Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
            }
        }
    }
}

/// Handle to an image being encoded off the drawing path.
///
/// Dropping the handle abandons the result; the worker finishes and discards it.
#[derive(Debug)]
pub struct ExportHandle {
    receiver: Receiver<Result<Vec<u8>, ExportError>>,
}

impl ExportHandle {
    /// Non-blocking poll; `None` while the worker is still encoding.
    pub fn try_take(&self) -> Option<Result<Vec<u8>, ExportError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ExportError::Worker)),
        }
    }

    /// Block until the encoded bytes are available.
    pub fn wait(self) -> Result<Vec<u8>, ExportError> {
        self.receiver.recv().map_err(|_| ExportError::Worker)?
    }
}

/// Encode pixels in the requested container.
///
/// `quality` is a `0.0..=1.0` factor and only affects JPEG output.
pub fn encode_image(
    image: &ColorImage,
    format: ExportFormat,
    quality: f32,
) -> Result<Vec<u8>, ExportError> {
    let [width, height] = image.size;
    let mut bytes = Vec::new();
    let map_err = |source| ExportError::Encode {
        format: format.label(),
        source,
    };
    match format {
        ExportFormat::Png => {
            let rgba = rgba_bytes(image);
            image::codecs::png::PngEncoder::new(&mut bytes)
                .write_image(&rgba, width as u32, height as u32, ExtendedColorType::Rgba8)
                .map_err(map_err)?;
        }
        ExportFormat::Jpeg => {
            let rgb = rgb_bytes(image);
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality))
                .write_image(&rgb, width as u32, height as u32, ExtendedColorType::Rgb8)
                .map_err(map_err)?;
        }
    }
    Ok(bytes)
}

/// Encode `image` and package it the way the caller asked for.
pub fn export_color_image(
    image: ColorImage,
    format: ExportFormat,
    quality: f32,
    kind: ExportKind,
) -> Result<ExportedImage, ExportError> {
    match kind {
        ExportKind::Bytes => encode_image(&image, format, quality).map(ExportedImage::Bytes),
        ExportKind::DataUrl => {
            let bytes = encode_image(&image, format, quality)?;
            Ok(ExportedImage::DataUrl(data_url(format, &bytes)))
        }
        ExportKind::Async => {
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                let result = encode_image(&image, format, quality);
                if let Err(error) = &result {
                    tracing::warn!("Background image export failed: {error}");
                }
                let _ = tx.send(result);
            });
            Ok(ExportedImage::Pending(ExportHandle { receiver: rx }))
        }
    }
}

/// Encode and write an image to disk.
pub fn write_image(
    image: &ColorImage,
    path: &Path,
    format: ExportFormat,
    quality: f32,
) -> Result<(), ExportError> {
    let bytes = encode_image(image, format, quality)?;
    std::fs::write(path, bytes).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn data_url(format: ExportFormat, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{payload}", format.mime_type())
}

fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() {
        quality
    } else {
        DEFAULT_EXPORT_QUALITY
    };
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn rgba_bytes(image: &ColorImage) -> Vec<u8> {
    image
        .pixels
        .iter()
        .flat_map(|pixel| pixel.to_srgba_unmultiplied())
        .collect()
}

fn rgb_bytes(image: &ColorImage) -> Vec<u8> {
    image
        .pixels
        .iter()
        .flat_map(|pixel| {
            let [r, g, b, _] = pixel.to_srgba_unmultiplied();
            [r, g, b]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Color32;

    fn sample_image() -> ColorImage {
        ColorImage::new([4, 2], vec![Color32::from_rgb(200, 10, 10); 8])
    }

    #[test]
    fn png_export_round_trips_dimensions() {
        let bytes = encode_image(&sample_image(), ExportFormat::Png, 1.0).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 2));
    }

    #[test]
    fn data_url_carries_mime_type() {
        let exported = export_color_image(
            sample_image(),
            ExportFormat::Jpeg,
            0.8,
            ExportKind::DataUrl,
        )
        .unwrap();
        let ExportedImage::DataUrl(url) = exported else {
            panic!("expected data url");
        };
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn async_export_resolves_to_same_bytes() {
        let sync = encode_image(&sample_image(), ExportFormat::Png, 1.0).unwrap();
        let exported =
            export_color_image(sample_image(), ExportFormat::Png, 1.0, ExportKind::Async).unwrap();
        assert_eq!(exported.into_bytes().unwrap(), sync);
    }

    #[test]
    fn parse_accepts_names_and_mime_types() {
        assert_eq!(ExportFormat::parse("image/png").unwrap(), ExportFormat::Png);
        assert_eq!(ExportFormat::parse("JPG").unwrap(), ExportFormat::Jpeg);
        assert!(matches!(
            ExportFormat::parse("image/webp"),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn jpeg_quality_is_clamped() {
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(0.92), 92);
        assert_eq!(jpeg_quality(3.0), 100);
        assert_eq!(jpeg_quality(f32::NAN), 92);
    }
}
