//! Pure Rust codec built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `ImageReader::decode` with guessed format |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at the configured quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless, quality ignored) |

use super::backend::{CodecError, Dimensions, ImageCodec};
use super::params::{OutputFormat, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Codec using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustCodec;

impl RustCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, CodecError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(format!("Failed to sniff format: {}", e)))
}

impl ImageCodec for RustCodec {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, CodecError> {
        let (width, height) = reader(bytes)?
            .into_dimensions()
            .map_err(|e| CodecError::Decode(format!("Failed to read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError> {
        let reader = reader(bytes)?;
        if reader.format().is_none() {
            return Err(CodecError::UnsupportedFormat(
                "unrecognized image data".to_string(),
            ));
        }
        reader
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        match format {
            OutputFormat::Jpeg => {
                // JPEG carries no alpha channel
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
                rgb.write_with_encoder(encoder)
                    .map_err(|e| CodecError::Encode(format!("JPEG encode failed: {}", e)))?;
            }
            OutputFormat::Png => {
                image
                    .write_with_encoder(PngEncoder::new(&mut buf))
                    .map_err(|e| CodecError::Encode(format!("PNG encode failed: {}", e)))?;
            }
        }
        Ok(buf)
    }
}
