//! Codec collaborator trait and shared types.
//!
//! The [`ImageCodec`] trait is the only way the engine turns bytes into
//! pixels and back: identify, decode and encode. Pixel work in between is
//! done on [`DynamicImage`] buffers by [`operations`](super::operations).
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec), built on the `image`
//! crate's pure Rust decoders and encoders.

use super::params::{OutputFormat, Quality};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image codecs.
///
/// Implementations must be `Sync`: batch regeneration shares one codec
/// across rayon workers.
pub trait ImageCodec: Sync {
    /// Read pixel dimensions without a full decode where possible.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, CodecError>;

    /// Decode source bytes into a pixel buffer.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, CodecError>;

    /// Encode a pixel buffer in the given container.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, CodecError>;
}
