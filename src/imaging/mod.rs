//! Rescale engine and codec collaborator.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` |
//! | **Crop** | `DynamicImage::crop_imm`, clipped to the source |
//! | **Crop-to-fill** | ratio crop (1/3 vertical bias) + Lanczos3 `resize_exact` |
//! | **Scale-then-crop** | Lanczos3 cover resize + top-left crop |
//! | **Encode** | JPEG (quality 95) or PNG |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for region and dimension math (unit testable)
//! - **Parameters**: Output format and quality
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Operations**: Buffer transformations combining calculations + resampling

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{CodecError, Dimensions, ImageCodec};
pub use calculations::{
    Region, clip_region, cover_dimensions, fill_region, implied_target, retina_fits,
};
pub use operations::{
    RescaleError, auto_crop_for, crop_rect, rescale, rescale_for, retina_rescale,
};
pub use params::{OutputFormat, Quality};
pub use rust_backend::RustCodec;
