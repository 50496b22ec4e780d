//! Rescale engine: pure buffer-to-buffer operations.
//!
//! These functions combine the [calculations](super::calculations) with the
//! `image` crate's Lanczos3 resampler. No I/O happens here; decoding and
//! encoding belong to the [codec](super::backend).

use super::calculations::{
    clip_region, cover_dimensions, fill_region, implied_target, output_dimensions, retina_fits,
};
use crate::catalog::{GenerationMode, Size};
use image::DynamicImage;
use image::imageops::FilterType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RescaleError {
    #[error("Crop region {x},{y} {w}x{h} lies outside the {width}x{height} source")]
    InvalidRegion {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        width: u32,
        height: u32,
    },
    #[error("Invalid rescale target {width}x{height} for a {src_width}x{src_height} source")]
    InvalidTarget {
        width: u32,
        height: u32,
        src_width: u32,
        src_height: u32,
    },
}

/// Result type for rescale operations.
pub type Result<T> = std::result::Result<T, RescaleError>;

const FILTER: FilterType = FilterType::Lanczos3;

/// Whether a mode rescales with crop-to-fill.
///
/// Only [`GenerationMode::AutoCrop`] does; manual crops and auto-size both
/// scale then crop from the origin.
pub fn auto_crop_for(mode: GenerationMode) -> bool {
    mode == GenerationMode::AutoCrop
}

/// Cut `(x, y, w, h)` out of a buffer.
///
/// A rectangle overhanging the source is clipped to the source bounds;
/// only a rectangle with nothing inside the source is an error.
pub fn crop_rect(image: &DynamicImage, x: u32, y: u32, w: u32, h: u32) -> Result<DynamicImage> {
    let source = (image.width(), image.height());
    let region = clip_region(source, x, y, w, h).ok_or(RescaleError::InvalidRegion {
        x,
        y,
        w,
        h,
        width: source.0,
        height: source.1,
    })?;
    Ok(image.crop_imm(region.x, region.y, region.width, region.height))
}

/// Rescale a buffer to `(width, height)`.
///
/// A zero dimension is implied from the other at the source ratio. With
/// `auto_crop` the source is cropped to the target ratio (see
/// [`fill_region`]) and resampled to exactly the target. Without it, the
/// source is resampled to cover the target box, keeping its ratio, and the
/// excess is cut from the top-left corner. Both paths return exactly the
/// (possibly implied) target dimensions.
pub fn rescale(
    image: &DynamicImage,
    width: u32,
    height: u32,
    auto_crop: bool,
) -> Result<DynamicImage> {
    let source = (image.width(), image.height());
    let invalid = RescaleError::InvalidTarget {
        width,
        height,
        src_width: source.0,
        src_height: source.1,
    };
    if source.0 == 0 || source.1 == 0 {
        return Err(invalid);
    }
    let target = implied_target(source, (width, height)).ok_or(invalid)?;
    let (out_w, out_h) = output_dimensions(target);

    if auto_crop {
        let region = fill_region(source, target);
        let cropped = image.crop_imm(region.x, region.y, region.width, region.height);
        Ok(cropped.resize_exact(out_w, out_h, FILTER))
    } else {
        let (cover_w, cover_h) = cover_dimensions(source, target);
        let scaled = image.resize_exact(cover_w, cover_h, FILTER);
        Ok(scaled.crop_imm(0, 0, out_w, out_h))
    }
}

/// Rescale a size's thumbnail from an already cropped buffer.
pub fn rescale_for(cropped: &DynamicImage, size: &Size) -> Result<DynamicImage> {
    let (width, height) = size.target();
    rescale(cropped, width, height, auto_crop_for(size.mode))
}

/// Build the double-density companion of `size` from a cropped buffer.
///
/// Returns `Ok(None)` without touching pixels when the cropped buffer is
/// smaller than the retina target on either axis; upscaling is never done.
/// The companion is rescaled in its base size's mode, so a manual-crop or
/// auto-size retina file scales then crops from the origin like its base.
pub fn retina_rescale(cropped: &DynamicImage, size: &Size) -> Result<Option<DynamicImage>> {
    let retina = size.retina_variant();
    if !retina_fits((cropped.width(), cropped.height()), retina.target()) {
        return Ok(None);
    }
    rescale_for(cropped, &retina).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    /// Buffer whose pixels encode their own coordinates.
    fn coordinate_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        }))
    }

    fn dims(image: &DynamicImage) -> (u32, u32) {
        image.dimensions()
    }

    // =========================================================================
    // crop_rect tests
    // =========================================================================

    #[test]
    fn crop_rect_cuts_requested_region() {
        let image = coordinate_image(100, 100);
        let cropped = crop_rect(&image, 10, 20, 30, 40).unwrap();
        assert_eq!(dims(&cropped), (30, 40));
        assert_eq!(cropped.get_pixel(0, 0).0[..2], [10, 20]);
    }

    #[test]
    fn crop_rect_clips_overhang() {
        let image = coordinate_image(100, 100);
        let cropped = crop_rect(&image, 80, 90, 50, 50).unwrap();
        assert_eq!(dims(&cropped), (20, 10));
    }

    #[test]
    fn crop_rect_outside_is_invalid_region() {
        let image = coordinate_image(100, 100);
        assert!(matches!(
            crop_rect(&image, 100, 0, 10, 10),
            Err(RescaleError::InvalidRegion { .. })
        ));
    }

    // =========================================================================
    // rescale tests
    // =========================================================================

    #[test]
    fn auto_crop_always_hits_target() {
        for source in [(1, 1), (400, 200), (200, 400), (50, 3), (3, 50)] {
            let image = coordinate_image(source.0, source.1);
            for (w, h) in [(100, 100), (160, 90), (7, 30)] {
                let out = rescale(&image, w, h, true).unwrap();
                assert_eq!(dims(&out), (w, h), "{source:?} -> {w}x{h}");
            }
        }
    }

    #[test]
    fn scale_then_crop_always_hits_target() {
        for source in [(1, 1), (400, 200), (200, 400), (50, 3), (3, 50)] {
            let image = coordinate_image(source.0, source.1);
            for (w, h) in [(100, 100), (160, 90), (7, 30)] {
                let out = rescale(&image, w, h, false).unwrap();
                assert_eq!(dims(&out), (w, h), "{source:?} -> {w}x{h}");
            }
        }
    }

    #[test]
    fn auto_size_wide_source_into_square() {
        // 400x200 → 200x100 cover, then top-left 100x100
        let image = coordinate_image(400, 200);
        let out = rescale(&image, 100, 100, false).unwrap();
        assert_eq!(dims(&out), (100, 100));
        // left edge survives: red channel near 0 in the first column
        assert!(out.get_pixel(0, 50).0[0] < 8);
    }

    #[test]
    fn implied_height_preserves_ratio() {
        let image = coordinate_image(800, 400);
        assert_eq!(dims(&rescale(&image, 200, 0, false).unwrap()), (200, 100));
        assert_eq!(dims(&rescale(&image, 0, 50, true).unwrap()), (100, 50));
    }

    #[test]
    fn both_dimensions_missing_is_invalid() {
        let image = coordinate_image(10, 10);
        assert!(matches!(
            rescale(&image, 0, 0, true),
            Err(RescaleError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn rescale_is_deterministic() {
        let image = coordinate_image(300, 200);
        let a = rescale(&image, 120, 120, true).unwrap();
        let b = rescale(&image, 120, 120, true).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn only_auto_crop_mode_fills() {
        assert!(auto_crop_for(GenerationMode::AutoCrop));
        assert!(!auto_crop_for(GenerationMode::AutoSize));
        assert!(!auto_crop_for(GenerationMode::ManualCrop));
    }

    // =========================================================================
    // retina_rescale tests
    // =========================================================================

    #[test]
    fn retina_skipped_when_crop_too_small() {
        let mut size = Size::new(1, 1, "thumb", Some(200), Some(200), GenerationMode::ManualCrop);
        size.retina = true;
        let source = coordinate_image(1000, 1000);
        let cropped = crop_rect(&source, 10, 10, 200, 200).unwrap();

        assert_eq!(dims(&rescale_for(&cropped, &size).unwrap()), (200, 200));
        assert!(retina_rescale(&cropped, &size).unwrap().is_none());
    }

    #[test]
    fn retina_doubles_when_crop_is_large_enough() {
        let mut size = Size::new(1, 1, "thumb", Some(200), Some(150), GenerationMode::AutoCrop);
        size.retina = true;
        let cropped = coordinate_image(800, 600);

        let retina = retina_rescale(&cropped, &size).unwrap().unwrap();
        assert_eq!(dims(&retina), (400, 300));
    }

    #[test]
    fn retina_keeps_base_mode() {
        let mut size = Size::new(1, 1, "thumb", Some(200), Some(200), GenerationMode::ManualCrop);
        size.retina = true;
        let cropped = coordinate_image(1000, 600);

        let retina = retina_rescale(&cropped, &size).unwrap().unwrap();
        let scaled = rescale(&cropped, 400, 400, false).unwrap();
        let filled = rescale(&cropped, 400, 400, true).unwrap();
        assert_eq!(retina.as_bytes(), scaled.as_bytes());
        assert_ne!(retina.as_bytes(), filled.as_bytes());
    }
}
