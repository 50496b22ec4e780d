//! Manual crops and the crop resolver.
//!
//! A [`Crop`] is a user-selected rectangle of the source, bound to one
//! (image, size) pair. Crops are shared by aspect ratio: when a thumbnail is
//! rendered, any crop stored for a size in the same set with the same rounded
//! ratio may drive it, and the widest such crop wins. A designer therefore
//! crops once, at the largest size of a ratio, and every smaller size of that
//! ratio reuses the rectangle.
//!
//! The sequential crop workflow walks ratios one at a time via
//! [`get_size_by_ratio`]; [`default_crop`] proposes the initial rectangle
//! for each step.

use crate::catalog::{GenerationMode, Size};
use crate::store::CatalogStore;
use crate::types::Image;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CropError {
    #[error("No crop found for image {image_id} at ratio {ratio}")]
    NoCropFound { image_id: u64, ratio: String },
    #[error("Invalid crop: {0}")]
    Invalid(String),
}

/// A rectangle `(x, y, w, h)` of the source, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub image_id: u64,
    pub size_id: u64,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Crop {
    pub fn new(image_id: u64, size_id: u64, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            image_id,
            size_id,
            x,
            y,
            w,
            h,
        }
    }

    /// Positions are unsigned, so only the measurements can be wrong.
    pub fn validate(&self) -> Result<(), CropError> {
        if self.w == 0 || self.h == 0 {
            return Err(CropError::Invalid(
                "crop measurements must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Pick the authoritative crop for `target` among an image's crops.
///
/// Candidates are crops whose size belongs to the target's set and shares
/// its aspect ratio. The widest wins; on equal width the first in catalog
/// order is kept.
pub fn find_crop(crops: &[Crop], sizes: &[Size], target: &Size) -> Option<Crop> {
    crops
        .iter()
        .filter(|crop| {
            sizes.iter().any(|s| {
                s.id == crop.size_id
                    && s.size_set_id == target.size_set_id
                    && s.aspect_ratio == target.aspect_ratio
            })
        })
        .fold(None, |best: Option<&Crop>, crop| match best {
            Some(b) if b.w >= crop.w => Some(b),
            _ => Some(crop),
        })
        .copied()
}

/// Resolve the crop driving `target` for `image`.
///
/// Fails with [`CropError::NoCropFound`] when no same-ratio crop exists; the
/// caller then falls back to the full source.
pub fn resolve_crop(
    store: &(impl CatalogStore + ?Sized),
    image: &Image,
    target: &Size,
) -> Result<Crop, CropError> {
    let crops = store.crops_for_image(image.id);
    let sizes = store.sizes_in_set(target.size_set_id);
    find_crop(&crops, &sizes, target).ok_or_else(|| CropError::NoCropFound {
        image_id: image.id,
        ratio: target.aspect_ratio.to_string(),
    })
}

/// The widest manual-crop size at the `rank`-th ratio of a set.
///
/// Distinct ratios of the set's manual sizes are ordered descending; `None`
/// past the last ratio signals the crop workflow is complete.
pub fn get_size_by_ratio(sizes: &[Size], size_set_id: u64, rank: usize) -> Option<&Size> {
    let manual: Vec<&Size> = sizes
        .iter()
        .filter(|s| s.size_set_id == size_set_id && s.mode == GenerationMode::ManualCrop)
        .collect();

    let mut ratios: Vec<_> = manual.iter().map(|s| s.aspect_ratio).collect();
    ratios.sort_unstable_by(|a, b| b.cmp(a));
    ratios.dedup();
    let ratio = *ratios.get(rank)?;

    manual
        .into_iter()
        .filter(|s| s.aspect_ratio == ratio)
        .fold(None, |best: Option<&Size>, s| match best {
            Some(b) if b.width.unwrap_or(0) >= s.width.unwrap_or(0) => Some(b),
            _ => Some(s),
        })
}

/// Initial rectangle and minimum selection for one crop workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropProposal {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub min_w: u32,
    pub min_h: u32,
    /// The proposal was shrunk because the source is not larger than the size.
    pub adjusted: bool,
}

/// Propose the crop shown when a user reaches `size` in the workflow.
///
/// An existing crop is reused as is. Otherwise the proposal is the size
/// itself anchored at the origin. When the source is not larger than the
/// size, the rectangle is shrunk in 10% steps, holding the size's ratio,
/// until it fits inside the source; the minimum selection becomes a tenth of
/// the fitted height.
pub fn default_crop(size: &Size, existing: Option<&Crop>, source: (u32, u32)) -> CropProposal {
    let (size_w, size_h) = size.target();
    let (mut x, mut y, mut w, mut h) = match existing {
        Some(c) => (c.x, c.y, c.w, c.h),
        None => (0, 0, size_w, size_h),
    };
    let (mut min_w, mut min_h) = (size_w, size_h);
    let mut adjusted = false;

    let (image_w, image_h) = source;
    if image_w > 0 && image_h > 0 && (image_w <= size_w || image_h <= size_h) {
        let ratio = size.aspect_ratio.as_f64();
        let mut height_buffer = image_h.saturating_sub(1) as f64;
        while height_buffer >= 1.0 {
            h = height_buffer.round() as u32;
            w = (ratio * h as f64).round() as u32;
            if w + 1 < image_w {
                break;
            }
            height_buffer *= 0.9;
        }
        (x, y) = (0, 0);
        min_h = h / 10;
        min_w = (ratio * min_h as f64).round() as u32;
        adjusted = true;
    }

    CropProposal {
        x,
        y,
        w,
        h,
        min_w,
        min_h,
        adjusted,
    }
}
