//! Size catalog: named target sizes grouped into size sets.
//!
//! A [`SizeSet`] is the complete list of thumbnails an image may produce. Each
//! [`Size`] inside it names one output: its dimensions, how it is generated
//! ([`GenerationMode`]), whether it waits for a first request, and whether a
//! double-density companion is derived.
//!
//! ## Aspect ratios
//!
//! Sizes are grouped by their rounded aspect ratio, never by raw dimensions.
//! `300x200` and `150x100` both land on `1.5`, so one manual crop answers for
//! both. The ratio is `round(width / height, 2)` with ties going to the even
//! hundredth, evaluated on the exact value of the float quotient. A missing or
//! zero dimension yields a ratio of exactly `1`.
//!
//! [`AspectRatio`] stores the rounded value as integer hundredths so equality
//! and ordering are exact.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Slug suffix of the double-density companion of a size.
pub const RETINA_MARKER: &str = "@2x";

/// Largest width or height a size may declare.
pub const MAX_DIMENSION: u32 = u32::MAX / 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Invalid size definition '{slug}': {reason}")]
    InvalidSizeDefinition { slug: String, reason: String },
}

/// How a size's thumbnail is derived from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// A user-selected crop drives the thumbnail (full image when none exists).
    #[default]
    ManualCrop,
    /// Crop-to-fill with no user input.
    AutoCrop,
    /// Scale-then-crop, preserving the native aspect ratio.
    AutoSize,
}

impl GenerationMode {
    /// Whether the mode is generated without user input.
    pub fn is_automatic(self) -> bool {
        matches!(self, GenerationMode::AutoCrop | GenerationMode::AutoSize)
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GenerationMode::ManualCrop => "Manually Crop",
            GenerationMode::AutoCrop => "Auto-Crop",
            GenerationMode::AutoSize => "Auto-Size",
        };
        f.write_str(label)
    }
}

/// An aspect ratio rounded to two decimals, stored as hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AspectRatio(u64);

impl AspectRatio {
    pub const SQUARE: AspectRatio = AspectRatio(100);

    pub fn from_hundredths(hundredths: u64) -> Self {
        Self(hundredths)
    }

    pub fn hundredths(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::SQUARE
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Aspect ratio of `width / height`, rounded to two decimals.
///
/// Returns `1` when either dimension is missing or zero.
///
/// ```
/// use simple_crop::catalog::{aspect_ratio, AspectRatio};
/// assert_eq!(aspect_ratio(Some(300), Some(200)).to_string(), "1.50");
/// assert_eq!(aspect_ratio(Some(300), None), AspectRatio::SQUARE);
/// ```
pub fn aspect_ratio(width: Option<u32>, height: Option<u32>) -> AspectRatio {
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => {
            AspectRatio(round_hundredths_half_even(w as f64 / h as f64))
        }
        _ => AspectRatio::SQUARE,
    }
}

/// Round a positive float to the nearest hundredth, ties to even.
///
/// The tie test compares `200 * q` against `2c + 1` on the exact binary value
/// of `q`, so quotients like `2.675` (stored slightly below) round down while
/// exact ties like `0.125` go to the even neighbour.
fn round_hundredths_half_even(q: f64) -> u64 {
    let c = (q * 100.0).floor().max(0.0) as u64;
    match compare_to_tie(q, c) {
        std::cmp::Ordering::Less => c,
        std::cmp::Ordering::Greater => c + 1,
        std::cmp::Ordering::Equal => {
            if c % 2 == 0 {
                c
            } else {
                c + 1
            }
        }
    }
}

/// Exact comparison of `200 * q` with `2c + 1`.
fn compare_to_tie(q: f64, c: u64) -> std::cmp::Ordering {
    let bits = q.to_bits();
    let exp_bits = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mantissa, exp) = if exp_bits == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), exp_bits - 1075)
    };

    let lhs = mantissa as u128 * 200;
    let rhs = 2 * c as u128 + 1;
    if exp >= 0 {
        match lhs.checked_shl(exp as u32) {
            Some(l) if l >> exp == lhs => l.cmp(&rhs),
            _ => std::cmp::Ordering::Greater,
        }
    } else {
        let shift = (-exp) as u32;
        match rhs.checked_shl(shift) {
            Some(r) if shift < 128 && r >> shift == rhs => lhs.cmp(&r),
            // rhs overflowed: it is far larger than any 61-bit lhs
            _ => std::cmp::Ordering::Less,
        }
    }
}

/// A named collection of sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeSet {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

/// One target output: dimensions, generation mode and request policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub id: u64,
    pub size_set_id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub mode: GenerationMode,
    /// Derived from width/height; refreshed by [`Size::refresh_aspect_ratio`].
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Defer generation from image save to the first request.
    #[serde(default)]
    pub create_on_request: bool,
    /// Also derive a double-density companion.
    #[serde(default)]
    pub retina: bool,
}

impl Size {
    /// Build a size with its aspect ratio already computed.
    pub fn new(
        id: u64,
        size_set_id: u64,
        slug: &str,
        width: Option<u32>,
        height: Option<u32>,
        mode: GenerationMode,
    ) -> Self {
        Self {
            id,
            size_set_id,
            name: slug.to_string(),
            slug: slug.to_string(),
            width,
            height,
            mode,
            aspect_ratio: aspect_ratio(width, height),
            create_on_request: false,
            retina: false,
        }
    }

    /// Check the catalog invariants.
    ///
    /// At least one dimension must be set, and every mode other than
    /// [`GenerationMode::AutoSize`] needs both. Each dimension must leave room
    /// for its retina double.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let width = self.width.filter(|&w| w > 0);
        let height = self.height.filter(|&h| h > 0);
        if width.is_none() && height.is_none() {
            return Err(self.invalid("size requires either a width, a height, or both"));
        }
        if self.mode != GenerationMode::AutoSize && (width.is_none() || height.is_none()) {
            return Err(self.invalid(&format!("{} requires both sizes be specified", self.mode)));
        }
        if width.into_iter().chain(height).any(|d| d > MAX_DIMENSION) {
            return Err(self.invalid(&format!("dimensions must not exceed {MAX_DIMENSION}")));
        }
        Ok(())
    }

    /// Recompute the derived aspect ratio. Called on every catalog save.
    pub fn refresh_aspect_ratio(&mut self) {
        self.aspect_ratio = aspect_ratio(self.width, self.height);
    }

    /// Dimensions with missing values as `0` (the rescale engine's "implied").
    pub fn target(&self) -> (u32, u32) {
        (self.width.unwrap_or(0), self.height.unwrap_or(0))
    }

    /// The double-density companion of this size.
    pub fn retina_variant(&self) -> Size {
        retina_variant(self)
    }

    fn invalid(&self, reason: &str) -> CatalogError {
        CatalogError::InvalidSizeDefinition {
            slug: self.slug.clone(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = |d: Option<u32>| d.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
        write!(f, "{}: {}x{}", self.name, dim(self.width), dim(self.height))
    }
}

/// Double the dimensions and mark the slug; the original is untouched.
///
/// Retina sizes are never stored in the catalog, only derived on demand.
pub fn retina_variant(size: &Size) -> Size {
    let mut retina = size.clone();
    retina.width = size.width.map(|w| w.saturating_mul(2));
    retina.height = size.height.map(|h| h.saturating_mul(2));
    retina.slug = format!("{}{}", size.slug, RETINA_MARKER);
    retina
}

/// One representative size per distinct aspect ratio.
///
/// `created = true` lists sizes generated eagerly, `false` the
/// create-on-request ones. The first size seen for a ratio represents it;
/// the input order is preserved.
pub fn unique_ratios<'a>(sizes: &'a [Size], created: bool) -> Vec<&'a Size> {
    let create_on_request = !created;
    let mut seen = Vec::new();
    sizes
        .iter()
        .filter(|s| s.create_on_request == create_on_request)
        .filter(|s| {
            if seen.contains(&s.aspect_ratio) {
                false
            } else {
                seen.push(s.aspect_ratio);
                true
            }
        })
        .collect()
}

/// Sizes of one set sharing a ratio, optionally restricted by request policy.
pub fn sizes_with_ratio<'a>(
    sizes: &'a [Size],
    size_set_id: u64,
    ratio: AspectRatio,
    create_on_request: Option<bool>,
) -> impl Iterator<Item = &'a Size> {
    sizes.iter().filter(move |s| {
        s.size_set_id == size_set_id
            && s.aspect_ratio == ratio
            && create_on_request.is_none_or(|c| s.create_on_request == c)
    })
}
