//! Pure calculation functions for crop regions and rescale dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! Targets are carried as `f64` until the final truncation so an implied
//! dimension keeps its fractional part through the ratio comparisons.

/// A rectangle of a source buffer, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Fill in a missing (zero) target dimension from the source aspect ratio.
///
/// Returns `None` when both target dimensions are zero.
///
/// # Examples
/// ```
/// # use simple_crop::imaging::implied_target;
/// // 400 wide, height implied from a 2:1 source
/// assert_eq!(implied_target((800, 400), (400, 0)), Some((400.0, 200.0)));
/// assert_eq!(implied_target((800, 400), (0, 0)), None);
/// ```
pub fn implied_target(source: (u32, u32), target: (u32, u32)) -> Option<(f64, f64)> {
    let (src_w, src_h) = (source.0 as f64, source.1 as f64);
    match target {
        (0, 0) => None,
        (0, h) => Some((src_w * h as f64 / src_h, h as f64)),
        (w, 0) => Some((w as f64, src_h * w as f64 / src_w)),
        (w, h) => Some((w as f64, h as f64)),
    }
}

/// Truncate a float target to output pixels, never below 1.
pub fn output_dimensions(target: (f64, f64)) -> (u32, u32) {
    ((target.0 as u32).max(1), (target.1 as u32).max(1))
}

/// Region of the source kept by crop-to-fill.
///
/// When the target is relatively narrower than the source, the full height
/// is kept and the region is centered horizontally. Otherwise the full width
/// is kept and the vertical offset sits at one third of the removed height.
///
/// # Examples
/// ```
/// # use simple_crop::imaging::{fill_region, Region};
/// // 300x300 into 2:1 → keep 300x150, offset (300 - 150) / 3 = 50
/// assert_eq!(
///     fill_region((300, 300), (200.0, 100.0)),
///     Region { x: 0, y: 50, width: 300, height: 150 }
/// );
/// ```
pub fn fill_region(source: (u32, u32), target: (f64, f64)) -> Region {
    let (src_w, src_h) = (source.0 as f64, source.1 as f64);
    let src_ratio = src_w / src_h;
    let dst_ratio = target.0 / target.1;

    let (x_offset, y_offset, crop_w, crop_h) = if dst_ratio < src_ratio {
        let crop_w = src_h * dst_ratio;
        ((src_w - crop_w) / 2.0, 0.0, crop_w, src_h)
    } else {
        let crop_h = src_w / dst_ratio;
        (0.0, (src_h - crop_h) / 3.0, src_w, crop_h)
    };

    let left = x_offset as u32;
    let top = y_offset as u32;
    let right = ((x_offset + crop_w) as u32).min(source.0);
    let bottom = ((y_offset + crop_h) as u32).min(source.1);
    Region {
        x: left,
        y: top,
        width: right.saturating_sub(left).max(1),
        height: bottom.saturating_sub(top).max(1),
    }
}

/// Dimensions that cover the target box while keeping the source ratio.
///
/// One axis matches the target, the other meets or exceeds it. The result is
/// clamped to at least the truncated target so the top-left crop that
/// follows always yields exact target dimensions.
///
/// # Examples
/// ```
/// # use simple_crop::imaging::cover_dimensions;
/// // 2:1 source into a square: height binds
/// assert_eq!(cover_dimensions((400, 200), (100.0, 100.0)), (200, 100));
/// ```
pub fn cover_dimensions(source: (u32, u32), target: (f64, f64)) -> (u32, u32) {
    let src_ratio = source.0 as f64 / source.1 as f64;
    let (tgt_w, tgt_h) = target;

    let (w, h) = if tgt_w / src_ratio > tgt_h {
        (tgt_w, tgt_w / src_ratio)
    } else {
        (src_ratio * tgt_h, tgt_h)
    };

    let (min_w, min_h) = output_dimensions(target);
    ((w as u32).max(min_w), (h as u32).max(min_h))
}

/// Clip a requested rectangle to the source bounds.
///
/// Returns `None` when nothing of the rectangle lies inside the source.
pub fn clip_region(source: (u32, u32), x: u32, y: u32, w: u32, h: u32) -> Option<Region> {
    let (src_w, src_h) = source;
    if x >= src_w || y >= src_h || w == 0 || h == 0 {
        return None;
    }
    Some(Region {
        x,
        y,
        width: w.min(src_w - x),
        height: h.min(src_h - y),
    })
}

/// Whether a cropped buffer is large enough for a retina target.
///
/// A zero target dimension is implied and never blocks.
pub fn retina_fits(cropped: (u32, u32), retina: (u32, u32)) -> bool {
    retina.0 <= cropped.0 && retina.1 <= cropped.1
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // implied_target tests
    // =========================================================================

    #[test]
    fn implied_height_from_width() {
        assert_eq!(implied_target((800, 600), (400, 0)), Some((400.0, 300.0)));
    }

    #[test]
    fn implied_width_from_height() {
        assert_eq!(implied_target((800, 600), (0, 300)), Some((400.0, 300.0)));
    }

    #[test]
    fn implied_keeps_fraction_until_output() {
        // 1000x3 at width 100 → height 0.3, output clamps to 1
        let target = implied_target((1000, 3), (100, 0)).unwrap();
        assert!((target.1 - 0.3).abs() < 1e-9);
        assert_eq!(output_dimensions(target), (100, 1));
    }

    #[test]
    fn implied_needs_one_dimension() {
        assert_eq!(implied_target((10, 10), (0, 0)), None);
    }

    // =========================================================================
    // fill_region tests
    // =========================================================================

    #[test]
    fn fill_wider_source_centers_horizontally() {
        // 1000x500 into square: keep 500x500 at x = 250
        assert_eq!(
            fill_region((1000, 500), (100.0, 100.0)),
            Region {
                x: 250,
                y: 0,
                width: 500,
                height: 500
            }
        );
    }

    #[test]
    fn fill_taller_source_biases_upward() {
        // 600x1200 into square: keep 600x600, offset 600 / 3 = 200, not 300
        assert_eq!(
            fill_region((600, 1200), (100.0, 100.0)),
            Region {
                x: 0,
                y: 200,
                width: 600,
                height: 600
            }
        );
    }

    #[test]
    fn fill_same_ratio_keeps_everything() {
        assert_eq!(
            fill_region((800, 600), (400.0, 300.0)),
            Region {
                x: 0,
                y: 0,
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn fill_region_stays_inside_tiny_source() {
        let region = fill_region((1, 1), (300.0, 7.0));
        assert_eq!(region.width, 1);
        assert_eq!(region.height, 1);
        assert_eq!((region.x, region.y), (0, 0));
    }

    // =========================================================================
    // cover_dimensions tests
    // =========================================================================

    #[test]
    fn cover_wide_source_binds_height() {
        assert_eq!(cover_dimensions((400, 200), (100.0, 100.0)), (200, 100));
    }

    #[test]
    fn cover_tall_source_binds_width() {
        assert_eq!(cover_dimensions((200, 400), (100.0, 100.0)), (100, 200));
    }

    #[test]
    fn cover_same_ratio_is_exact() {
        assert_eq!(cover_dimensions((1600, 900), (160.0, 90.0)), (160, 90));
    }

    #[test]
    fn cover_never_falls_short_of_target() {
        for source in [(3, 7), (999, 1000), (1000, 999), (17, 1), (1, 17)] {
            for target in [(100.0, 100.0), (33.0, 71.0), (250.0, 10.0)] {
                let (w, h) = cover_dimensions(source, target);
                assert!(w >= target.0 as u32 && h >= target.1 as u32, "{source:?} {target:?}");
            }
        }
    }

    // =========================================================================
    // clip_region / retina_fits tests
    // =========================================================================

    #[test]
    fn clip_inside_is_unchanged() {
        assert_eq!(
            clip_region((100, 100), 10, 10, 50, 50),
            Some(Region {
                x: 10,
                y: 10,
                width: 50,
                height: 50
            })
        );
    }

    #[test]
    fn clip_overhang_is_trimmed() {
        assert_eq!(
            clip_region((100, 80), 60, 50, 100, 100),
            Some(Region {
                x: 60,
                y: 50,
                width: 40,
                height: 30
            })
        );
    }

    #[test]
    fn clip_outside_is_none() {
        assert_eq!(clip_region((100, 100), 100, 0, 10, 10), None);
        assert_eq!(clip_region((100, 100), 0, 0, 0, 10), None);
    }

    #[test]
    fn retina_checks_both_axes() {
        assert!(retina_fits((400, 400), (400, 400)));
        assert!(!retina_fits((200, 200), (400, 400)));
        assert!(!retina_fits((500, 300), (400, 400)));
        // implied height never blocks
        assert!(retina_fits((500, 10), (400, 0)));
    }
}
