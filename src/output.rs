//! CLI output formatting.
//!
//! Output is **size-centric**: every line leads with the size slug, with
//! paths and dimensions as indented context.
//!
//! ## Generation outcomes
//!
//! ```text
//! 7 2024/05/harbor.jpg
//!     square: generated 100x100 → 2024/05/harbor/square.jpg
//!         retina: 200x200 → 2024/05/harbor/square@2x.jpg
//!     lazy: not needed
//!     wide: failed: Storage error: Not found: 2024/05/harbor.jpg
//!
//! 1 generated, 1 skipped, 1 failed (3 total)
//! ```
//!
//! ## Ratios
//!
//! ```text
//! 1.78 wide (160x90, Manually Crop)
//! 1.50 large (300x200, Manually Crop)
//! ```
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::catalog::Size;
use crate::crop::CropProposal;
use crate::process::{GenerationState, RegenerationSummary, SizeOutcome, Thumbnail};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `300x200`, with `auto` standing in for a missing side.
fn dimensions(width: Option<u32>, height: Option<u32>) -> String {
    let side = |v: Option<u32>| v.map_or_else(|| "auto".to_string(), |v| v.to_string());
    format!("{}x{}", side(width), side(height))
}

fn thumbnail_lines(thumbnail: &Thumbnail, depth: usize) -> Vec<String> {
    let artifact = &thumbnail.artifact;
    let mut lines = vec![format!(
        "{}{}: generated {}x{} \u{2192} {}",
        indent(depth),
        thumbnail.size_slug,
        artifact.width,
        artifact.height,
        artifact.path
    )];
    if let Some(retina) = &thumbnail.retina {
        lines.push(format!(
            "{}retina: {}x{} \u{2192} {}",
            indent(depth + 1),
            retina.width,
            retina.height,
            retina.path
        ));
    }
    lines
}

/// Format per-size outcomes, grouped by image in first-seen order.
///
/// With `print_data`, generated sizes also show digests.
pub fn format_outcomes(
    outcomes: &[SizeOutcome],
    image_paths: &[(u64, String)],
    print_data: bool,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<u64> = None;

    for outcome in outcomes {
        if current != Some(outcome.image_id) {
            current = Some(outcome.image_id);
            let path = image_paths
                .iter()
                .find(|(id, _)| *id == outcome.image_id)
                .map_or("", |(_, p)| p.as_str());
            lines.push(format!("{} {}", outcome.image_id, path).trim_end().to_string());
        }
        match (&outcome.state, &outcome.thumbnail) {
            (GenerationState::Generated, Some(thumbnail)) => {
                lines.extend(thumbnail_lines(thumbnail, 1));
                if print_data {
                    lines.push(format!("{}sha256: {}", indent(2), thumbnail.artifact.sha256));
                }
            }
            (state, _) => lines.push(format!("{}{}: {}", indent(1), outcome.size_slug, state)),
        }
    }
    lines
}

pub fn format_summary(summary: &RegenerationSummary) -> String {
    summary.to_string()
}

/// Print outcomes followed by their summary.
pub fn print_outcomes(outcomes: &[SizeOutcome], image_paths: &[(u64, String)], print_data: bool) {
    for line in format_outcomes(outcomes, image_paths, print_data) {
        println!("{}", line);
    }
    println!();
    println!("{}", format_summary(&RegenerationSummary::from_outcomes(outcomes)));
}

/// Format the representative size of each ratio.
pub fn format_ratios(sizes: &[&Size]) -> Vec<String> {
    sizes
        .iter()
        .map(|size| {
            format!(
                "{} {} ({}, {})",
                size.aspect_ratio,
                size.slug,
                dimensions(size.width, size.height),
                size.mode
            )
        })
        .collect()
}

pub fn print_ratios(sizes: &[&Size]) {
    for line in format_ratios(sizes) {
        println!("{}", line);
    }
}

/// Format the next step of the crop workflow.
pub fn format_crop_step(size: &Size, proposal: &CropProposal) -> Vec<String> {
    let mut lines = vec![
        format!("{} {} ({})", size.aspect_ratio, size.slug, dimensions(size.width, size.height)),
        format!(
            "{}crop: {},{} {}x{}",
            indent(1),
            proposal.x,
            proposal.y,
            proposal.w,
            proposal.h
        ),
    ];
    if proposal.adjusted {
        lines.push(format!(
            "{}shrunk to fit source, minimum {}x{}",
            indent(1),
            proposal.min_w,
            proposal.min_h
        ));
    }
    lines
}

pub fn print_crop_step(size: &Size, proposal: &CropProposal) {
    for line in format_crop_step(size, proposal) {
        println!("{}", line);
    }
}

/// Print one path per line.
pub fn print_paths(paths: &[String]) {
    for path in paths {
        println!("{}", path);
    }
}
