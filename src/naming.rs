//! Deterministic names for derived thumbnails.
//!
//! Every derived file lives in a folder named after its source, with the
//! source extension stripped, and is named after the size slug:
//!
//! ```text
//! 2024/05/harbor.jpg                  source
//! 2024/05/harbor/hero.jpg             thumbnail "hero"
//! 2024/05/harbor/hero@2x.jpg          its retina companion
//! ```
//!
//! Names are storage keys with `/` separators. The same key is joined onto a
//! local root or a public base URL, so paths and URLs never disagree.
//! No record of derived files is kept anywhere; they are found again by
//! recomputing these names.

use crate::catalog::{RETINA_MARKER, Size};
use crate::types::Image;

/// Split a key into (stem including any folders, extension including the dot).
///
/// A leading dot in the file name does not start an extension.
fn split_extension(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => path.split_at(name_start + dot),
        _ => (path, ""),
    }
}

/// Extension of the source, with its dot (`".jpg"`), or empty.
pub fn extension(image_path: &str) -> &str {
    split_extension(image_path).1
}

/// Folder holding every derived file of a source.
///
/// ```
/// # use simple_crop::naming::folder_path;
/// assert_eq!(folder_path("2024/05/harbor.jpg"), "2024/05/harbor");
/// ```
pub fn folder_path(image_path: &str) -> &str {
    split_extension(image_path).0
}

/// Key of a size's thumbnail, optionally its retina companion.
pub fn thumbnail_key(image_path: &str, size_slug: &str, retina: bool) -> String {
    let (folder, ext) = split_extension(image_path);
    let marker = if retina { RETINA_MARKER } else { "" };
    format!("{folder}/{size_slug}{marker}{ext}")
}

/// Key of an image's thumbnail for `size_slug`.
pub fn thumbnail_path(image: &Image, size_slug: &str, retina: bool) -> String {
    thumbnail_key(&image.path, size_slug, retina)
}

/// Public URL of an image's thumbnail under `base_url`.
pub fn thumbnail_url(base_url: &str, image: &Image, size_slug: &str, retina: bool) -> String {
    join(base_url, &thumbnail_path(image, size_slug, retina))
}

/// Join a key onto a root directory or base URL with exactly one `/`.
pub fn join(base: &str, key: &str) -> String {
    let base = base.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}/{key}")
    }
}

/// Every key an image may have derived for `sizes`: each base thumbnail,
/// followed by its retina companion when the size asks for one.
pub fn derived_paths(image: &Image, sizes: &[Size]) -> Vec<String> {
    sizes
        .iter()
        .flat_map(|size| {
            let base = thumbnail_path(image, &size.slug, false);
            let retina = size
                .retina
                .then(|| thumbnail_path(image, &size.slug, true));
            std::iter::once(base).chain(retina)
        })
        .collect()
}
