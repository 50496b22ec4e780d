//! Source image record shared by the store, the orchestrator and the CLI.

use crate::catalog::Size;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Please make sure images have file extensions before uploading: {0}")]
    MissingExtension(String),
    #[error("Unable to open image file: {0}")]
    Unreadable(String),
    #[error("Uploaded image ({width} x {height}) is smaller than a required thumbnail size: {size}")]
    TooSmall {
        width: u32,
        height: u32,
        size: String,
    },
}

/// A source asset and the size set describing every thumbnail it may produce.
///
/// `path` is relative to the storage root (e.g. `2024/05/01/harbor.jpg`).
/// Derived files are named from it, see [`crate::naming`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub path: String,
    pub size_set_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Image {
    pub fn new(id: u64, path: &str, size_set_id: u64) -> Self {
        Self {
            id,
            path: path.to_string(),
            size_set_id,
            attribution: None,
            caption: None,
        }
    }

    /// Validate an upload before it is stored.
    ///
    /// `dimensions` is `None` when the bytes could not be decoded. With
    /// `check_sizes`, the source must cover every size of its set, checked
    /// widest first so the error names the most demanding size.
    pub fn validate(
        &self,
        dimensions: Option<(u32, u32)>,
        sizes: &[Size],
        check_sizes: bool,
    ) -> Result<(), ImageError> {
        if Path::new(&self.path).extension().is_none() {
            return Err(ImageError::MissingExtension(self.path.clone()));
        }
        let (width, height) =
            dimensions.ok_or_else(|| ImageError::Unreadable(self.path.clone()))?;

        if check_sizes {
            let mut by_width: Vec<&Size> = sizes.iter().collect();
            by_width.sort_by_key(|s| std::cmp::Reverse(s.width.unwrap_or(0)));
            for size in by_width {
                if size.width.unwrap_or(0) > width || size.height.unwrap_or(0) > height {
                    return Err(ImageError::TooSmall {
                        width,
                        height,
                        size: size.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GenerationMode;

    fn sizes() -> Vec<Size> {
        vec![
            Size::new(1, 1, "small", Some(100), Some(100), GenerationMode::AutoCrop),
            Size::new(2, 1, "big", Some(800), Some(600), GenerationMode::ManualCrop),
        ]
    }

    #[test]
    fn validate_rejects_missing_extension() {
        let image = Image::new(1, "uploads/photo", 1);
        assert_eq!(
            image.validate(Some((1000, 1000)), &sizes(), true),
            Err(ImageError::MissingExtension("uploads/photo".into()))
        );
    }

    #[test]
    fn validate_rejects_undecodable() {
        let image = Image::new(1, "uploads/photo.jpg", 1);
        assert!(matches!(
            image.validate(None, &sizes(), true),
            Err(ImageError::Unreadable(_))
        ));
    }

    #[test]
    fn validate_names_widest_failing_size() {
        let image = Image::new(1, "uploads/photo.jpg", 1);
        let err = image.validate(Some((500, 500)), &sizes(), true).unwrap_err();
        assert_eq!(
            err,
            ImageError::TooSmall {
                width: 500,
                height: 500,
                size: "big: 800x600".into()
            }
        );
    }

    #[test]
    fn validate_size_check_can_be_disabled() {
        let image = Image::new(1, "uploads/photo.jpg", 1);
        assert!(image.validate(Some((50, 50)), &sizes(), false).is_ok());
    }

    #[test]
    fn serde_skips_empty_metadata() {
        let json = serde_json::to_string(&Image::new(3, "a/b.png", 2)).unwrap();
        assert_eq!(json, r#"{"id":3,"path":"a/b.png","size_set_id":2}"#);
    }
}
