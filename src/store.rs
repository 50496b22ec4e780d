//! Metadata store for size sets, sizes, images and crops.
//!
//! The engine only needs a handful of lookups, captured by [`CatalogStore`].
//! [`JsonCatalog`] is the bundled implementation: the whole catalog held in
//! memory and persisted as one human-readable JSON document.
//!
//! ```text
//! {
//!   "size_sets": [{"id": 1, "name": "Article", "slug": "article"}],
//!   "sizes":     [{"id": 1, "size_set_id": 1, "slug": "hero", "width": 1200, ...}],
//!   "images":    [{"id": 7, "path": "2024/05/harbor.jpg", "size_set_id": 1}],
//!   "crops":     [{"image_id": 7, "size_id": 1, "x": 0, "y": 40, "w": 1800, "h": 900}]
//! }
//! ```

use crate::catalog::{CatalogError, Size, SizeSet};
use crate::crop::{Crop, CropError};
use crate::types::Image;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error("Duplicate slug '{slug}' in {scope}")]
    DuplicateSlug { slug: String, scope: String },
    #[error("Unknown {kind} {id}")]
    Unknown { kind: &'static str, id: u64 },
}

/// Lookups and crop persistence required by the engine.
pub trait CatalogStore: Sync {
    fn size_set(&self, id: u64) -> Option<SizeSet>;

    fn size_set_by_slug(&self, slug: &str) -> Option<SizeSet>;

    fn size(&self, id: u64) -> Option<Size>;

    /// Every size of a set, in catalog order.
    fn sizes_in_set(&self, size_set_id: u64) -> Vec<Size>;

    fn image(&self, id: u64) -> Option<Image>;

    fn images(&self) -> Vec<Image>;

    /// Every crop stored for an image, in catalog order.
    fn crops_for_image(&self, image_id: u64) -> Vec<Crop>;

    fn crop(&self, image_id: u64, size_id: u64) -> Option<Crop>;

    /// Insert or replace the crop for its (image, size) pair.
    fn save_crop(&mut self, crop: Crop) -> Result<Crop, StoreError>;

    /// Remove the crop for an (image, size) pair. Returns whether one existed.
    fn delete_crop(&mut self, image_id: u64, size_id: u64) -> Result<bool, StoreError>;

    /// Size of a set looked up by slug.
    fn size_by_slug(&self, size_set_id: u64, slug: &str) -> Option<Size> {
        self.sizes_in_set(size_set_id)
            .into_iter()
            .find(|s| s.slug == slug)
    }
}

/// In-memory catalog persisted as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JsonCatalog {
    pub size_sets: Vec<SizeSet>,
    pub sizes: Vec<Size>,
    pub images: Vec<Image>,
    pub crops: Vec<Crop>,
}

impl JsonCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and check a catalog file. Aspect ratios are recomputed on load.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let mut catalog: Self = serde_json::from_str(&content)?;
        for size in &mut catalog.sizes {
            size.refresh_aspect_ratio();
            size.validate()?;
        }
        catalog.check_unique_slugs()?;
        Ok(catalog)
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn add_size_set(&mut self, size_set: SizeSet) -> Result<(), StoreError> {
        if self.size_sets.iter().any(|s| s.slug == size_set.slug) {
            return Err(StoreError::DuplicateSlug {
                slug: size_set.slug,
                scope: "catalog".into(),
            });
        }
        self.size_sets.push(size_set);
        Ok(())
    }

    /// Validate and store a size, recomputing its aspect ratio.
    pub fn save_size(&mut self, mut size: Size) -> Result<Size, StoreError> {
        size.refresh_aspect_ratio();
        size.validate()?;
        if self.size_set(size.size_set_id).is_none() {
            return Err(StoreError::Unknown {
                kind: "size set",
                id: size.size_set_id,
            });
        }
        if self
            .sizes
            .iter()
            .any(|s| s.size_set_id == size.size_set_id && s.slug == size.slug && s.id != size.id)
        {
            return Err(StoreError::DuplicateSlug {
                slug: size.slug,
                scope: format!("size set {}", size.size_set_id),
            });
        }
        match self.sizes.iter_mut().find(|s| s.id == size.id) {
            Some(existing) => *existing = size.clone(),
            None => self.sizes.push(size.clone()),
        }
        Ok(size)
    }

    pub fn add_image(&mut self, image: Image) {
        match self.images.iter_mut().find(|i| i.id == image.id) {
            Some(existing) => *existing = image,
            None => self.images.push(image),
        }
    }

    fn check_unique_slugs(&self) -> Result<(), StoreError> {
        for (i, set) in self.size_sets.iter().enumerate() {
            if self.size_sets[..i].iter().any(|s| s.slug == set.slug) {
                return Err(StoreError::DuplicateSlug {
                    slug: set.slug.clone(),
                    scope: "catalog".into(),
                });
            }
        }
        for (i, size) in self.sizes.iter().enumerate() {
            if self.sizes[..i]
                .iter()
                .any(|s| s.size_set_id == size.size_set_id && s.slug == size.slug)
            {
                return Err(StoreError::DuplicateSlug {
                    slug: size.slug.clone(),
                    scope: format!("size set {}", size.size_set_id),
                });
            }
        }
        Ok(())
    }
}

impl CatalogStore for JsonCatalog {
    fn size_set(&self, id: u64) -> Option<SizeSet> {
        self.size_sets.iter().find(|s| s.id == id).cloned()
    }

    fn size_set_by_slug(&self, slug: &str) -> Option<SizeSet> {
        self.size_sets.iter().find(|s| s.slug == slug).cloned()
    }

    fn size(&self, id: u64) -> Option<Size> {
        self.sizes.iter().find(|s| s.id == id).cloned()
    }

    fn sizes_in_set(&self, size_set_id: u64) -> Vec<Size> {
        self.sizes
            .iter()
            .filter(|s| s.size_set_id == size_set_id)
            .cloned()
            .collect()
    }

    fn image(&self, id: u64) -> Option<Image> {
        self.images.iter().find(|i| i.id == id).cloned()
    }

    fn images(&self) -> Vec<Image> {
        self.images.clone()
    }

    fn crops_for_image(&self, image_id: u64) -> Vec<Crop> {
        self.crops
            .iter()
            .filter(|c| c.image_id == image_id)
            .cloned()
            .collect()
    }

    fn crop(&self, image_id: u64, size_id: u64) -> Option<Crop> {
        self.crops
            .iter()
            .find(|c| c.image_id == image_id && c.size_id == size_id)
            .cloned()
    }

    fn save_crop(&mut self, crop: Crop) -> Result<Crop, StoreError> {
        crop.validate()?;
        if self.image(crop.image_id).is_none() {
            return Err(StoreError::Unknown {
                kind: "image",
                id: crop.image_id,
            });
        }
        if self.size(crop.size_id).is_none() {
            return Err(StoreError::Unknown {
                kind: "size",
                id: crop.size_id,
            });
        }
        match self
            .crops
            .iter_mut()
            .find(|c| c.image_id == crop.image_id && c.size_id == crop.size_id)
        {
            Some(existing) => *existing = crop,
            None => self.crops.push(crop),
        }
        Ok(crop)
    }

    fn delete_crop(&mut self, image_id: u64, size_id: u64) -> Result<bool, StoreError> {
        let before = self.crops.len();
        self.crops
            .retain(|c| !(c.image_id == image_id && c.size_id == size_id));
        Ok(self.crops.len() != before)
    }
}
