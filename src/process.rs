//! Generation orchestrator: when and how each thumbnail is derived.
//!
//! Every (image, size) pair moves through a small state machine that is
//! never persisted, only recomputed from the catalog on each call:
//!
//! ```text
//! NOT_NEEDED ──(explicit request / force)──▶ PENDING ──▶ GENERATED
//!                                                  └───▶ FAILED(reason)
//! ```
//!
//! ## Triggers
//!
//! | Trigger | Sizes | Policy |
//! |---|---|---|
//! | [`Generator::on_image_saved`] | automatic modes | generate eager ones, delete create-on-request artifacts |
//! | [`Generator::on_crop_saved`] | every size sharing the crop's ratio | regenerate, widest first |
//! | [`Generator::ensure`] | one size | no-op if the artifact exists, else generate with `force_crop` |
//! | [`Generator::regenerate`] | selected images x sizes | parallel, failures counted |
//!
//! Eager and lazy failures are logged and swallowed: a reader sees a missing
//! thumbnail, never an error. Batch regeneration reports every failure in its
//! outcomes instead.
//!
//! ## Generation
//!
//! 1. Read the source through [`Storage`] and decode it with the [`ImageCodec`]
//! 2. Manual-crop sizes cut the resolved crop; other modes use the full buffer
//! 3. Rescale, encode and write to [`thumbnail_path`]
//! 4. Retina sizes repeat step 3 at double size when the cut buffer is large enough
//!
//! ## Parallel Processing
//!
//! Batch regeneration fans out over images with [rayon](https://docs.rs/rayon).
//! Each artifact is written by exactly one (image, size) pair and its bytes
//! are deterministic, so racing writers converge on identical files.

use crate::catalog::{GenerationMode, Size, sizes_with_ratio};
use crate::crop::{Crop, CropError, resolve_crop};
use crate::imaging::{
    CodecError, ImageCodec, OutputFormat, Quality, RescaleError, crop_rect, rescale_for,
    retina_rescale,
};
use crate::naming::{derived_paths, thumbnail_path};
use crate::storage::{Storage, StorageError};
use crate::store::{CatalogStore, StoreError};
use crate::types::{Image, ImageError};
use image::DynamicImage;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::cmp::Reverse;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Rescale error: {0}")]
    Rescale(#[from] RescaleError),
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("None of the provided sizes exist: {0}")]
    NoSizesSelected(String),
}

/// Encoding applied to every derived file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub quality: Quality,
}

/// One written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    /// SHA-256 of the written bytes, hex encoded.
    pub sha256: String,
}

/// A size's thumbnail and, when generated, its retina companion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub size_slug: String,
    pub artifact: Artifact,
    pub retina: Option<Artifact>,
}

/// Where an (image, size) pair ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationState {
    NotNeeded,
    Pending,
    Generated,
    Failed(String),
}

impl GenerationState {
    /// Starting state for a size: deferred sizes wait for an explicit request.
    pub fn initial(size: &Size, force_crop: bool) -> Self {
        if size.create_on_request && !force_crop {
            GenerationState::NotNeeded
        } else {
            GenerationState::Pending
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationState::NotNeeded => f.write_str("not needed"),
            GenerationState::Pending => f.write_str("pending"),
            GenerationState::Generated => f.write_str("generated"),
            GenerationState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Terminal state of one (image, size) pair after a trigger ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeOutcome {
    pub image_id: u64,
    pub size_slug: String,
    pub state: GenerationState,
    pub thumbnail: Option<Thumbnail>,
}

impl SizeOutcome {
    fn not_needed(image: &Image, size: &Size) -> Self {
        Self {
            image_id: image.id,
            size_slug: size.slug.clone(),
            state: GenerationState::NotNeeded,
            thumbnail: None,
        }
    }

    fn failed(image: &Image, size: &Size, reason: &impl fmt::Display) -> Self {
        Self {
            image_id: image.id,
            size_slug: size.slug.clone(),
            state: GenerationState::Failed(reason.to_string()),
            thumbnail: None,
        }
    }

    fn from_result(image: &Image, size: &Size, result: Result<Thumbnail, GenerationError>) -> Self {
        match result {
            Ok(thumbnail) => Self {
                image_id: image.id,
                size_slug: size.slug.clone(),
                state: GenerationState::Generated,
                thumbnail: Some(thumbnail),
            },
            Err(e) => {
                warn!(image = image.id, size = %size.slug, error = %e, "thumbnail generation failed");
                Self::failed(image, size, &e)
            }
        }
    }
}

/// Counts over a batch of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenerationSummary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RegenerationSummary {
    pub fn from_outcomes(outcomes: &[SizeOutcome]) -> Self {
        outcomes
            .iter()
            .fold(Self::default(), |mut summary, outcome| {
                match outcome.state {
                    GenerationState::Generated => summary.generated += 1,
                    GenerationState::Failed(_) => summary.failed += 1,
                    GenerationState::NotNeeded | GenerationState::Pending => summary.skipped += 1,
                }
                summary
            })
    }

    pub fn total(&self) -> usize {
        self.generated + self.skipped + self.failed
    }
}

impl fmt::Display for RegenerationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} generated, {} skipped, {} failed ({} total)",
            self.generated,
            self.skipped,
            self.failed,
            self.total()
        )
    }
}

/// Keep the requested size slugs that exist somewhere in `known`.
///
/// Unknown slugs are warned about and dropped. An empty request selects
/// every size; a request where nothing survives is an error.
pub fn select_slugs(known: &[Size], requested: &[String]) -> Result<Vec<String>, GenerationError> {
    if requested.is_empty() {
        return Ok(Vec::new());
    }
    let selected: Vec<String> = requested
        .iter()
        .filter(|slug| {
            let exists = known.iter().any(|s| &s.slug == *slug);
            if !exists {
                warn!("No size with slug '{slug}' exists");
            }
            exists
        })
        .cloned()
        .collect();
    if selected.is_empty() {
        return Err(GenerationError::NoSizesSelected(requested.join(", ")));
    }
    Ok(selected)
}

/// Derives thumbnails through a storage backend and a codec.
pub struct Generator<'a> {
    storage: &'a dyn Storage,
    codec: &'a dyn ImageCodec,
    output: OutputSettings,
}

impl<'a> Generator<'a> {
    pub fn new(storage: &'a dyn Storage, codec: &'a dyn ImageCodec, output: OutputSettings) -> Self {
        Self {
            storage,
            codec,
            output,
        }
    }

    /// Read and decode an image's source.
    pub fn decode_source(&self, image: &Image) -> Result<DynamicImage, GenerationError> {
        let bytes = self.storage.read(&image.path)?;
        Ok(self.codec.decode(&bytes)?)
    }

    /// Check an upload before it is accepted: extension, decodability and,
    /// with `check_sizes`, that the source covers every size of its set.
    pub fn validate_source(
        &self,
        store: &dyn CatalogStore,
        image: &Image,
        check_sizes: bool,
    ) -> Result<(), GenerationError> {
        let dimensions = self
            .storage
            .read(&image.path)
            .ok()
            .and_then(|bytes| self.codec.identify(&bytes).ok())
            .map(|d| (d.width, d.height));
        let sizes = store.sizes_in_set(image.size_set_id);
        Ok(image.validate(dimensions, &sizes, check_sizes)?)
    }

    /// Generate one size's thumbnail.
    ///
    /// Create-on-request sizes are left alone (`Ok(None)`) unless
    /// `force_crop` is set.
    pub fn generate(
        &self,
        store: &dyn CatalogStore,
        image: &Image,
        size: &Size,
        force_crop: bool,
    ) -> Result<Option<Thumbnail>, GenerationError> {
        if GenerationState::initial(size, force_crop) == GenerationState::NotNeeded {
            debug!(image = image.id, size = %size.slug, "deferred until requested");
            return Ok(None);
        }
        let source = self.decode_source(image)?;
        self.generate_from(store, image, size, &source).map(Some)
    }

    fn generate_from(
        &self,
        store: &dyn CatalogStore,
        image: &Image,
        size: &Size,
        source: &DynamicImage,
    ) -> Result<Thumbnail, GenerationError> {
        let cropped = self.crop_source(store, image, size, source)?;
        self.render(image, size, &cropped)
    }

    /// The buffer a size is rescaled from.
    fn crop_source<'s>(
        &self,
        store: &dyn CatalogStore,
        image: &Image,
        size: &Size,
        source: &'s DynamicImage,
    ) -> Result<Cow<'s, DynamicImage>, GenerationError> {
        if size.mode != GenerationMode::ManualCrop {
            return Ok(Cow::Borrowed(source));
        }
        match resolve_crop(store, image, size) {
            Ok(crop) => Ok(Cow::Owned(crop_rect(source, crop.x, crop.y, crop.w, crop.h)?)),
            Err(CropError::NoCropFound { .. }) => {
                debug!(image = image.id, size = %size.slug, "no crop stored, using full source");
                Ok(Cow::Borrowed(source))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rescale, encode and write a size (and its retina companion) from an
    /// already cut buffer.
    pub fn render(
        &self,
        image: &Image,
        size: &Size,
        cropped: &DynamicImage,
    ) -> Result<Thumbnail, GenerationError> {
        let buffer = rescale_for(cropped, size)?;
        let artifact = self.write(thumbnail_path(image, &size.slug, false), &buffer)?;

        let retina = if size.retina {
            match retina_rescale(cropped, size)? {
                Some(buffer) => Some(self.write(thumbnail_path(image, &size.slug, true), &buffer)?),
                None => {
                    debug!(
                        image = image.id,
                        size = %size.slug,
                        width = cropped.width(),
                        height = cropped.height(),
                        "cropped source too small for retina, skipped"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(Thumbnail {
            size_slug: size.slug.clone(),
            artifact,
            retina,
        })
    }

    fn write(&self, path: String, buffer: &DynamicImage) -> Result<Artifact, GenerationError> {
        let bytes = self
            .codec
            .encode(buffer, self.output.format, self.output.quality)?;
        let content_type = self.output.format.content_type();
        self.storage.write(&path, &bytes, content_type)?;
        debug!(path = %path, width = buffer.width(), height = buffer.height(), "wrote thumbnail");
        Ok(Artifact {
            sha256: format!("{:x}", Sha256::digest(&bytes)),
            path,
            width: buffer.width(),
            height: buffer.height(),
            content_type,
        })
    }

    /// Remove a size's derived files so the next request regenerates them.
    fn delete_derived(&self, image: &Image, size: &Size) {
        for retina in [false, true] {
            let path = thumbnail_path(image, &size.slug, retina);
            match self.storage.delete(&path) {
                Ok(true) => debug!(path = %path, "deleted stale thumbnail"),
                Ok(false) => {}
                Err(e) => warn!(path = %path, error = %e, "could not delete stale thumbnail"),
            }
        }
    }

    /// Lifecycle hook for a saved source image.
    ///
    /// Automatic sizes generated eagerly are rebuilt from one decode of the
    /// source; create-on-request ones lose their artifacts and wait for the
    /// next request. Manual-crop sizes are untouched.
    pub fn on_image_saved(&self, store: &dyn CatalogStore, image: &Image) -> Vec<SizeOutcome> {
        let (deferred, eager): (Vec<Size>, Vec<Size>) = store
            .sizes_in_set(image.size_set_id)
            .into_iter()
            .filter(|s| s.mode.is_automatic())
            .partition(|s| s.create_on_request);

        let mut outcomes = Vec::with_capacity(deferred.len() + eager.len());
        if !eager.is_empty() {
            match self.decode_source(image) {
                Ok(source) => {
                    for size in &eager {
                        let result = self.generate_from(store, image, size, &source);
                        outcomes.push(SizeOutcome::from_result(image, size, result));
                    }
                }
                Err(e) => {
                    warn!(image = image.id, error = %e, "source unreadable, no thumbnails generated");
                    outcomes.extend(eager.iter().map(|size| SizeOutcome::failed(image, size, &e)));
                }
            }
        }
        for size in &deferred {
            self.delete_derived(image, size);
            outcomes.push(SizeOutcome::not_needed(image, size));
        }

        let summary = RegenerationSummary::from_outcomes(&outcomes);
        info!(image = image.id, %summary, "image saved");
        outcomes
    }

    /// Lifecycle hook for a committed crop.
    ///
    /// Every size of the crop's set sharing its ratio is regenerated, widest
    /// first, from one decode of the source. Manual-crop sizes are cut from
    /// the crop `resolve_crop` picks for the ratio (the widest stored one, so
    /// not necessarily this crop), automatic ones from the full source.
    /// Create-on-request sizes have their stale artifacts deleted instead.
    /// Fails only when the crop refers to an unknown image or size.
    pub fn on_crop_saved(
        &self,
        store: &dyn CatalogStore,
        crop: &Crop,
    ) -> Result<Vec<SizeOutcome>, GenerationError> {
        let size = store.size(crop.size_id).ok_or(StoreError::Unknown {
            kind: "size",
            id: crop.size_id,
        })?;
        let image = store.image(crop.image_id).ok_or(StoreError::Unknown {
            kind: "image",
            id: crop.image_id,
        })?;

        let set_sizes = store.sizes_in_set(size.size_set_id);
        let mut sizes: Vec<&Size> =
            sizes_with_ratio(&set_sizes, size.size_set_id, size.aspect_ratio, None).collect();
        sizes.sort_by_key(|s| Reverse(s.width.unwrap_or(0)));

        let cut = self.decode_source(&image).and_then(|source| {
            let applied = match resolve_crop(store, &image, &size) {
                Ok(resolved) => resolved,
                Err(CropError::NoCropFound { .. }) => *crop,
                Err(e) => return Err(e.into()),
            };
            let cropped = crop_rect(&source, applied.x, applied.y, applied.w, applied.h)?;
            Ok((source, cropped))
        });

        let outcomes: Vec<SizeOutcome> = match cut {
            Ok((source, cropped)) => sizes
                .into_iter()
                .map(|s| {
                    if s.create_on_request {
                        self.delete_derived(&image, s);
                        return SizeOutcome::not_needed(&image, s);
                    }
                    let buffer = match s.mode {
                        GenerationMode::ManualCrop => &cropped,
                        _ => &source,
                    };
                    SizeOutcome::from_result(&image, s, self.render(&image, s, buffer))
                })
                .collect(),
            Err(e) => {
                warn!(image = image.id, error = %e, "crop could not be applied");
                sizes
                    .into_iter()
                    .map(|s| SizeOutcome::failed(&image, s, &e))
                    .collect()
            }
        };

        let summary = RegenerationSummary::from_outcomes(&outcomes);
        info!(image = image.id, size = %size.slug, ratio = %size.aspect_ratio, %summary, "crop saved");
        Ok(outcomes)
    }

    /// Store a crop and run the cascade for it.
    pub fn commit_crop(
        &self,
        store: &mut dyn CatalogStore,
        crop: Crop,
    ) -> Result<(Crop, Vec<SizeOutcome>), GenerationError> {
        let saved = store.save_crop(crop)?;
        let outcomes = self.on_crop_saved(&*store, &saved)?;
        Ok((saved, outcomes))
    }

    /// Lazy path: make sure a thumbnail exists and return its key.
    ///
    /// An existing artifact is returned untouched. Otherwise the size is
    /// generated with `force_crop`, so create-on-request sizes are built too.
    /// Any failure is logged and yields `None`. Asking for the retina key of
    /// a size whose retina companion was skipped also yields `None`.
    pub fn ensure(
        &self,
        store: &dyn CatalogStore,
        image: &Image,
        size: &Size,
        retina: bool,
    ) -> Option<String> {
        let path = thumbnail_path(image, &size.slug, retina);
        match self.storage.exists(&path) {
            Ok(true) => return Some(path),
            Ok(false) => {}
            Err(e) => warn!(path = %path, error = %e, "could not check thumbnail"),
        }

        match self.generate(store, image, size, true) {
            Ok(Some(thumbnail)) => {
                if retina {
                    thumbnail.retina.map(|a| a.path)
                } else {
                    Some(thumbnail.artifact.path)
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!(image = image.id, size = %size.slug, error = %e, "lazy thumbnail generation failed");
                None
            }
        }
    }

    /// Rebuild thumbnails for many images in parallel.
    ///
    /// `slugs` restricts the sizes (empty means all sizes of each image's
    /// set). Without `force`, create-on-request sizes are skipped. Failures
    /// never stop the batch; they are reported in the outcomes.
    pub fn regenerate(
        &self,
        store: &dyn CatalogStore,
        images: &[Image],
        slugs: &[String],
        force: bool,
    ) -> Vec<SizeOutcome> {
        images
            .par_iter()
            .flat_map_iter(|image| self.regenerate_image(store, image, slugs, force))
            .collect()
    }

    fn regenerate_image(
        &self,
        store: &dyn CatalogStore,
        image: &Image,
        slugs: &[String],
        force: bool,
    ) -> Vec<SizeOutcome> {
        let sizes: Vec<Size> = store
            .sizes_in_set(image.size_set_id)
            .into_iter()
            .filter(|s| slugs.is_empty() || slugs.contains(&s.slug))
            .collect();

        let mut source: Option<Result<DynamicImage, String>> = None;
        sizes
            .iter()
            .map(|size| {
                if GenerationState::initial(size, force) == GenerationState::NotNeeded {
                    return SizeOutcome::not_needed(image, size);
                }
                let decoded = source.get_or_insert_with(|| {
                    self.decode_source(image).map_err(|e| e.to_string())
                });
                match &*decoded {
                    Ok(buffer) => {
                        let result = self.generate_from(store, image, size, buffer);
                        SizeOutcome::from_result(image, size, result)
                    }
                    Err(reason) => SizeOutcome::failed(image, size, reason),
                }
            })
            .collect()
    }

    /// Derived files of an image that currently exist in storage.
    pub fn existing_artifacts(&self, image: &Image, sizes: &[Size]) -> Vec<String> {
        derived_paths(image, sizes)
            .into_iter()
            .filter(|path| match self.storage.exists(path) {
                Ok(exists) => exists,
                Err(e) => {
                    warn!(path = %path, error = %e, "could not check derived file");
                    false
                }
            })
            .collect()
    }
}
