//! Thumbnail `<img>` rendering for templates.
//!
//! A tag is assembled in two steps: [`TagRenderer::tag`] resolves the size,
//! optionally generates a missing thumbnail, and fills an [`ImageTag`];
//! [`render_tag`] turns that into markup with
//! [maud](https://maud.lambda.xyz/). Anything that cannot be resolved
//! renders as nothing, so a page never fails because of one thumbnail.
//!
//! Sizes are looked up in a [`SizeLookup`] the caller builds once and
//! refreshes when the catalog changes, not per tag.

use crate::catalog::{GenerationMode, Size};
use crate::naming::thumbnail_url;
use crate::process::Generator;
use crate::store::CatalogStore;
use crate::types::Image;
use maud::{Markup, html};
use std::collections::HashMap;
use tracing::debug;

const PLACEHOLDER_BASE: &str = "https://placehold.it";

/// Sizes keyed by `(size_set_id, slug)`.
#[derive(Debug, Clone, Default)]
pub struct SizeLookup {
    sizes: HashMap<(u64, String), Size>,
}

impl SizeLookup {
    pub fn new(sizes: impl IntoIterator<Item = Size>) -> Self {
        let mut lookup = Self::default();
        lookup.refresh(sizes);
        lookup
    }

    /// Replace the whole table.
    pub fn refresh(&mut self, sizes: impl IntoIterator<Item = Size>) {
        self.sizes = sizes
            .into_iter()
            .map(|size| ((size.size_set_id, size.slug.clone()), size))
            .collect();
    }

    pub fn get(&self, size_set_id: u64, slug: &str) -> Option<&Size> {
        self.sizes.get(&(size_set_id, slug.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

/// Render-time switches, from the `[render]` config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Base URL thumbnails are served from.
    pub public_url: String,
    /// Generate a missing thumbnail while rendering its tag.
    pub create_on_load: bool,
    /// Point every tag at a placeholder service instead.
    pub placeholder: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            public_url: "/media".to_string(),
            create_on_load: true,
            placeholder: false,
        }
    }
}

/// Everything a thumbnail `<img>` carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTag {
    pub image_url: String,
    /// Only set for sizes with fixed dimensions (not auto-size).
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_name: String,
    pub attribution: Option<String>,
    pub alt: Option<String>,
    pub title: Option<String>,
}

/// URL of a placeholder image with the given dimensions.
pub fn placeholder_url(width: u32, height: u32) -> String {
    format!("{PLACEHOLDER_BASE}/{width}x{height}")
}

/// Placeholder dimensions: a missing side repeats the other.
fn placeholder_dimensions(size: &Size) -> (u32, u32) {
    match (size.width, size.height) {
        (Some(w), Some(h)) => (w, h),
        (Some(d), None) | (None, Some(d)) => (d, d),
        (None, None) => (0, 0),
    }
}

pub fn render_tag(tag: &ImageTag) -> Markup {
    html! {
        img src=(tag.image_url)
            width=[tag.width]
            height=[tag.height]
            alt=[tag.alt.as_deref()]
            title=[tag.title.as_deref()]
            data-size=(tag.size_name)
            data-attribution=[tag.attribution.as_deref()];
    }
}

/// Builds [`ImageTag`]s for one configuration.
pub struct TagRenderer<'a> {
    generator: &'a Generator<'a>,
    lookup: &'a SizeLookup,
    settings: &'a RenderSettings,
}

impl<'a> TagRenderer<'a> {
    pub fn new(
        generator: &'a Generator<'a>,
        lookup: &'a SizeLookup,
        settings: &'a RenderSettings,
    ) -> Self {
        Self {
            generator,
            lookup,
            settings,
        }
    }

    /// Resolve the tag for `image` at `size_slug`.
    ///
    /// `None` when the slug is unknown for the image's set, or when
    /// `create_on_load` is on and the thumbnail could not be generated.
    /// `title` overrides the default, which is the alt text.
    pub fn tag(
        &self,
        store: &dyn CatalogStore,
        image: &Image,
        size_slug: &str,
        retina: bool,
        title: Option<&str>,
    ) -> Option<ImageTag> {
        let Some(size) = self.lookup.get(image.size_set_id, size_slug) else {
            debug!(image = image.id, size = size_slug, "no such size, tag skipped");
            return None;
        };

        if self.settings.create_on_load {
            self.generator.ensure(store, image, size, false)?;
        }

        let (width, height) = if size.mode == GenerationMode::AutoSize {
            (None, None)
        } else {
            (size.width, size.height)
        };

        let image_url = if self.settings.placeholder {
            let (w, h) = placeholder_dimensions(size);
            placeholder_url(w, h)
        } else {
            thumbnail_url(&self.settings.public_url, image, size_slug, retina)
        };

        let alt = image.caption.clone();
        Some(ImageTag {
            image_url,
            width,
            height,
            size_name: size_slug.to_string(),
            attribution: image.attribution.clone(),
            title: title.map(str::to_string).or_else(|| alt.clone()),
            alt,
        })
    }

    /// Markup for the tag, or empty markup when it cannot be resolved.
    pub fn render(
        &self,
        store: &dyn CatalogStore,
        image: &Image,
        size_slug: &str,
        retina: bool,
    ) -> Markup {
        match self.tag(store, image, size_slug, retina, None) {
            Some(tag) => render_tag(&tag),
            None => html! {},
        }
    }
}
