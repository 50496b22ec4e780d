//! End-to-end generation on a temporary media root.
//!
//! Exercises the public library the way the CLI does: a JSON catalog, local
//! storage, and the `image`-crate codec on synthetic sources.

use image::{DynamicImage, Rgb, RgbImage};
use simple_crop::catalog::{GenerationMode, Size, SizeSet};
use simple_crop::crop::Crop;
use simple_crop::imaging::{ImageCodec, OutputFormat, Quality, RustCodec};
use simple_crop::process::{GenerationState, Generator, OutputSettings, RegenerationSummary};
use simple_crop::storage::{LocalStorage, Storage};
use simple_crop::store::{CatalogStore, JsonCatalog};
use simple_crop::tag::{RenderSettings, SizeLookup, TagRenderer};
use simple_crop::types::Image;
use std::fs;
use tempfile::TempDir;

const SOURCE: &str = "2024/05/harbor.jpg";

fn source_jpeg(width: u32, height: u32) -> Vec<u8> {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, ((x * y) % 253) as u8])
    });
    RustCodec::new()
        .encode(
            &DynamicImage::ImageRgb8(pixels),
            OutputFormat::Jpeg,
            Quality::default(),
        )
        .unwrap()
}

fn catalog() -> JsonCatalog {
    let mut catalog = JsonCatalog::new();
    catalog
        .add_size_set(SizeSet {
            id: 1,
            name: "Article".into(),
            slug: "article".into(),
        })
        .unwrap();
    let mut hero = Size::new(1, 1, "hero", Some(300), Some(200), GenerationMode::ManualCrop);
    hero.retina = true;
    let mut lazy = Size::new(4, 1, "lazy", Some(120), Some(120), GenerationMode::AutoSize);
    lazy.create_on_request = true;
    for size in [
        hero,
        Size::new(2, 1, "teaser", Some(150), Some(100), GenerationMode::ManualCrop),
        Size::new(3, 1, "square", Some(100), Some(100), GenerationMode::AutoCrop),
        lazy,
    ] {
        catalog.save_size(size).unwrap();
    }
    let mut image = Image::new(7, SOURCE, 1);
    image.caption = Some("Harbor at dawn".into());
    catalog.add_image(image);
    catalog
}

fn media_root(width: u32, height: u32) -> (TempDir, LocalStorage) {
    let tmp = TempDir::new().unwrap();
    let storage = LocalStorage::new(tmp.path());
    storage
        .write(SOURCE, &source_jpeg(width, height), "image/jpeg")
        .unwrap();
    (tmp, storage)
}

fn dimensions_of(storage: &LocalStorage, key: &str) -> (u32, u32) {
    let dims = RustCodec::new()
        .identify(&storage.read(key).unwrap())
        .unwrap();
    (dims.width, dims.height)
}

#[test]
fn image_save_generates_eager_sizes_only() {
    let (tmp, storage) = media_root(640, 480);
    let codec = RustCodec::new();
    let catalog = catalog();
    let generator = Generator::new(&storage, &codec, OutputSettings::default());
    let image = catalog.image(7).unwrap();

    let outcomes = generator.on_image_saved(&catalog, &image);

    assert!(outcomes.iter().any(|o| o.size_slug == "square" && o.state == GenerationState::Generated));
    assert_eq!(dimensions_of(&storage, "2024/05/harbor/square.jpg"), (100, 100));
    assert!(!tmp.path().join("2024/05/harbor/lazy.jpg").exists());
    // manual sizes wait for a crop or a regeneration
    assert!(!tmp.path().join("2024/05/harbor/hero.jpg").exists());
}

#[test]
fn lazy_generation_on_first_render() {
    let (tmp, storage) = media_root(640, 480);
    let codec = RustCodec::new();
    let catalog = catalog();
    let generator = Generator::new(&storage, &codec, OutputSettings::default());
    let lookup = SizeLookup::new(catalog.sizes.clone());
    let settings = RenderSettings::default();
    let renderer = TagRenderer::new(&generator, &lookup, &settings);
    let image = catalog.image(7).unwrap();

    let html = renderer.render(&catalog, &image, "lazy", false).into_string();

    assert!(html.contains("src=\"/media/2024/05/harbor/lazy.jpg\""));
    assert!(html.contains("alt=\"Harbor at dawn\""));
    assert!(!html.contains("width="));
    assert!(tmp.path().join("2024/05/harbor/lazy.jpg").is_file());
    assert_eq!(dimensions_of(&storage, "2024/05/harbor/lazy.jpg"), (120, 120));
}

#[test]
fn crop_cascades_to_same_ratio_sizes_and_persists() {
    let (tmp, storage) = media_root(1200, 900);
    let codec = RustCodec::new();
    let mut catalog = catalog();
    let generator = Generator::new(&storage, &codec, OutputSettings::default());

    let (_, outcomes) = generator
        .commit_crop(&mut catalog, Crop::new(7, 2, 60, 30, 900, 600))
        .unwrap();

    let slugs: Vec<&str> = outcomes.iter().map(|o| o.size_slug.as_str()).collect();
    assert_eq!(slugs, vec!["hero", "teaser"]);
    assert_eq!(dimensions_of(&storage, "2024/05/harbor/hero.jpg"), (300, 200));
    assert_eq!(dimensions_of(&storage, "2024/05/harbor/hero@2x.jpg"), (600, 400));
    assert_eq!(dimensions_of(&storage, "2024/05/harbor/teaser.jpg"), (150, 100));

    let catalog_path = tmp.path().join("catalog.json");
    catalog.save(&catalog_path).unwrap();
    let reloaded = JsonCatalog::load(&catalog_path).unwrap();
    assert_eq!(reloaded.crop(7, 2), Some(Crop::new(7, 2, 60, 30, 900, 600)));
}

#[test]
fn retina_skipped_for_small_crop() {
    let (tmp, storage) = media_root(1000, 1000);
    let codec = RustCodec::new();
    let mut catalog = catalog();
    let generator = Generator::new(&storage, &codec, OutputSettings::default());

    generator
        .commit_crop(&mut catalog, Crop::new(7, 1, 10, 10, 300, 200))
        .unwrap();

    assert_eq!(dimensions_of(&storage, "2024/05/harbor/hero.jpg"), (300, 200));
    assert!(!tmp.path().join("2024/05/harbor/hero@2x.jpg").exists());
}

#[test]
fn regeneration_is_idempotent() {
    let (_tmp, storage) = media_root(640, 480);
    let codec = RustCodec::new();
    let catalog = catalog();
    let generator = Generator::new(&storage, &codec, OutputSettings::default());
    let images = catalog.images();

    let first = generator.regenerate(&catalog, &images, &[], true);
    let bytes = storage.read("2024/05/harbor/square.jpg").unwrap();
    let second = generator.regenerate(&catalog, &images, &[], true);

    assert_eq!(
        RegenerationSummary::from_outcomes(&first),
        RegenerationSummary {
            generated: 4,
            skipped: 0,
            failed: 0
        }
    );
    let digests = |outcomes: &[simple_crop::process::SizeOutcome]| -> Vec<String> {
        outcomes
            .iter()
            .filter_map(|o| o.thumbnail.as_ref().map(|t| t.artifact.sha256.clone()))
            .collect()
    };
    assert_eq!(digests(&first), digests(&second));
    assert_eq!(storage.read("2024/05/harbor/square.jpg").unwrap(), bytes);
}

#[test]
fn derived_listing_follows_storage() {
    let (tmp, storage) = media_root(640, 480);
    let codec = RustCodec::new();
    let catalog = catalog();
    let generator = Generator::new(&storage, &codec, OutputSettings::default());
    let image = catalog.image(7).unwrap();
    let sizes = catalog.sizes_in_set(1);

    generator.on_image_saved(&catalog, &image);
    assert_eq!(
        generator.existing_artifacts(&image, &sizes),
        vec!["2024/05/harbor/square.jpg"]
    );

    fs::remove_file(tmp.path().join("2024/05/harbor/square.jpg")).unwrap();
    assert!(generator.existing_artifacts(&image, &sizes).is_empty());
}
