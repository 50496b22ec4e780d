use clap::{Parser, Subcommand};
use simple_crop::catalog::unique_ratios;
use simple_crop::crop::{Crop, default_crop, get_size_by_ratio};
use simple_crop::imaging::{ImageCodec, RustCodec};
use simple_crop::naming::{thumbnail_path, thumbnail_url};
use simple_crop::process::{Generator, RegenerationSummary, select_slugs};
use simple_crop::storage::storage_for;
use simple_crop::store::{CatalogStore, JsonCatalog, StoreError};
use simple_crop::tag::{SizeLookup, TagRenderer};
use simple_crop::types::Image;
use simple_crop::{config, output};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-crop")]
#[command(about = "Deterministic thumbnails from a catalog of sizes and crops")]
#[command(long_about = "\
Deterministic thumbnails from a catalog of sizes and crops

The catalog (catalog.json) holds size sets, sizes, images and crops. Every
thumbnail is derived from its source, the crop that applies and the size:

  media/2024/05/harbor.jpg              source
  media/2024/05/harbor/hero.jpg         size \"hero\"
  media/2024/05/harbor/hero@2x.jpg      retina companion

Generation modes:
  manual_crop  the stored crop (or the full source) scaled then cut from the top-left
  auto_crop    crop-to-fill, centered horizontally, biased to the upper third
  auto_size    scale-then-crop keeping the source ratio

Run 'simple-crop gen-config' to generate a documented simple-crop.toml.")]
#[command(version = env!("SIMPLE_CROP_VERSION"))]
struct Cli {
    /// Configuration file (stock defaults when absent)
    #[arg(long, default_value = "simple-crop.toml", global = true)]
    config: PathBuf,

    /// Catalog of size sets, sizes, images and crops
    #[arg(long, default_value = "catalog.json", global = true)]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a source and run the on-save generation for it
    SaveImage {
        image: u64,
        /// Require the source to cover every size of its set
        #[arg(long)]
        validate_size: bool,
    },
    /// Store a crop and regenerate every size of its ratio
    Crop {
        image: u64,
        size: String,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        w: u32,
        #[arg(long)]
        h: u32,
    },
    /// Print the <img> tag for a thumbnail
    Render {
        image: u64,
        size: String,
        #[arg(long)]
        retina: bool,
        /// Title attribute (defaults to the caption)
        #[arg(long)]
        title: Option<String>,
    },
    /// Print where a thumbnail is stored, or its public URL
    Path {
        image: u64,
        size: String,
        #[arg(long)]
        retina: bool,
        #[arg(long)]
        url: bool,
    },
    /// List one size per distinct aspect ratio of a set
    Ratios {
        set: String,
        /// List create-on-request sizes instead of eager ones
        #[arg(long)]
        on_request: bool,
    },
    /// Show the crop workflow step at a ratio rank for an image
    NextCrop { image: u64, rank: usize },
    /// Regenerate thumbnails in parallel
    Regenerate {
        /// Restrict to these image ids (repeatable)
        #[arg(long = "image")]
        images: Vec<u64>,
        /// Restrict to these size slugs (repeatable)
        #[arg(long = "size")]
        sizes: Vec<String>,
        /// Print a line per generated thumbnail, with digests
        #[arg(long)]
        print_data: bool,
        /// Include create-on-request sizes
        #[arg(long)]
        force: bool,
    },
    /// List the derived files of an image that exist in storage
    Derived { image: u64 },
    /// Print a stock simple-crop.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    init_tracing(&config.log_level);

    let mut catalog = JsonCatalog::load(&cli.catalog)?;
    let storage = storage_for(&config.storage.root, config.storage.timeout())?;
    let codec = RustCodec::new();
    let generator = Generator::new(storage.as_ref(), &codec, config.output_settings());

    match cli.command {
        Command::SaveImage {
            image,
            validate_size,
        } => {
            let image = find_image(&catalog, image)?;
            generator.validate_source(&catalog, &image, validate_size)?;
            let outcomes = generator.on_image_saved(&catalog, &image);
            output::print_outcomes(&outcomes, &[(image.id, image.path.clone())], false);
        }
        Command::Crop {
            image,
            size,
            x,
            y,
            w,
            h,
        } => {
            let image = find_image(&catalog, image)?;
            let size = catalog
                .size_by_slug(image.size_set_id, &size)
                .ok_or_else(|| format!("No size '{size}' in the image's size set"))?;
            let (crop, outcomes) =
                generator.commit_crop(&mut catalog, Crop::new(image.id, size.id, x, y, w, h))?;
            catalog.save(&cli.catalog)?;
            info!(image = crop.image_id, size = %size.slug, "crop stored");
            output::print_outcomes(&outcomes, &[(image.id, image.path.clone())], false);
        }
        Command::Render {
            image,
            size,
            retina,
            title,
        } => {
            let image = find_image(&catalog, image)?;
            let lookup = SizeLookup::new(catalog.sizes.clone());
            let settings = config.render_settings();
            let renderer = TagRenderer::new(&generator, &lookup, &settings);
            if let Some(tag) = renderer.tag(&catalog, &image, &size, retina, title.as_deref()) {
                println!("{}", simple_crop::tag::render_tag(&tag).into_string());
            }
        }
        Command::Path {
            image,
            size,
            retina,
            url,
        } => {
            let image = find_image(&catalog, image)?;
            if url {
                println!(
                    "{}",
                    thumbnail_url(&config.storage.public_url, &image, &size, retina)
                );
            } else {
                println!("{}", storage.locate(&thumbnail_path(&image, &size, retina)));
            }
        }
        Command::Ratios { set, on_request } => {
            let size_set = catalog
                .size_set_by_slug(&set)
                .ok_or_else(|| format!("No size set '{set}'"))?;
            let sizes = catalog.sizes_in_set(size_set.id);
            output::print_ratios(&unique_ratios(&sizes, !on_request));
        }
        Command::NextCrop { image, rank } => {
            let image = find_image(&catalog, image)?;
            let sizes = catalog.sizes_in_set(image.size_set_id);
            let Some(size) = get_size_by_ratio(&sizes, image.size_set_id, rank) else {
                println!("All crops complete");
                return Ok(());
            };
            let dimensions = codec.identify(&storage.read(&image.path)?)?;
            let existing = catalog.crop(image.id, size.id);
            let proposal = default_crop(
                size,
                existing.as_ref(),
                (dimensions.width, dimensions.height),
            );
            output::print_crop_step(size, &proposal);
        }
        Command::Regenerate {
            images,
            sizes,
            print_data,
            force,
        } => {
            let slugs = select_slugs(&catalog.sizes, &sizes)?;
            let selected: Vec<Image> = catalog
                .images()
                .into_iter()
                .filter(|i| images.is_empty() || images.contains(&i.id))
                .collect();
            init_thread_pool(&config.processing);
            let outcomes = generator.regenerate(&catalog, &selected, &slugs, force);
            let paths: Vec<(u64, String)> =
                selected.iter().map(|i| (i.id, i.path.clone())).collect();
            if print_data {
                output::print_outcomes(&outcomes, &paths, true);
            } else {
                let summary = RegenerationSummary::from_outcomes(&outcomes);
                println!("{}", output::format_summary(&summary));
            }
        }
        Command::Derived { image } => {
            let image = find_image(&catalog, image)?;
            let sizes = catalog.sizes_in_set(image.size_set_id);
            output::print_paths(&generator.existing_artifacts(&image, &sizes));
        }
        // printed before any catalog is loaded
        Command::GenConfig => {}
    }

    Ok(())
}

fn find_image(catalog: &JsonCatalog, id: u64) -> Result<Image, StoreError> {
    catalog
        .image(id)
        .ok_or(StoreError::Unknown { kind: "image", id })
}

/// Install the fmt subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can only lower it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
