//! # Simple Crop
//!
//! Deterministic thumbnail derivation. A catalog describes named sets of
//! target sizes; editors store manual crops per (image, size); every
//! thumbnail is a pure function of the source bytes, the crop and the size.
//!
//! # Architecture: Catalog → Resolver → Engine → Storage
//!
//! ```text
//! catalog.json ──▶ crop resolver ──▶ rescale engine ──▶ storage
//!  (sizes, crops)   (which rectangle)  (pixels)          (local dir or http)
//!                          ▲
//!               generation orchestrator
//!       (image saved · crop saved · tag rendered · regenerate)
//! ```
//!
//! Nothing about derived files is recorded. Their names are recomputed from
//! the source path and the size slug, so a lookup is a storage `exists`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Size sets, sizes, generation modes, rounded aspect ratios |
//! | [`types`] | Source image records and upload validation |
//! | [`crop`] | Manual crops, the same-ratio crop resolver, crop workflow defaults |
//! | [`imaging`] | Dimension math, crop/rescale/retina operations, the `image`-crate codec |
//! | [`naming`] | Deterministic keys, paths and URLs of derived files |
//! | [`storage`] | Byte storage behind a trait: local directory or http(s) base URL |
//! | [`store`] | Catalog access trait and the JSON-file catalog |
//! | [`process`] | Generation orchestrator: lifecycle hooks, lazy path, batch regeneration |
//! | [`tag`] | `<img>` tag rendering with Maud |
//! | [`config`] | `simple-crop.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Crops Are Shared by Ratio
//!
//! A crop is stored for one size but drives every size of the same set whose
//! ratio rounds to the same two decimals. The widest stored crop wins. An
//! editor crops once per ratio, and saving a crop regenerates every size it
//! now drives.
//!
//! ## Failures Never Reach Readers
//!
//! Eager generation on save and lazy generation while rendering log and
//! swallow their failures; a missing thumbnail renders as nothing. Batch
//! regeneration is the place where failures are counted and reported.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, Lanczos3
//! resampling and encoding. No system libraries are needed.

pub mod catalog;
pub mod config;
pub mod crop;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod storage;
pub mod store;
pub mod tag;
pub mod types;
