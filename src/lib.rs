//! # exif-tree
//!
//! Sort JPEG images into category directories derived from their XMP subject
//! tags, renaming each file after its most specific category and a short
//! content hash.
//!
//! A file tagged `Animals|Birds|Owls` ends up as
//! `<target>/Animals/Owls_<hash8>.jpg`. Files without a usable subject, or
//! whose metadata cannot be read, are moved unrenamed into
//! `<target>/Uncategorized/`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use exif_tree::config::Config;
//! use exif_tree::metadata::open_source;
//! use exif_tree::pipeline::{collect_images, ensure_catch_all_dir, run_batch};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = Config::new("./photos");
//!     config.dry_run = true;
//!     config.validate()?;
//!     ensure_catch_all_dir(&config)?;
//!
//!     let images = collect_images(&config.target_dir)?;
//!     let mut source = open_source(config.backend)?;
//!     let summary = run_batch(&images, source.as_mut(), &config, |result| {
//!         println!("{}: {:?}", result.path.display(), result.outcome);
//!     });
//!     println!("{} categorized", summary.categorized);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Runtime configuration and setup validation
//! - [`metadata`] — Metadata records and sources (native XMP reader, exiftool)
//! - [`subject`] — Picks the most specific subject tag
//! - [`naming`] — Sanitized directory and file names
//! - [`hash`] — Short content identifiers
//! - [`pipeline`] — Eligibility, routing state machine and file moves

pub mod config;
pub mod hash;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod subject;
