//! # Folio Core
//!
//! Build-side logic for the portfolio media gallery.
//!
//! This crate turns the synced media tree into the aggregate manifest the site loads:
//! - Sidecar (`MANIFEST.txt`) parsing and formatting
//! - Preview/full asset selection per numbered folder
//! - Manifest building, poster extraction and atomic writes
//! - Media path canonicalisation shared with the client
//! - Sidecar CRUD with rebuild-on-edit
//!
//! **No API concerns**: HTTP servers and request handling belong in `api-rest`; fetching,
//! caching and tile resolution belong in `folio-client`.

pub mod builder;
pub mod classify;
pub mod config;
pub mod constants;
mod error;
pub mod media_path;
pub mod model;
pub mod posters;
pub mod sidecar;
pub mod sidecar_store;

pub use builder::ManifestBuilder;
pub use classify::{classify, MediaFile, ScanOptions, Selection};
pub use config::BuildConfig;
pub use error::{FolioError, FolioResult};
pub use media_path::{canonicalize_media_path, PathRules};
pub use model::{
    is_placeholder_title, placeholder_title, sort_items, ItemMeta, Manifest, ManifestSource,
    MediaItem, MetaSource,
};
pub use posters::{FfmpegPosterExtractor, PosterExtractor};
pub use sidecar::{format_sidecar, parse_sidecar, SidecarMetadata};
pub use sidecar_store::SidecarStore;

pub use folio_files::{FileEntry, FolderService};
pub use folio_types::{FolderKey, MediaKind, OwnerId};
