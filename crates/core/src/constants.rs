//! Constants used throughout the folio core crate.
//!
//! File names, path prefixes and naming markers live here so the builder, the classifier and
//! the canonicaliser stay consistent with each other.

/// Per-folder sidecar carrying the user-editable title/description/tags.
pub const SIDECAR_FILE_NAME: &str = "MANIFEST.txt";

/// File name of the aggregate manifest inside the public directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Default directory served as the site root.
pub const DEFAULT_PUBLIC_DIR: &str = "public";

/// Default media root (numbered folders live directly below it).
pub const DEFAULT_MEDIA_ROOT: &str = "public/media";

/// Root-relative prefix every canonical media URL starts with.
pub const DEFAULT_MEDIA_PREFIX: &str = "/media";

/// Root-relative prefixes older manifests used for the same media tree.
pub const LEGACY_MEDIA_PREFIXES: &[&str] =
    &["/hidrive", "/portfolio", "/public/media", "/assets/media"];

/// Query parameters that proxy URLs use to carry the real media path.
pub const PATH_QUERY_PARAMS: &[&str] = &["path", "file", "src"];

/// Default digit width of content folder names (`01`, `02`, ...).
pub const DEFAULT_FOLDER_WIDTH: usize = 2;

/// Previews smaller than this are assumed to be broken uploads.
pub const DEFAULT_MIN_PREVIEW_BYTES: u64 = 1024;

/// Exact file stem of a deliberately prepared preview (`_preview.mp4`).
pub const PREVIEW_EXACT_STEM: &str = "_preview";

/// Substring marking a shortened clip prepared for the grid.
pub const SHORT_MARKER: &str = "short";

/// Substring marking a generic preview asset.
pub const PREVIEW_MARKER: &str = "preview";

/// Substrings marking a still image meant as a video poster.
pub const POSTER_MARKERS: &[&str] = &["poster", "thumb"];

/// Stem suffixes marking an extended-length video variant.
pub const LONG_FORM_SUFFIXES: &[&str] = &["_long", "-long"];

/// Stem substring marking an extended-length video variant.
pub const LONG_FORM_MARKER: &str = "longform";

/// Prefix of the title shown when a folder has no sidecar title.
pub const PLACEHOLDER_TITLE_PREFIX: &str = "Project";

/// Default binary used for poster extraction.
pub const DEFAULT_FFMPEG_BINARY: &str = "ffmpeg";

/// Seek offset (seconds) of the extracted poster frame.
pub const POSTER_SEEK_SECONDS: f32 = 1.0;
