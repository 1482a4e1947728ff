//! Build-time configuration.
//!
//! Configuration is resolved once at process startup (usually from environment variables) and
//! then passed into the builder and the sidecar store. Nothing in this crate reads the process
//! environment during request handling.

use crate::classify::ScanOptions;
use crate::constants::{
    DEFAULT_FOLDER_WIDTH, DEFAULT_MEDIA_PREFIX, DEFAULT_MEDIA_ROOT, DEFAULT_MIN_PREVIEW_BYTES,
    DEFAULT_PUBLIC_DIR, MANIFEST_FILE_NAME,
};
use crate::media_path::PathRules;
use crate::model::ManifestSource;
use crate::{FolioError, FolioResult};
use std::path::{Path, PathBuf};

/// Manifest build configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct BuildConfig {
    media_root: PathBuf,
    public_dir: PathBuf,
    media_prefix: String,
    source: ManifestSource,
    folder_width: Option<usize>,
    min_preview_bytes: u64,
    extract_posters: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from(DEFAULT_MEDIA_ROOT),
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
            media_prefix: DEFAULT_MEDIA_PREFIX.to_string(),
            source: ManifestSource::Local,
            folder_width: Some(DEFAULT_FOLDER_WIDTH),
            min_preview_bytes: DEFAULT_MIN_PREVIEW_BYTES,
            extract_posters: true,
        }
    }
}

impl BuildConfig {
    /// Create a new `BuildConfig` with default tunables.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::InvalidInput` if `media_prefix` is empty after trimming.
    pub fn new(media_root: PathBuf, public_dir: PathBuf, media_prefix: &str) -> FolioResult<Self> {
        if media_prefix.trim().trim_matches('/').is_empty() {
            return Err(FolioError::InvalidInput(
                "media_prefix cannot be empty".into(),
            ));
        }

        Ok(Self {
            media_root,
            public_dir,
            media_prefix: media_prefix.trim().to_string(),
            ..Self::default()
        })
    }

    pub fn with_source(mut self, source: ManifestSource) -> Self {
        self.source = source;
        self
    }

    /// `None` accepts numeric folder names of any width.
    pub fn with_folder_width(mut self, width: Option<usize>) -> Self {
        self.folder_width = width;
        self
    }

    pub fn with_min_preview_bytes(mut self, bytes: u64) -> Self {
        self.min_preview_bytes = bytes;
        self
    }

    pub fn with_extract_posters(mut self, enabled: bool) -> Self {
        self.extract_posters = enabled;
        self
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Location of the aggregate manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.public_dir.join(MANIFEST_FILE_NAME)
    }

    pub fn media_prefix(&self) -> &str {
        &self.media_prefix
    }

    pub fn source(&self) -> ManifestSource {
        self.source
    }

    pub fn folder_width(&self) -> Option<usize> {
        self.folder_width
    }

    pub fn extract_posters(&self) -> bool {
        self.extract_posters
    }

    pub fn path_rules(&self) -> PathRules {
        PathRules::new(&self.media_prefix)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            min_preview_bytes: self.min_preview_bytes,
        }
    }
}

/// Parse the folder width from an optional string value.
///
/// Missing or blank values give the default width; `0` or `any` disables the width check.
pub fn folder_width_from_env_value(value: Option<String>) -> FolioResult<Option<usize>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value.as_deref() {
        None => Ok(Some(DEFAULT_FOLDER_WIDTH)),
        Some(v) if v.eq_ignore_ascii_case("any") => Ok(None),
        Some(v) => match v.parse::<usize>() {
            Ok(0) => Ok(None),
            Ok(width) => Ok(Some(width)),
            Err(_) => Err(FolioError::InvalidInput(format!(
                "folder width must be a number or 'any', got {v:?}"
            ))),
        },
    }
}

/// Parse the manifest source from an optional string value. Defaults to `local`.
pub fn source_from_env_value(value: Option<String>) -> FolioResult<ManifestSource> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    value
        .map(|v| v.parse::<ManifestSource>())
        .transpose()
        .map(|parsed| parsed.unwrap_or_default())
        .map_err(FolioError::InvalidInput)
}

/// Parse a minimum byte count, falling back to `default` when unset.
pub fn bytes_from_env_value(value: Option<String>, default: u64) -> FolioResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| FolioError::InvalidInput(format!("expected a byte count, got {v:?}"))),
    }
}

/// Parse a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`), falling back to `default`.
pub fn bool_from_env_value(value: Option<String>, default: bool) -> FolioResult<bool> {
    let value = value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());
    match value.as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(FolioError::InvalidInput(format!(
            "expected a boolean flag, got {other:?}"
        ))),
    }
}
