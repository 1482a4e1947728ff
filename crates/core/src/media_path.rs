//! Media path canonicalisation.
//!
//! Manifests written over the years refer to the same asset in several shapes:
//!
//! | Input | Canonical |
//! |---|---|
//! | `/media/04/a.jpg` | `/media/04/a.jpg` |
//! | `/hidrive/04/a.jpg` (legacy prefix) | `/media/04/a.jpg` |
//! | `04/a.jpg` (bare relative) | `/media/04/a.jpg` |
//! | `hidrive://owner/portfolio/04/a.jpg` | `/media/04/a.jpg` |
//! | `https://proxy.example/api?path=/04/a.jpg` | `/media/04/a.jpg` |
//! | `https://cdn.example//media//04/a.jpg` | `/media/04/a.jpg` |
//!
//! The output always has exactly one leading slash, no repeated slashes and lives under the
//! canonical prefix, so canonicalising twice is the same as canonicalising once.

use crate::constants::{DEFAULT_MEDIA_PREFIX, LEGACY_MEDIA_PREFIXES, PATH_QUERY_PARAMS};
use folio_types::FolderKey;
use url::Url;

/// Rules for mapping arbitrary asset references onto canonical media paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRules {
    canonical_prefix: String,
    legacy_prefixes: Vec<String>,
    query_params: Vec<String>,
}

impl Default for PathRules {
    fn default() -> Self {
        Self::new(DEFAULT_MEDIA_PREFIX)
    }
}

impl PathRules {
    /// Creates rules for `prefix` with the standard legacy prefixes and query parameters.
    pub fn new(prefix: &str) -> Self {
        Self {
            canonical_prefix: normalize_prefix(prefix),
            legacy_prefixes: LEGACY_MEDIA_PREFIXES
                .iter()
                .map(|p| normalize_prefix(p))
                .collect(),
            query_params: PATH_QUERY_PARAMS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Adds another legacy prefix that should be remapped into the canonical prefix.
    pub fn with_legacy_prefix(mut self, prefix: &str) -> Self {
        let prefix = normalize_prefix(prefix);
        if !prefix.is_empty() && !self.legacy_prefixes.contains(&prefix) {
            self.legacy_prefixes.push(prefix);
        }
        self
    }

    pub fn canonical_prefix(&self) -> &str {
        &self.canonical_prefix
    }

    /// Canonical URL of a file inside a content folder.
    pub fn asset_url(&self, folder: &FolderKey, file_name: &str) -> String {
        self.canonicalize(&format!("{}/{}/{}", self.canonical_prefix, folder, file_name))
    }

    /// Canonical URL of a file in a non-numbered subdirectory of the media root.
    pub fn media_url(&self, relative: &str) -> String {
        self.canonicalize(&format!("{}/{}", self.canonical_prefix, relative))
    }

    /// Canonicalises any supported asset reference. See the module docs for the shapes.
    pub fn canonicalize(&self, input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let path = match extract_path(trimmed, &self.query_params) {
            Some(p) => p,
            None => trimmed.to_string(),
        };

        let path = collapse_slashes(path.trim_start_matches("./"));

        if has_prefix(&path, &self.canonical_prefix) {
            return path;
        }

        for legacy in &self.legacy_prefixes {
            if has_prefix(&path, legacy) {
                let rest = &path[legacy.len()..];
                return collapse_slashes(&format!("{}{}", self.canonical_prefix, rest));
            }
        }

        collapse_slashes(&format!("{}{}", self.canonical_prefix, path))
    }

    /// Folder key and file name of a canonical asset path, if it points into a content folder.
    pub fn split_asset(&self, url: &str) -> Option<(FolderKey, String)> {
        let canonical = self.canonicalize(url);
        let rest = canonical
            .strip_prefix(&self.canonical_prefix)?
            .trim_start_matches('/');
        let (folder, name) = rest.split_once('/')?;
        if name.is_empty() || name.contains('/') {
            return None;
        }
        let key = FolderKey::parse(folder).ok()?;
        Some((key, name.to_string()))
    }
}

/// Canonicalises `input` under `rules`. Free-function form of [`PathRules::canonicalize`].
pub fn canonicalize_media_path(input: &str, rules: &PathRules) -> String {
    rules.canonicalize(input)
}

/// Pulls the path out of an absolute URL, or returns `None` for plain paths.
fn extract_path(input: &str, query_params: &[String]) -> Option<String> {
    if !looks_like_url(input) {
        return None;
    }

    let url = Url::parse(input).ok()?;

    if matches!(url.scheme(), "http" | "https") {
        for wanted in query_params {
            if let Some((_, value)) = url.query_pairs().find(|(k, _)| k == wanted.as_str()) {
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                // The carried value may itself be a URL.
                return Some(extract_path(&value, query_params).unwrap_or(value));
            }
        }
    }

    // Custom schemes (`hidrive://owner/path`) and plain HTTP(S) both keep the path component.
    let decoded = urlencoding::decode_binary(url.path().as_bytes());
    Some(String::from_utf8_lossy(&decoded).into_owned())
}

fn looks_like_url(input: &str) -> bool {
    match input.find("://") {
        Some(idx) if idx > 0 => input[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Collapses repeated slashes and guarantees a single leading slash.
fn collapse_slashes(path: &str) -> String {
    let mut result = String::with_capacity(path.len() + 1);
    result.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if result.len() > 1 {
            result.push('/');
        }
        result.push_str(segment);
    }
    if path.ends_with('/') && result.len() > 1 {
        result.push('/');
    }
    result
}

fn normalize_prefix(prefix: &str) -> String {
    let collapsed = collapse_slashes(prefix);
    let trimmed = collapsed.trim_end_matches('/');
    trimmed.to_string()
}

/// Prefix match on a path-segment boundary (`/media` matches `/media/x`, not `/mediafoo`).
fn has_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
