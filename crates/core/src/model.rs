//! Aggregate manifest data model.
//!
//! The manifest is the single JSON document the site loads at start-up. Field names are
//! camelCase on the wire; unknown fields are ignored on read so older clients keep working
//! when the builder adds fields.

use crate::constants::PLACEHOLDER_TITLE_PREFIX;
use crate::sidecar::SidecarMetadata;
use chrono::{DateTime, Utc};
use folio_files::FileEntry;
use folio_types::{FolderKey, MediaKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a piece of item metadata came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaSource {
    /// Read live from the sidecar file (client reconciliation).
    File,
    /// No sidecar exists, or it carried nothing.
    Absent,
    /// Read from the sidecar at manifest build time.
    Build,
}

/// Title/description/tags attached to a manifest item, with provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MetaSource>,
}

impl ItemMeta {
    pub fn from_sidecar(sidecar: SidecarMetadata, source: MetaSource) -> Self {
        Self {
            title: sidecar.title,
            description: sidecar.description,
            tags: sidecar.tags.filter(|t| !t.is_empty()),
            source: Some(source),
        }
    }

    pub fn absent() -> Self {
        Self {
            source: Some(MetaSource::Absent),
            ..Self::default()
        }
    }

    /// True when no content field is populated (provenance is ignored).
    pub fn has_content(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self
                .description
                .as_deref()
                .is_some_and(|d| !d.trim().is_empty())
            || self.tags.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// Content fields only, for change detection.
    pub fn same_content(&self, other: &ItemMeta) -> bool {
        self.title == other.title && self.description == other.description && self.tags == other.tags
    }

    /// Overlays `newer` onto `self`: non-empty newer values win, empty ones never erase.
    pub fn merge_from(&mut self, newer: &ItemMeta) {
        if let Some(title) = newer.title.as_ref().filter(|t| !t.trim().is_empty()) {
            self.title = Some(title.clone());
        }
        if let Some(description) = newer.description.as_ref().filter(|d| !d.trim().is_empty()) {
            self.description = Some(description.clone());
        }
        if let Some(tags) = newer.tags.as_ref().filter(|t| !t.is_empty()) {
            self.tags = Some(tags.clone());
        }
        if newer.has_content() {
            self.source = newer.source.or(self.source);
        } else if self.source.is_none() {
            self.source = newer.source;
        }
    }
}

/// One content folder as exposed to the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub folder: FolderKey,
    pub order_key: FolderKey,
    pub title: String,
    pub preview_url: String,
    pub preview_type: MediaKind,
    pub full_url: String,
    pub full_type: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ItemMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
}

impl MediaItem {
    /// True when the displayed title is missing or just the folder-derived default.
    pub fn has_placeholder_title(&self) -> bool {
        is_placeholder_title(&self.folder, &self.title)
    }

    /// Applies metadata to the item, updating the display title when one is provided.
    ///
    /// Returns `true` if anything visible changed.
    pub fn apply_meta(&mut self, newer: &ItemMeta) -> bool {
        let before_title = self.title.clone();
        let before_meta = self.meta.clone();

        let meta = self.meta.get_or_insert_with(ItemMeta::default);
        meta.merge_from(newer);

        if let Some(title) = meta.title.as_ref().filter(|t| !t.trim().is_empty()) {
            self.title = title.clone();
        }

        self.title != before_title || self.meta != before_meta
    }
}

/// Title shown for a folder without a sidecar title.
pub fn placeholder_title(folder: &FolderKey) -> String {
    format!("{} {}", PLACEHOLDER_TITLE_PREFIX, folder)
}

pub fn is_placeholder_title(folder: &FolderKey, title: &str) -> bool {
    let title = title.trim();
    title.is_empty() || title == folder.as_str() || title == placeholder_title(folder)
}

/// Sorts items ascending by numeric order key.
pub fn sort_items(items: &mut [MediaItem]) {
    items.sort_by(|a, b| a.order_key.cmp(&b.order_key));
}

/// Which storage the manifest was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ManifestSource {
    #[default]
    Local,
    Hidrive,
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::Local => f.write_str("local"),
            ManifestSource::Hidrive => f.write_str("hidrive"),
        }
    }
}

impl FromStr for ManifestSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ManifestSource::Local),
            "hidrive" => Ok(ManifestSource::Hidrive),
            other => Err(format!("unknown manifest source: {other}")),
        }
    }
}

/// The aggregate manifest document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub items: Vec<MediaItem>,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub source: ManifestSource,
}
