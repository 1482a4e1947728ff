//! Aggregate manifest builder.
//!
//! Walks every numbered content folder under the media root, selects preview and full assets,
//! reads the sidecar, optionally produces a poster for video previews, and writes a single
//! `manifest.json`. The write is a wholesale replacement.

use crate::classify::{classify, MediaFile};
use crate::config::BuildConfig;
use crate::constants::SIDECAR_FILE_NAME;
use crate::media_path::PathRules;
use crate::model::{placeholder_title, ItemMeta, Manifest, MediaItem, MetaSource};
use crate::posters::{FfmpegPosterExtractor, PosterExtractor};
use crate::sidecar::parse_sidecar;
use crate::{FolioError, FolioResult};
use chrono::Utc;
use folio_files::{FileEntry, FolderService, THUMBS_FOLDER_NAME};
use folio_types::{FolderKey, MediaKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Builds manifests from the media tree described by a [`BuildConfig`].
#[derive(Clone)]
pub struct ManifestBuilder {
    config: BuildConfig,
    rules: PathRules,
    extractor: Option<Arc<dyn PosterExtractor>>,
}

impl std::fmt::Debug for ManifestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestBuilder")
            .field("config", &self.config)
            .field("posters", &self.extractor.is_some())
            .finish()
    }
}

impl ManifestBuilder {
    /// Creates a builder. Poster extraction uses `ffmpeg` when the config enables it.
    pub fn new(config: BuildConfig) -> Self {
        let extractor: Option<Arc<dyn PosterExtractor>> = if config.extract_posters() {
            Some(Arc::new(FfmpegPosterExtractor::new()))
        } else {
            None
        };
        let rules = config.path_rules();

        Self {
            config,
            rules,
            extractor,
        }
    }

    /// Replaces the poster extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn PosterExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Disables poster extraction. Poster-marked images already in a folder are still used.
    pub fn without_extractor(mut self) -> Self {
        self.extractor = None;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn path_rules(&self) -> &PathRules {
        &self.rules
    }

    /// Folder access for the configured media root.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::Files` if the media root is missing or not a directory.
    pub fn folders(&self) -> FolioResult<FolderService> {
        Ok(FolderService::new(self.config.media_root())?)
    }

    /// Builds the manifest in memory.
    ///
    /// Folders without a usable preview, or that fail to read, are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the media root itself cannot be read.
    pub fn build(&self) -> FolioResult<Manifest> {
        let folders = self.folders()?;
        let keys = folders.list_folders(self.config.folder_width())?;

        let mut items = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.build_item(&folders, key) {
                Ok(item) => {
                    tracing::debug!(
                        folder = %key,
                        preview = %item.preview_url,
                        full = %item.full_url,
                        "built manifest item"
                    );
                    items.push(item);
                }
                Err(e) => {
                    tracing::warn!(folder = %key, "skipping folder: {}", e);
                }
            }
        }

        tracing::info!(
            "built manifest with {} of {} folders from {}",
            items.len(),
            keys.len(),
            folders.root_directory().display()
        );

        Ok(Manifest {
            items,
            generated_at: Utc::now(),
            source: self.config.source(),
        })
    }

    /// Builds the manifest item for a single folder.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::NoPreview` if no file qualifies as a preview, or
    /// `FolioError::Files` if the folder cannot be listed.
    pub fn build_item(&self, folders: &FolderService, key: &FolderKey) -> FolioResult<MediaItem> {
        let files = folders.list_files(key)?;
        let options = self.config.scan_options();

        let selection =
            classify(key, &files, &options).ok_or_else(|| FolioError::NoPreview(key.to_string()))?;

        let meta = self.read_meta(folders, key, &files);
        let title = meta
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| placeholder_title(key));

        let preview = selection.preview;
        let full = selection.full;

        let thumbnail_url = if preview.kind() == MediaKind::Video {
            match selection.poster {
                Some(poster) => Some(self.rules.asset_url(key, &poster.name)),
                None => self.extract_poster(folders, key, preview),
            }
        } else {
            None
        };

        Ok(MediaItem {
            folder: key.clone(),
            order_key: key.clone(),
            title,
            preview_url: self.rules.asset_url(key, &preview.name),
            preview_type: preview.kind(),
            full_url: self.rules.asset_url(key, &full.name),
            full_type: full.kind(),
            thumbnail_url,
            meta: Some(meta),
            files: Some(files.clone()),
        })
    }

    /// Writes `manifest` to the configured path, replacing any previous file atomically.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::Serialization`, `FolioError::DirCreation` or
    /// `FolioError::FileWrite` on failure.
    pub fn write(&self, manifest: &Manifest) -> FolioResult<PathBuf> {
        let path = self.config.manifest_path();
        let json = serde_json::to_vec_pretty(manifest).map_err(FolioError::Serialization)?;
        write_atomic(&path, &json)?;
        tracing::info!("wrote {} items to {}", manifest.items.len(), path.display());
        Ok(path)
    }

    /// Builds and writes in one step.
    pub fn build_and_write(&self) -> FolioResult<Manifest> {
        let manifest = self.build()?;
        self.write(&manifest)?;
        Ok(manifest)
    }

    fn read_meta(&self, folders: &FolderService, key: &FolderKey, files: &[FileEntry]) -> ItemMeta {
        let Some(entry) = files
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(SIDECAR_FILE_NAME))
        else {
            return ItemMeta::absent();
        };

        let content = folders
            .file_path(key, &entry.name)
            .map_err(FolioError::from)
            .and_then(|path| std::fs::read_to_string(path).map_err(FolioError::FileRead));

        match content {
            Ok(content) => {
                let sidecar = parse_sidecar(&content);
                if sidecar.is_empty() {
                    ItemMeta::absent()
                } else {
                    ItemMeta::from_sidecar(sidecar, MetaSource::Build)
                }
            }
            Err(e) => {
                tracing::warn!(folder = %key, "unreadable sidecar, treating as absent: {}", e);
                ItemMeta::absent()
            }
        }
    }

    /// Cached poster for a video preview, extracting it when missing.
    fn extract_poster(
        &self,
        folders: &FolderService,
        key: &FolderKey,
        video: &FileEntry,
    ) -> Option<String> {
        let extractor = self.extractor.as_ref()?;

        let fingerprint = folders.fingerprint(key, video);
        let file_name = format!("{key}-{fingerprint}.jpg");
        let output = folders.thumbs_dir().join(&file_name);
        let url = self
            .rules
            .media_url(&format!("{THUMBS_FOLDER_NAME}/{file_name}"));

        if output.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            return Some(url);
        }

        let source = match folders.file_path(key, &video.name) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(folder = %key, "cannot locate video for poster: {}", e);
                return None;
            }
        };

        match extractor.extract(&source, &output) {
            Ok(()) => {
                tracing::debug!(folder = %key, poster = %file_name, "extracted poster");
                Some(url)
            }
            Err(e) => {
                tracing::warn!(folder = %key, "poster extraction failed: {}", e);
                None
            }
        }
    }
}

/// Writes `bytes` next to `path` and renames over it, creating the parent directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> FolioResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(FolioError::DirCreation)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| FolioError::InvalidInput(format!("not a file path: {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&tmp_path, bytes).map_err(FolioError::FileWrite)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(FolioError::FileWrite(e));
    }
    Ok(())
}
