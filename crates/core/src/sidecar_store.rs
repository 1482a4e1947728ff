//! Filesystem-backed sidecar CRUD.
//!
//! Edits are only visible to clients once the aggregate manifest has been rebuilt, so every
//! successful write or delete runs a full build before returning. Edits are serialised so two
//! concurrent writers cannot interleave a write with the other's rebuild.

use crate::builder::{write_atomic, ManifestBuilder};
use crate::constants::SIDECAR_FILE_NAME;
use crate::model::Manifest;
use crate::{FolioError, FolioResult};
use folio_files::{FileEntry, FolderService};
use folio_types::FolderKey;
use std::path::PathBuf;
use std::sync::Mutex;

/// Reads and edits `MANIFEST.txt` sidecars, rebuilding the manifest after each edit.
#[derive(Debug)]
pub struct SidecarStore {
    builder: ManifestBuilder,
    folders: FolderService,
    edit_lock: Mutex<()>,
}

impl SidecarStore {
    /// Creates a store over the builder's media root.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::Files` if the media root is not a readable directory.
    pub fn new(builder: ManifestBuilder) -> FolioResult<Self> {
        let folders = builder.folders()?;
        Ok(Self {
            builder,
            folders,
            edit_lock: Mutex::new(()),
        })
    }

    pub fn builder(&self) -> &ManifestBuilder {
        &self.builder
    }

    pub fn folders(&self) -> &FolderService {
        &self.folders
    }

    /// Raw sidecar text. Absent sidecars (and unknown folders) read as an empty string.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::FileRead` if the sidecar exists but cannot be read.
    pub fn get(&self, key: &FolderKey) -> FolioResult<String> {
        match self.existing_path(key)? {
            Some(path) => std::fs::read_to_string(path).map_err(FolioError::FileRead),
            None => Ok(String::new()),
        }
    }

    /// Replaces the sidecar with `content` and rebuilds the manifest.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::FolderNotFound` for unknown folders, `FolioError::FileWrite` if the
    /// write fails, or `FolioError::RebuildAfterEdit` if the rebuild fails.
    pub fn put(&self, key: &FolderKey, content: &str) -> FolioResult<Manifest> {
        let _guard = self.edit_lock.lock().unwrap_or_else(|e| e.into_inner());

        if !self.folders.folder_exists(key) {
            return Err(FolioError::FolderNotFound(key.to_string()));
        }

        let path = match self.existing_path(key)? {
            Some(path) => path,
            None => self.folders.file_path(key, SIDECAR_FILE_NAME)?,
        };
        write_atomic(&path, content.as_bytes())?;
        tracing::info!(folder = %key, bytes = content.len(), "sidecar written");

        self.rebuild_after_edit()
    }

    /// Removes the sidecar if present and rebuilds the manifest. Deleting twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::FileRemove` if removal fails, or `FolioError::RebuildAfterEdit` if
    /// the rebuild fails.
    pub fn delete(&self, key: &FolderKey) -> FolioResult<Manifest> {
        let _guard = self.edit_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(path) = self.existing_path(key)? {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::info!(folder = %key, "sidecar deleted"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(FolioError::FileRemove(e)),
            }
        }

        self.rebuild_after_edit()
    }

    /// Rebuilds and writes the manifest without editing anything.
    pub fn rebuild(&self) -> FolioResult<Manifest> {
        let _guard = self.edit_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.builder.build_and_write()
    }

    /// Directory listing used by the client's heal step.
    pub fn list_files(&self, key: &FolderKey) -> FolioResult<Vec<FileEntry>> {
        Ok(self.folders.list_files(key)?)
    }

    fn rebuild_after_edit(&self) -> FolioResult<Manifest> {
        self.builder
            .build_and_write()
            .map_err(|e| FolioError::RebuildAfterEdit(Box::new(e)))
    }

    /// Path of the existing sidecar, matching the file name case-insensitively.
    fn existing_path(&self, key: &FolderKey) -> FolioResult<Option<PathBuf>> {
        if !self.folders.folder_exists(key) {
            return Ok(None);
        }
        let files = self.folders.list_files(key)?;
        match files
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(SIDECAR_FILE_NAME))
        {
            Some(entry) => Ok(Some(self.folders.file_path(key, &entry.name)?)),
            None => Ok(None),
        }
    }
}
