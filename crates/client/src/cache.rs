//! Persisted per-owner metadata cache.
//!
//! One blob per owner maps folder keys to the metadata last read from that folder's sidecar,
//! including negative ("absent") results. The owner is a namespace, not a security boundary.

use crate::error::CacheError;
use chrono::{DateTime, Utc};
use folio_core::{ItemMeta, MetaSource};
use folio_types::{FolderKey, OwnerId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Cached sidecar result for one folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    pub source: MetaSource,
    pub ts: DateTime<Utc>,
}

impl CacheEntry {
    /// Entry for metadata read from a sidecar.
    pub fn found(meta: &ItemMeta, ts: DateTime<Utc>) -> Self {
        Self {
            title: meta.title.clone(),
            description: meta.description.clone(),
            tags: meta.tags.clone(),
            source: MetaSource::File,
            ts,
        }
    }

    /// Entry recording that the folder has no usable sidecar.
    pub fn absent(ts: DateTime<Utc>) -> Self {
        Self {
            title: None,
            description: None,
            tags: None,
            source: MetaSource::Absent,
            ts,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.source == MetaSource::Absent
    }

    /// Confirmed by reading the sidecar (as opposed to build-time or absent).
    pub fn is_from_file(&self) -> bool {
        self.source == MetaSource::File
    }

    /// True while the entry is younger than `ttl`. Entries from the future count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.ts).to_std() {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }

    pub fn to_meta(&self) -> ItemMeta {
        ItemMeta {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            source: Some(self.source),
        }
    }
}

/// Everything cached for one owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheBlob {
    #[serde(default)]
    pub meta_by_folder: BTreeMap<FolderKey, CacheEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

impl CacheBlob {
    /// Entries confirmed from the sidecar file; the only ones allowed to override a manifest.
    pub fn file_entries(&self) -> impl Iterator<Item = (&FolderKey, &CacheEntry)> {
        self.meta_by_folder.iter().filter(|(_, e)| e.is_from_file())
    }
}

/// Owner-scoped metadata store.
pub trait MetaCache: Send + Sync {
    /// Whole blob for `owner`; empty when nothing has been stored.
    fn load(&self, owner: &OwnerId) -> Result<CacheBlob, CacheError>;

    /// Replaces the blob for `owner`.
    fn store(&self, owner: &OwnerId, blob: &CacheBlob) -> Result<(), CacheError>;

    /// Removes everything stored for `owner`.
    fn clear(&self, owner: &OwnerId) -> Result<(), CacheError>;

    fn get(&self, owner: &OwnerId, folder: &FolderKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.load(owner)?.meta_by_folder.remove(folder))
    }

    /// Read-modify-write of `owner`'s blob. Implementations hold their lock across the whole
    /// update so concurrent writers never drop each other's entries.
    fn update(
        &self,
        owner: &OwnerId,
        apply: &mut dyn FnMut(&mut CacheBlob),
    ) -> Result<(), CacheError>;

    /// Upserts `entries`, leaving other folders untouched.
    fn put_all(
        &self,
        owner: &OwnerId,
        entries: &BTreeMap<FolderKey, CacheEntry>,
    ) -> Result<(), CacheError> {
        self.update(owner, &mut |blob| {
            blob.meta_by_folder
                .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        })
    }

    /// Upserts the entries a reconciliation pass produced and stamps `last_run`.
    fn record_run(
        &self,
        owner: &OwnerId,
        entries: &BTreeMap<FolderKey, CacheEntry>,
        at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.update(owner, &mut |blob| {
            blob.meta_by_folder
                .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            blob.last_run = Some(at);
        })
    }
}

/// One JSON file per owner inside a cache directory.
#[derive(Debug, Clone)]
pub struct JsonFileMetaCache {
    dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileMetaCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `owner`'s blob: the hex-encoded owner id, so distinct owners never share
    /// a file.
    pub fn path_for(&self, owner: &OwnerId) -> PathBuf {
        self.dir
            .join(format!("{}.json", hex::encode(owner.as_str().as_bytes())))
    }

    fn write_blob(&self, owner: &OwnerId, blob: &CacheBlob) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(CacheError::Write)?;
        let path = self.path_for(owner);
        let json = serde_json::to_vec_pretty(blob).map_err(CacheError::Encode)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(CacheError::Write)?;
        std::fs::rename(&tmp, &path).map_err(CacheError::Write)
    }
}

impl MetaCache for JsonFileMetaCache {
    fn load(&self, owner: &OwnerId) -> Result<CacheBlob, CacheError> {
        let path = self.path_for(owner);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheBlob::default()),
            Err(e) => return Err(CacheError::Read(e)),
        };

        match serde_json::from_slice(&bytes) {
            Ok(blob) => Ok(blob),
            Err(e) => {
                // A corrupt cache is only a lost optimisation.
                tracing::warn!("discarding unreadable cache {}: {}", path.display(), e);
                Ok(CacheBlob::default())
            }
        }
    }

    fn store(&self, owner: &OwnerId, blob: &CacheBlob) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_blob(owner, blob)
    }

    fn update(
        &self,
        owner: &OwnerId,
        apply: &mut dyn FnMut(&mut CacheBlob),
    ) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut blob = self.load(owner)?;
        apply(&mut blob);
        self.write_blob(owner, &blob)
    }

    fn clear(&self, owner: &OwnerId) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(self.path_for(owner)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Write(e)),
        }
    }
}

/// Process-local cache, for tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryMetaCache {
    blobs: Mutex<HashMap<OwnerId, CacheBlob>>,
}

impl MemoryMetaCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetaCache for MemoryMetaCache {
    fn load(&self, owner: &OwnerId) -> Result<CacheBlob, CacheError> {
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(owner).cloned().unwrap_or_default())
    }

    fn store(&self, owner: &OwnerId, blob: &CacheBlob) -> Result<(), CacheError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(owner.clone(), blob.clone());
        Ok(())
    }

    fn update(
        &self,
        owner: &OwnerId,
        apply: &mut dyn FnMut(&mut CacheBlob),
    ) -> Result<(), CacheError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        apply(blobs.entry(owner.clone()).or_default());
        Ok(())
    }

    fn clear(&self, owner: &OwnerId) -> Result<(), CacheError> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.remove(owner);
        Ok(())
    }
}
