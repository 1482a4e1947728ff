//! Client side of sidecar editing.

use crate::cache::{CacheEntry, MetaCache};
use crate::error::{EditorError, TransportError};
use crate::transport::{sidecar_path, HttpResponse, Transport};
use api_shared::SidecarRes;
use chrono::Utc;
use folio_core::{format_sidecar, parse_sidecar, ItemMeta, MetaSource, SidecarMetadata};
use folio_types::{FolderKey, OwnerId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reads and writes folder sidecars through the server.
///
/// Edits are not retried. When a cache is attached, successful edits are written through so
/// the next reconciliation pass does not skip the folder on stale data.
pub struct SidecarEditor {
    transport: Arc<dyn Transport>,
    cache: Option<(Arc<dyn MetaCache>, OwnerId)>,
}

impl SidecarEditor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn MetaCache>, owner: OwnerId) -> Self {
        self.cache = Some((cache, owner));
        self
    }

    /// Current metadata; empty when the folder has no sidecar.
    pub async fn load(&self, folder: &FolderKey) -> Result<SidecarMetadata, EditorError> {
        let path = sidecar_path(folder);
        let res = self.transport.get(&path).await?;
        if res.status == 404 {
            return Ok(SidecarMetadata::default());
        }
        let res = accept(res)?;
        let body: SidecarRes =
            serde_json::from_slice(&res.body).map_err(|e| TransportError::Decode {
                url: path,
                reason: e.to_string(),
            })?;
        Ok(parse_sidecar(&body.content))
    }

    /// Formats `meta` as a sidecar and stores it.
    pub async fn save(&self, folder: &FolderKey, meta: &SidecarMetadata) -> Result<(), EditorError> {
        let res = self
            .transport
            .put(&sidecar_path(folder), format_sidecar(meta))
            .await?;
        accept(res)?;

        let entry = if meta.is_empty() {
            CacheEntry::absent(Utc::now())
        } else {
            CacheEntry::found(&ItemMeta::from_sidecar(meta.clone(), MetaSource::File), Utc::now())
        };
        self.write_through(folder, entry);
        tracing::info!("saved sidecar for folder {}", folder);
        Ok(())
    }

    /// Removes the sidecar. Deleting an absent sidecar succeeds.
    pub async fn delete(&self, folder: &FolderKey) -> Result<(), EditorError> {
        let res = self.transport.delete(&sidecar_path(folder)).await?;
        accept(res)?;
        self.write_through(folder, CacheEntry::absent(Utc::now()));
        tracing::info!("deleted sidecar for folder {}", folder);
        Ok(())
    }

    fn write_through(&self, folder: &FolderKey, entry: CacheEntry) {
        let Some((cache, owner)) = &self.cache else {
            return;
        };
        let mut entries = BTreeMap::new();
        entries.insert(folder.clone(), entry);
        if let Err(e) = cache.put_all(owner, &entries) {
            tracing::warn!("could not update cache for folder {}: {}", folder, e);
        }
    }
}

fn accept(res: HttpResponse) -> Result<HttpResponse, EditorError> {
    if res.is_success() {
        Ok(res)
    } else {
        Err(EditorError::Rejected {
            status: res.status,
            message: res.text(),
        })
    }
}
