//! Start-up manifest loading.
//!
//! Fetches `manifest.json`, normalises legacy item shapes and asset URLs, overlays
//! sidecar-confirmed cache entries and hands a sorted collection to the gallery. Fetch and
//! parse failures degrade to an empty gallery plus a reported error.

use crate::cache::MetaCache;
use crate::config::{ClientConfig, MANIFEST_PATH};
use crate::diagnostics::DiagnosticsLog;
use crate::error::LoadError;
use crate::gallery::Gallery;
use crate::reconcile::{ReconcileTask, Reconciler};
use crate::transport::Transport;
use folio_core::classify::find_long_form_variant;
use folio_core::{placeholder_title, sort_items, MediaItem, PathRules};
use folio_types::{FolderKey, MediaKind};
use serde_json::{Map, Value};
use std::sync::Arc;

const COMPONENT: &str = "loader";

/// Loads the aggregate manifest into gallery items.
#[derive(Clone)]
pub struct ManifestLoader {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn MetaCache>,
    config: ClientConfig,
    diagnostics: Arc<DiagnosticsLog>,
}

impl ManifestLoader {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn MetaCache>,
        config: ClientConfig,
        diagnostics: Arc<DiagnosticsLog>,
    ) -> Self {
        Self {
            transport,
            cache,
            config,
            diagnostics,
        }
    }

    /// Fetches and prepares the manifest items.
    ///
    /// # Errors
    ///
    /// `LoadError::Transport` or `LoadError::Status` when the fetch fails,
    /// `LoadError::Malformed` for invalid JSON and `LoadError::MissingItems` when the payload
    /// has no `items` array.
    pub async fn load(&self) -> Result<Vec<MediaItem>, LoadError> {
        let res = self.transport.get(MANIFEST_PATH).await?;
        if !res.is_success() {
            return Err(LoadError::Status(res.status));
        }

        let payload: Value = serde_json::from_slice(&res.body).map_err(LoadError::Malformed)?;
        let raw_items = payload
            .get("items")
            .and_then(Value::as_array)
            .ok_or(LoadError::MissingItems)?;

        let rules = self.config.path_rules();
        let mut items = Vec::with_capacity(raw_items.len());
        for (index, raw) in raw_items.iter().enumerate() {
            match decode_item(raw, rules) {
                Some(mut item) => {
                    prefer_long_form(&mut item, rules);
                    items.push(item);
                }
                None => self
                    .diagnostics
                    .warn(COMPONENT, format!("skipping malformed manifest item #{index}")),
            }
        }

        self.overlay_cache(&mut items);
        sort_items(&mut items);

        self.diagnostics
            .info(COMPONENT, format!("loaded {} manifest items", items.len()));
        Ok(items)
    }

    /// Like [`load`](Self::load), but never fails: errors yield an empty collection and are
    /// returned alongside it so the caller can show them.
    pub async fn load_or_empty(&self) -> (Vec<MediaItem>, Option<LoadError>) {
        match self.load().await {
            Ok(items) => (items, None),
            Err(e) => {
                self.diagnostics
                    .error(COMPONENT, format!("manifest unavailable: {e}"));
                (Vec::new(), Some(e))
            }
        }
    }

    /// Loads into `gallery` and starts background reconciliation without waiting for it.
    pub async fn load_and_reconcile(
        &self,
        gallery: &Gallery,
        reconciler: &Reconciler,
        force_all: bool,
    ) -> (Option<LoadError>, ReconcileTask) {
        let (items, error) = self.load_or_empty().await;
        gallery.replace_all(items);
        let task = reconciler.start(gallery.clone(), force_all);
        (error, task)
    }

    /// Applies cached sidecar results. Negative and build-time entries never override the
    /// manifest.
    fn overlay_cache(&self, items: &mut [MediaItem]) {
        let blob = match self.cache.load(self.config.owner()) {
            Ok(blob) => blob,
            Err(e) => {
                self.diagnostics
                    .warn(COMPONENT, format!("metadata cache unavailable: {e}"));
                return;
            }
        };

        let mut applied = 0usize;
        for (folder, entry) in blob.file_entries() {
            if let Some(item) = items.iter_mut().find(|i| &i.folder == folder) {
                if item.apply_meta(&entry.to_meta()) {
                    applied += 1;
                }
            }
        }
        if applied > 0 {
            self.diagnostics
                .debug(COMPONENT, format!("applied {applied} cached sidecar entries"));
        }
    }
}

/// Decodes one item, filling in fields older manifests left out.
fn decode_item(raw: &Value, rules: &PathRules) -> Option<MediaItem> {
    let mut obj: Map<String, Value> = raw.as_object()?.clone();

    // Older builders wrote numeric folder keys.
    if let Some(Value::Number(n)) = obj.get("folder") {
        let text = n.to_string();
        obj.insert("folder".into(), Value::String(text));
    }
    let folder = obj.get("folder")?.as_str()?.to_string();
    let key = FolderKey::parse(&folder).ok()?;

    if !matches!(obj.get("orderKey"), Some(Value::String(_))) {
        obj.insert("orderKey".into(), Value::String(folder.clone()));
    }

    let preview_url = obj.get("previewUrl")?.as_str()?.to_string();
    if !obj.contains_key("fullUrl") {
        obj.insert("fullUrl".into(), Value::String(preview_url.clone()));
    }
    fill_type(&mut obj, "previewType", "previewUrl");
    fill_type(&mut obj, "fullType", "fullUrl");

    let has_title = obj
        .get("title")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty());
    if !has_title {
        obj.insert("title".into(), Value::String(placeholder_title(&key)));
    }

    let mut item: MediaItem = serde_json::from_value(Value::Object(obj)).ok()?;

    item.preview_url = rules.canonicalize(&item.preview_url);
    item.full_url = rules.canonicalize(&item.full_url);
    item.thumbnail_url = item
        .thumbnail_url
        .as_deref()
        .map(|u| rules.canonicalize(u))
        .filter(|u| !u.is_empty());

    if item.preview_url.is_empty() {
        return None;
    }
    if item.full_url.is_empty() {
        item.full_url = item.preview_url.clone();
        item.full_type = item.preview_type;
    }
    Some(item)
}

/// Sets a missing or unrecognised media type from the URL's extension.
fn fill_type(obj: &mut Map<String, Value>, type_field: &str, url_field: &str) {
    let known = matches!(
        obj.get(type_field).and_then(Value::as_str),
        Some("image" | "video")
    );
    if known {
        return;
    }
    let kind = obj
        .get(url_field)
        .and_then(Value::as_str)
        .map(MediaKind::from_file_name)
        .unwrap_or(MediaKind::Other);
    obj.insert(type_field.into(), Value::String(kind.as_str().to_string()));
}

/// Upgrades a reused-preview video to an extended-length variant listed in the folder.
fn prefer_long_form(item: &mut MediaItem, rules: &PathRules) {
    if item.full_type != MediaKind::Video || item.full_url != item.preview_url {
        return;
    }
    let Some(files) = item.files.as_ref() else {
        return;
    };
    let current = item.full_url.rsplit('/').next().unwrap_or_default();
    if let Some(variant) = find_long_form_variant(files, current) {
        item.full_url = rules.asset_url(&item.folder, &variant.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBlob, CacheEntry, MemoryMetaCache};
    use crate::transport::fake::{FakeTransport, GatedTransport};
    use chrono::Utc;
    use folio_core::{ItemMeta, MetaSource};
    use folio_types::OwnerId;
    use serde_json::json;

    fn setup(manifest: Option<Value>) -> (Arc<FakeTransport>, Arc<MemoryMetaCache>, ManifestLoader) {
        let transport = Arc::new(FakeTransport::default());
        if let Some(m) = manifest {
            transport.respond_json("/manifest.json", m);
        }
        let cache = Arc::new(MemoryMetaCache::new());
        let config = ClientConfig::new(
            "http://folio.test",
            OwnerId::new("studio").unwrap(),
            "/tmp".into(),
        );
        let loader = ManifestLoader::new(
            transport.clone(),
            cache.clone(),
            config,
            Arc::new(DiagnosticsLog::default()),
        );
        (transport, cache, loader)
    }

    fn owner() -> OwnerId {
        OwnerId::new("studio").unwrap()
    }

    #[tokio::test]
    async fn test_urls_canonicalised_and_sorted() {
        let (_t, _c, loader) = setup(Some(json!({
            "items": [
                {"folder": "10", "orderKey": "10", "title": "Ten",
                 "previewUrl": "hidrive://me/portfolio/10/p.jpg", "previewType": "image",
                 "fullUrl": "https://proxy.example/f?path=/10/p.jpg", "fullType": "image"},
                {"folder": "02", "title": "Two", "previewUrl": "02/a.mp4"}
            ],
            "generatedAt": "2026-01-01T00:00:00Z",
            "source": "hidrive"
        })));

        let items = loader.load().await.unwrap();
        assert_eq!(items[0].folder.as_str(), "02");
        assert_eq!(items[0].preview_url, "/media/02/a.mp4");
        assert_eq!(items[0].preview_type, MediaKind::Video);
        assert_eq!(items[0].full_url, "/media/02/a.mp4");
        assert_eq!(items[1].preview_url, "/media/10/p.jpg");
        assert_eq!(items[1].full_url, "/media/10/p.jpg");
    }

    #[tokio::test]
    async fn test_missing_items_is_structural() {
        let (_t, _c, loader) = setup(Some(json!({"generatedAt": "x"})));
        let err = loader.load().await.unwrap_err();
        assert!(err.is_structural());
    }

    #[tokio::test]
    async fn test_fetch_failures_degrade_to_empty() {
        let (transport, _c, loader) = setup(None);
        let (items, err) = loader.load_or_empty().await;
        assert!(items.is_empty());
        assert!(matches!(err, Some(LoadError::Status(404))));

        transport.respond("/manifest.json", 200, "{oops");
        let (items, err) = loader.load_or_empty().await;
        assert!(items.is_empty());
        assert!(matches!(err, Some(LoadError::Malformed(_))));
        assert!(!err.unwrap().is_structural());
    }

    #[tokio::test]
    async fn test_negative_cache_does_not_override_manifest() {
        let (_t, cache, loader) = setup(Some(json!({
            "items": [{
                "folder": "04", "orderKey": "04", "title": "Schön Magazine",
                "previewUrl": "/media/04/preview.png", "previewType": "image",
                "fullUrl": "/media/04/preview.png", "fullType": "image",
                "meta": {"title": "Schön Magazine", "source": "build"}
            }],
            "generatedAt": "2026-01-01T00:00:00Z"
        })));
        let mut blob = CacheBlob::default();
        blob.meta_by_folder
            .insert(FolderKey::parse("04").unwrap(), CacheEntry::absent(Utc::now()));
        cache.store(&owner(), &blob).unwrap();

        let items = loader.load().await.unwrap();
        assert_eq!(items[0].title, "Schön Magazine");
        assert_eq!(
            items[0].meta.as_ref().unwrap().source,
            Some(MetaSource::Build)
        );
    }

    #[tokio::test]
    async fn test_file_cache_entry_overrides_manifest() {
        let (_t, cache, loader) = setup(Some(json!({
            "items": [{
                "folder": "05", "title": "Project 05",
                "previewUrl": "/media/05/preview.png"
            }],
            "generatedAt": "2026-01-01T00:00:00Z"
        })));
        let mut blob = CacheBlob::default();
        blob.meta_by_folder.insert(
            FolderKey::parse("05").unwrap(),
            CacheEntry::found(
                &ItemMeta {
                    title: Some("Editorial".into()),
                    ..ItemMeta::default()
                },
                Utc::now(),
            ),
        );
        cache.store(&owner(), &blob).unwrap();

        let items = loader.load().await.unwrap();
        assert_eq!(items[0].title, "Editorial");
    }

    #[tokio::test]
    async fn test_long_form_variant_preferred() {
        let (_t, _c, loader) = setup(Some(json!({
            "items": [{
                "folder": "03", "title": "Reel",
                "previewUrl": "/media/03/reel.mp4", "previewType": "video",
                "fullUrl": "/media/03/reel.mp4", "fullType": "video",
                "files": [
                    {"name": "reel.mp4", "type": "video", "size": 4096},
                    {"name": "reel_long.mp4", "type": "video", "size": 90000}
                ]
            }],
            "generatedAt": "2026-01-01T00:00:00Z"
        })));

        let items = loader.load().await.unwrap();
        assert_eq!(items[0].full_url, "/media/03/reel_long.mp4");
        assert_eq!(items[0].preview_url, "/media/03/reel.mp4");
    }

    #[tokio::test]
    async fn test_malformed_items_skipped() {
        let (_t, _c, loader) = setup(Some(json!({
            "items": [
                {"folder": "not-a-key", "previewUrl": "/media/x/a.jpg"},
                {"title": "no folder"},
                {"folder": 7, "previewUrl": "/media/07/a.jpg"}
            ],
            "generatedAt": "2026-01-01T00:00:00Z"
        })));
        let items = loader.load().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].folder.as_str(), "7");
        assert_eq!(items[0].title, "Project 7");
    }

    #[tokio::test]
    async fn test_load_and_reconcile_returns_before_pass_finishes() {
        let transport = Arc::new(GatedTransport::new("/api/folders/03/sidecar"));
        transport.inner.respond_json(
            "/manifest.json",
            json!({"items": [{"folder": "03", "previewUrl": "/media/03/a.jpg"}]}),
        );
        transport.inner.respond_json(
            "/api/folders/03/sidecar",
            json!({"folder": "03", "content": "---\ntitle: \"Late\"\n---\n"}),
        );
        let cache = Arc::new(MemoryMetaCache::new());
        let config = ClientConfig::new("http://folio.test", owner(), "/tmp".into());
        let diagnostics = Arc::new(DiagnosticsLog::default());
        let loader = ManifestLoader::new(
            transport.clone(),
            cache.clone(),
            config.clone(),
            diagnostics.clone(),
        );
        let reconciler = Reconciler::new(
            transport.clone(),
            cache,
            owner(),
            config.reconcile(),
            diagnostics,
        );

        let gallery = Gallery::new();
        let (error, task) = loader.load_and_reconcile(&gallery, &reconciler, false).await;
        assert!(error.is_none());
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.snapshot()[0].title, "Project 03");

        transport.entered.notified().await;
        assert!(!task.is_finished());
        assert!(!task.progress().borrow().done);

        transport.release.notify_one();
        let report = task.join().await;
        assert!(report.done);
        assert_eq!(gallery.snapshot()[0].title, "Late");
    }
}
