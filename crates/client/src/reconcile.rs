//! Background metadata reconciliation.
//!
//! After the first render, every folder's sidecar is re-read (subject to the cache policy)
//! with a small fixed number of concurrent fetches, lowest folder key first. Results are
//! merged into the live gallery one folder at a time, and the entries the pass produced are
//! merged into the metadata cache when it completes. A failing folder is counted and never
//! stops the pass.

use crate::cache::{CacheEntry, MetaCache};
use crate::config::ReconcileOptions;
use crate::diagnostics::DiagnosticsLog;
use crate::error::TransportError;
use crate::gallery::Gallery;
use crate::transport::{sidecar_path, Transport};
use api_shared::SidecarRes;
use chrono::{DateTime, Utc};
use folio_core::{parse_sidecar, ItemMeta, MediaItem, MetaSource};
use folio_types::{FolderKey, OwnerId};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const COMPONENT: &str = "reconcile";

/// Running counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileProgress {
    pub total: usize,
    pub processed: usize,
    pub found: usize,
    pub missing: usize,
    pub errors: usize,
    /// Folders whose displayed item changed.
    pub patched: usize,
    pub done: bool,
}

/// Final counters of a completed pass.
pub type ReconcileReport = ReconcileProgress;

/// What to do with one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Fetch,
    /// Fresh negative entry; counted as missing.
    SkipMissing,
    /// Fresh sidecar-confirmed entry; counted as found.
    SkipFound,
}

/// Cache policy for one folder.
///
/// Forced passes always fetch. A fresh negative entry suppresses the fetch even for a
/// placeholder-titled item, otherwise folders without a sidecar would be refetched on every
/// pass. A placeholder title then forces a fetch, and a fresh file-sourced entry skips it.
pub fn decide(
    item: &MediaItem,
    entry: Option<&CacheEntry>,
    force_all: bool,
    now: DateTime<Utc>,
    options: &ReconcileOptions,
) -> Decision {
    if force_all {
        return Decision::Fetch;
    }
    if let Some(entry) = entry {
        if entry.is_negative() && entry.is_fresh(now, options.negative_ttl) {
            return Decision::SkipMissing;
        }
    }
    if item.has_placeholder_title() {
        return Decision::Fetch;
    }
    match entry {
        Some(entry) if entry.is_from_file() && entry.is_fresh(now, options.positive_ttl) => {
            Decision::SkipFound
        }
        _ => Decision::Fetch,
    }
}

enum Outcome {
    SkippedMissing,
    SkippedFound,
    Found(ItemMeta),
    Absent,
    Failed(String),
}

/// Runs reconciliation passes over a [`Gallery`].
#[derive(Clone)]
pub struct Reconciler {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn MetaCache>,
    owner: OwnerId,
    options: ReconcileOptions,
    diagnostics: Arc<DiagnosticsLog>,
}

impl Reconciler {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn MetaCache>,
        owner: OwnerId,
        options: ReconcileOptions,
        diagnostics: Arc<DiagnosticsLog>,
    ) -> Self {
        Self {
            transport,
            cache,
            owner,
            options,
            diagnostics,
        }
    }

    /// Starts a pass in the background. Must be called from within a tokio runtime.
    pub fn start(&self, gallery: Gallery, force_all: bool) -> ReconcileTask {
        let (tx, rx) = watch::channel(ReconcileProgress::default());
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run(&gallery, force_all, &tx).await });
        ReconcileTask {
            progress: rx,
            handle,
        }
    }

    /// Runs a pass to completion, publishing counters on `progress`.
    pub async fn run(
        &self,
        gallery: &Gallery,
        force_all: bool,
        progress: &watch::Sender<ReconcileProgress>,
    ) -> ReconcileReport {
        let mut items = gallery.snapshot();
        items.sort_by(|a, b| a.folder.cmp(&b.folder));

        let blob = match self.cache.load(&self.owner) {
            Ok(blob) => blob,
            Err(e) => {
                self.diagnostics
                    .warn(COMPONENT, format!("metadata cache unavailable: {e}"));
                Default::default()
            }
        };
        // Only entries this pass produces are written back; edits landing mid-pass survive.
        let mut updates: BTreeMap<FolderKey, CacheEntry> = BTreeMap::new();

        let mut counters = ReconcileProgress {
            total: items.len(),
            ..ReconcileProgress::default()
        };
        progress.send_replace(counters);

        let now = Utc::now();
        let planned: Vec<(FolderKey, Decision)> = items
            .iter()
            .map(|item| {
                let entry = blob.meta_by_folder.get(&item.folder);
                let decision = decide(item, entry, force_all, now, &self.options);
                (item.folder.clone(), decision)
            })
            .collect();

        let jobs: Vec<_> = planned
            .into_iter()
            .map(|(folder, decision)| async move {
                let outcome = match decision {
                    Decision::SkipMissing => Outcome::SkippedMissing,
                    Decision::SkipFound => Outcome::SkippedFound,
                    Decision::Fetch => self.fetch(&folder).await,
                };
                (folder, outcome)
            })
            .collect();

        let mut results = stream::iter(jobs).buffer_unordered(self.options.concurrency.max(1));
        while let Some((folder, outcome)) = results.next().await {
            counters.processed += 1;
            match outcome {
                Outcome::SkippedMissing => {
                    counters.missing += 1;
                    self.diagnostics
                        .debug(COMPONENT, format!("{folder}: cached absent, skipped"));
                }
                Outcome::SkippedFound => {
                    counters.found += 1;
                    self.diagnostics
                        .debug(COMPONENT, format!("{folder}: cached, skipped"));
                }
                Outcome::Absent => {
                    counters.missing += 1;
                    updates.insert(folder.clone(), CacheEntry::absent(Utc::now()));
                    self.diagnostics
                        .debug(COMPONENT, format!("{folder}: no sidecar metadata"));
                }
                Outcome::Found(meta) => {
                    counters.found += 1;
                    if gallery.merge_meta(&folder, &meta) {
                        counters.patched += 1;
                        self.diagnostics
                            .info(COMPONENT, format!("{folder}: metadata updated"));
                    }
                    updates.insert(folder.clone(), CacheEntry::found(&meta, Utc::now()));
                }
                Outcome::Failed(reason) => {
                    counters.errors += 1;
                    self.diagnostics
                        .warn(COMPONENT, format!("{folder}: sidecar fetch failed: {reason}"));
                }
            }
            progress.send_replace(counters);
        }
        drop(results);

        if let Err(e) = self.cache.record_run(&self.owner, &updates, Utc::now()) {
            self.diagnostics
                .warn(COMPONENT, format!("failed to persist metadata cache: {e}"));
        }

        counters.done = true;
        progress.send_replace(counters);
        self.diagnostics.info(
            COMPONENT,
            format!(
                "pass complete: {} processed, {} found, {} missing, {} errors",
                counters.processed, counters.found, counters.missing, counters.errors
            ),
        );
        counters
    }

    async fn fetch(&self, folder: &FolderKey) -> Outcome {
        match self.fetch_sidecar(folder).await {
            Ok(Some(content)) => {
                let sidecar = parse_sidecar(&content);
                if sidecar.is_empty() {
                    Outcome::Absent
                } else {
                    Outcome::Found(ItemMeta::from_sidecar(sidecar, MetaSource::File))
                }
            }
            Ok(None) => Outcome::Absent,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    /// Sidecar text, `None` when the server reports it absent.
    async fn fetch_sidecar(&self, folder: &FolderKey) -> Result<Option<String>, TransportError> {
        let path = sidecar_path(folder);
        let res = self.transport.get(&path).await?;
        match res.status {
            404 => Ok(None),
            _ if res.is_success() => {
                let body: SidecarRes =
                    serde_json::from_slice(&res.body).map_err(|e| TransportError::Decode {
                        url: path.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(body.content).filter(|c| !c.trim().is_empty()))
            }
            status => Err(TransportError::Status { url: path, status }),
        }
    }
}

/// Handle to a running pass.
pub struct ReconcileTask {
    progress: watch::Receiver<ReconcileProgress>,
    handle: JoinHandle<ReconcileReport>,
}

impl ReconcileTask {
    /// Live counters, updated after every folder.
    pub fn progress(&self) -> watch::Receiver<ReconcileProgress> {
        self.progress.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the pass to finish. If the task died, the last published counters are
    /// returned instead.
    pub async fn join(self) -> ReconcileReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("reconciliation task failed: {}", e);
                *self.progress.borrow()
            }
        }
    }

    /// Stops the pass. Folders already merged stay merged; the cache is not written.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBlob, MemoryMetaCache};
    use crate::editor::SidecarEditor;
    use crate::transport::fake::{FakeTransport, GatedTransport};
    use crate::transport::HttpResponse;
    use async_trait::async_trait;
    use folio_core::{placeholder_title, SidecarMetadata};
    use folio_types::MediaKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Holds sidecar fetches open for a while and records the peak number in flight.
    #[derive(Default)]
    struct SlowTransport {
        inner: FakeTransport,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Transport for SlowTransport {
        async fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.inner.get(path).await
        }

        async fn put(&self, path: &str, body: String) -> Result<HttpResponse, TransportError> {
            self.inner.put(path, body).await
        }

        async fn delete(&self, path: &str) -> Result<HttpResponse, TransportError> {
            self.inner.delete(path).await
        }

        async fn probe(&self, url: &str) -> bool {
            self.inner.probe(url).await
        }
    }

    fn key(s: &str) -> FolderKey {
        FolderKey::parse(s).unwrap()
    }

    fn owner() -> OwnerId {
        OwnerId::new("studio").unwrap()
    }

    fn item(folder: &str, title: Option<&str>) -> MediaItem {
        let k = key(folder);
        MediaItem {
            folder: k.clone(),
            order_key: k.clone(),
            title: title.map(str::to_string).unwrap_or_else(|| placeholder_title(&k)),
            preview_url: format!("/media/{folder}/preview.png"),
            preview_type: MediaKind::Image,
            full_url: format!("/media/{folder}/preview.png"),
            full_type: MediaKind::Image,
            thumbnail_url: None,
            meta: None,
            files: None,
        }
    }

    fn sidecar(transport: &FakeTransport, folder: &str, content: &str) {
        transport.respond_json(
            &format!("/api/folders/{folder}/sidecar"),
            json!({ "folder": folder, "content": content }),
        );
    }

    fn reconciler(
        transport: Arc<FakeTransport>,
        cache: Arc<MemoryMetaCache>,
    ) -> Reconciler {
        reconciler_with(transport, cache)
    }

    fn reconciler_with(transport: Arc<dyn Transport>, cache: Arc<MemoryMetaCache>) -> Reconciler {
        Reconciler::new(
            transport,
            cache,
            owner(),
            ReconcileOptions::default(),
            Arc::new(DiagnosticsLog::default()),
        )
    }

    #[test]
    fn test_decision_table() {
        let opts = ReconcileOptions::default();
        let now = Utc::now();
        let titled = item("01", Some("Real title"));
        let placeholder = item("02", None);
        let fresh_absent = CacheEntry::absent(now - chrono::Duration::seconds(20));
        let stale_absent = CacheEntry::absent(now - chrono::Duration::seconds(40));
        let fresh_found = CacheEntry::found(&ItemMeta::default(), now - chrono::Duration::seconds(60));
        let stale_found =
            CacheEntry::found(&ItemMeta::default(), now - chrono::Duration::seconds(600));

        assert_eq!(decide(&titled, Some(&fresh_found), true, now, &opts), Decision::Fetch);
        assert_eq!(
            decide(&placeholder, Some(&fresh_absent), false, now, &opts),
            Decision::SkipMissing
        );
        assert_eq!(
            decide(&placeholder, Some(&stale_absent), false, now, &opts),
            Decision::Fetch
        );
        assert_eq!(
            decide(&placeholder, Some(&fresh_found), false, now, &opts),
            Decision::Fetch
        );
        assert_eq!(
            decide(&titled, Some(&fresh_found), false, now, &opts),
            Decision::SkipFound
        );
        assert_eq!(decide(&titled, Some(&stale_found), false, now, &opts), Decision::Fetch);
        assert_eq!(decide(&titled, None, false, now, &opts), Decision::Fetch);
    }

    #[tokio::test]
    async fn test_fresh_negative_entry_skipped_as_missing() {
        let transport = Arc::new(FakeTransport::default());
        let cache = Arc::new(MemoryMetaCache::new());
        let mut blob = CacheBlob::default();
        blob.meta_by_folder.insert(
            key("26"),
            CacheEntry::absent(Utc::now() - chrono::Duration::seconds(20)),
        );
        cache.store(&owner(), &blob).unwrap();

        let gallery = Gallery::new();
        gallery.replace_all(vec![item("26", None)]);

        let report = reconciler(transport.clone(), cache)
            .start(gallery, false)
            .join()
            .await;

        assert_eq!(report.total, 1);
        assert_eq!(report.missing, 1);
        assert_eq!(report.processed, 1);
        assert!(report.done);
        assert!(transport.requested().is_empty());
    }

    #[tokio::test]
    async fn test_found_absent_and_errors_counted() {
        let transport = Arc::new(FakeTransport::default());
        sidecar(&transport, "01", "---\ntitle: \"Bridal\"\n---\n");
        sidecar(&transport, "02", "");
        transport.fail("/api/folders/03/sidecar");
        transport.respond("/api/folders/04/sidecar", 500, "boom");

        let cache = Arc::new(MemoryMetaCache::new());
        let gallery = Gallery::new();
        gallery.replace_all(vec![
            item("04", None),
            item("03", None),
            item("02", None),
            item("01", None),
        ]);

        let task = reconciler(transport.clone(), cache.clone()).start(gallery.clone(), true);
        let progress = task.progress();
        let report = task.join().await;

        assert_eq!(report.found, 1);
        assert_eq!(report.missing, 1);
        assert_eq!(report.errors, 2);
        assert_eq!(report.patched, 1);
        assert_eq!(*progress.borrow(), report);

        assert_eq!(gallery.get(&key("01")).unwrap().title, "Bridal");

        let blob = cache.load(&owner()).unwrap();
        assert!(blob.last_run.is_some());
        assert_eq!(blob.meta_by_folder[&key("01")].source, MetaSource::File);
        assert!(blob.meta_by_folder[&key("02")].is_negative());
        // Fetch errors leave no trace in the cache.
        assert!(!blob.meta_by_folder.contains_key(&key("03")));
        assert!(!blob.meta_by_folder.contains_key(&key("04")));
    }

    #[tokio::test]
    async fn test_folders_started_lowest_key_first() {
        let transport = Arc::new(FakeTransport::default());
        let gallery = Gallery::new();
        gallery.replace_all(vec![item("12", None), item("3", None), item("07", None)]);

        let r = Reconciler::new(
            transport.clone(),
            Arc::new(MemoryMetaCache::new()),
            owner(),
            ReconcileOptions {
                concurrency: 1,
                ..ReconcileOptions::default()
            },
            Arc::new(DiagnosticsLog::default()),
        );
        r.start(gallery, true).join().await;

        assert_eq!(
            transport.requested(),
            vec![
                "/api/folders/3/sidecar",
                "/api/folders/07/sidecar",
                "/api/folders/12/sidecar"
            ]
        );
    }

    #[tokio::test]
    async fn test_update_keeps_other_folders_metadata() {
        let transport = Arc::new(FakeTransport::default());
        sidecar(&transport, "01", "---\ntitle: \"One\"\ndescription: \"First\"\n---\n");
        sidecar(&transport, "02", "---\ntitle: \"Two\"\n---\n");
        let cache = Arc::new(MemoryMetaCache::new());
        let gallery = Gallery::new();
        gallery.replace_all(vec![item("01", None), item("02", None)]);

        let r = reconciler(transport.clone(), cache.clone());
        r.start(gallery.clone(), true).join().await;
        let before = gallery.get(&key("01")).unwrap();

        // Folder 01's sidecar disappears and 02 changes.
        sidecar(&transport, "01", "");
        sidecar(&transport, "02", "---\ntitle: \"Two, revised\"\n---\n");
        r.start(gallery.clone(), true).join().await;

        assert_eq!(gallery.get(&key("01")).unwrap(), before);
        assert_eq!(gallery.get(&key("02")).unwrap().title, "Two, revised");
    }

    #[tokio::test]
    async fn test_fresh_positive_entry_skipped_as_found() {
        let transport = Arc::new(FakeTransport::default());
        let cache = Arc::new(MemoryMetaCache::new());
        let mut blob = CacheBlob::default();
        blob.meta_by_folder.insert(
            key("05"),
            CacheEntry::found(
                &ItemMeta {
                    title: Some("Cached".into()),
                    ..ItemMeta::default()
                },
                Utc::now(),
            ),
        );
        cache.store(&owner(), &blob).unwrap();

        let gallery = Gallery::new();
        gallery.replace_all(vec![item("05", Some("Cached"))]);

        let r = Reconciler::new(
            transport.clone(),
            cache,
            owner(),
            ReconcileOptions {
                positive_ttl: Duration::from_secs(300),
                ..ReconcileOptions::default()
            },
            Arc::new(DiagnosticsLog::default()),
        );
        let report = r.start(gallery, false).join().await;
        assert_eq!(report.found, 1);
        assert!(transport.requested().is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_fetches_stay_within_concurrency() {
        let transport = Arc::new(SlowTransport::default());
        let gallery = Gallery::new();
        gallery.replace_all(
            ["01", "02", "03", "04", "05", "06", "07"]
                .iter()
                .map(|f| item(f, None))
                .collect(),
        );

        let r = Reconciler::new(
            transport.clone(),
            Arc::new(MemoryMetaCache::new()),
            owner(),
            ReconcileOptions {
                concurrency: 2,
                ..ReconcileOptions::default()
            },
            Arc::new(DiagnosticsLog::default()),
        );
        let report = r.start(gallery, true).join().await;

        assert_eq!(report.processed, 7);
        assert_eq!(transport.inner.requested().len(), 7);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_edit_during_pass_survives_cache_write() {
        let transport = Arc::new(GatedTransport::new("/api/folders/05/sidecar"));
        transport.inner.respond("/api/folders/04/sidecar", 200, "{}");

        let cache = Arc::new(MemoryMetaCache::new());
        let mut blob = CacheBlob::default();
        blob.meta_by_folder.insert(key("04"), CacheEntry::absent(Utc::now()));
        cache.store(&owner(), &blob).unwrap();

        let gallery = Gallery::new();
        gallery.replace_all(vec![item("04", None), item("05", None)]);
        let task = reconciler_with(transport.clone(), cache.clone()).start(gallery, false);

        transport.entered.notified().await;
        let editor = SidecarEditor::new(transport.clone()).with_cache(cache.clone(), owner());
        let meta = SidecarMetadata {
            title: Some("New".into()),
            ..SidecarMetadata::default()
        };
        editor.save(&key("04"), &meta).await.unwrap();
        transport.release.notify_one();

        let report = task.join().await;
        assert_eq!(report.processed, 2);

        let blob = cache.load(&owner()).unwrap();
        let edited = &blob.meta_by_folder[&key("04")];
        assert!(edited.is_from_file());
        assert_eq!(edited.title.as_deref(), Some("New"));
        assert!(blob.meta_by_folder[&key("05")].is_negative());
        assert!(blob.last_run.is_some());
    }

    #[tokio::test]
    async fn test_server_error_reported_as_status() {
        let transport = Arc::new(FakeTransport::default());
        transport.respond("/api/folders/08/sidecar", 503, "busy");
        let r = reconciler(transport, Arc::new(MemoryMetaCache::new()));

        match r.fetch_sidecar(&key("08")).await {
            Err(TransportError::Status { url, status }) => {
                assert_eq!(url, "/api/folders/08/sidecar");
                assert_eq!(status, 503);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
