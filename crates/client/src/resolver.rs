//! Asset URL resolution with self-healing fallbacks.
//!
//! Each tile checks its URLs with light range probes before showing them:
//!
//! | Item | Chain |
//! |---|---|
//! | video tile | full → case variants → video preview → heal → full (fail open) |
//! | image tile | preview → case variants → heal (posters first) → placeholder |
//! | lightbox | full → case variants → heal (no preview) → full or placeholder |
//!
//! "Heal" re-lists the folder and probes whatever viable media it finds. Nothing here returns
//! an error: the worst case is a best-effort URL, or [`Resolution::Unresolved`] under
//! [`FailPolicy::Strict`].

use crate::config::{ClientConfig, FailPolicy};
use crate::diagnostics::DiagnosticsLog;
use crate::transport::Transport;
use folio_core::classify::{classify, is_preview_marked, ScanOptions};
use folio_core::constants::POSTER_MARKERS;
use folio_core::{MediaItem, PathRules};
use folio_files::FileEntry;
use folio_types::MediaKind;
use serde::Serialize;
use std::sync::Arc;

const COMPONENT: &str = "resolver";

/// Which step of the chain produced the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolveStep {
    Declared,
    CaseVariant,
    Preview,
    Healed,
    FailOpen,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Resolution {
    Resolved { url: String, step: ResolveStep },
    Unresolved { tried: Vec<String> },
}

impl Resolution {
    pub fn url(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { url, .. } => Some(url),
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    /// True when anything other than the declared URL is shown.
    pub fn used_fallback(&self) -> bool {
        !matches!(
            self,
            Resolution::Resolved {
                step: ResolveStep::Declared,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HealTarget {
    /// Any video, then any image.
    Video,
    /// Poster-marked images, then preview-marked, then any image.
    Image,
    /// Full-asset candidates only, never the declared preview.
    Full,
}

/// Resolves tile and lightbox URLs for gallery items.
#[derive(Clone)]
pub struct MediaResolver {
    transport: Arc<dyn Transport>,
    rules: PathRules,
    policy: FailPolicy,
    placeholder_url: String,
    scan: ScanOptions,
    diagnostics: Arc<DiagnosticsLog>,
}

/// Probes URLs, never the same one twice per resolution.
struct Attempt<'a> {
    transport: &'a dyn Transport,
    tried: Vec<String>,
}

impl<'a> Attempt<'a> {
    fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            tried: Vec::new(),
        }
    }

    async fn probe(&mut self, url: &str) -> bool {
        if url.is_empty() || self.tried.iter().any(|t| t == url) {
            return false;
        }
        self.tried.push(url.to_string());
        self.transport.probe(url).await
    }

    async fn first_live(&mut self, urls: &[String]) -> Option<String> {
        for url in urls {
            if self.probe(url).await {
                return Some(url.clone());
            }
        }
        None
    }
}

impl MediaResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &ClientConfig,
        diagnostics: Arc<DiagnosticsLog>,
    ) -> Self {
        Self {
            transport,
            rules: config.path_rules().clone(),
            policy: config.fail_policy(),
            placeholder_url: config.placeholder_url().to_string(),
            scan: ScanOptions::default(),
            diagnostics,
        }
    }

    pub fn policy(&self) -> FailPolicy {
        self.policy
    }

    /// Resolves the URL shown in the grid tile.
    pub async fn resolve_tile(&self, item: &MediaItem) -> Resolution {
        let mut attempt = Attempt::new(self.transport.as_ref());

        if is_video_item(item) {
            if attempt.probe(&item.full_url).await {
                return resolved(&item.full_url, ResolveStep::Declared);
            }
            if let Some(url) = attempt.first_live(&case_variants(&item.full_url)).await {
                return self.log_fallback(item, url, ResolveStep::CaseVariant);
            }
            if has_distinct_video_preview(item) && attempt.probe(&item.preview_url).await {
                return self.log_fallback(item, item.preview_url.clone(), ResolveStep::Preview);
            }
            if let Some(url) = self.heal(item, HealTarget::Video, &mut attempt).await {
                return self.log_fallback(item, url, ResolveStep::Healed);
            }
            self.give_up(item, attempt, &item.full_url)
        } else {
            if attempt.probe(&item.preview_url).await {
                return resolved(&item.preview_url, ResolveStep::Declared);
            }
            if let Some(url) = attempt.first_live(&case_variants(&item.preview_url)).await {
                return self.log_fallback(item, url, ResolveStep::CaseVariant);
            }
            if let Some(url) = self.heal(item, HealTarget::Image, &mut attempt).await {
                return self.log_fallback(item, url, ResolveStep::Healed);
            }
            self.give_up(item, attempt, "")
        }
    }

    /// Resolves the URL shown in the expanded view. The preview is never substituted here.
    pub async fn resolve_lightbox(&self, item: &MediaItem) -> Resolution {
        let mut attempt = Attempt::new(self.transport.as_ref());

        if attempt.probe(&item.full_url).await {
            return resolved(&item.full_url, ResolveStep::Declared);
        }
        if let Some(url) = attempt.first_live(&case_variants(&item.full_url)).await {
            return self.log_fallback(item, url, ResolveStep::CaseVariant);
        }
        if let Some(url) = self.heal(item, HealTarget::Full, &mut attempt).await {
            return self.log_fallback(item, url, ResolveStep::Healed);
        }
        let fail_open = if item.full_type == MediaKind::Video {
            item.full_url.as_str()
        } else {
            ""
        };
        self.give_up(item, attempt, fail_open)
    }

    /// One-shot recovery after the player reported an error on the resolved URL.
    ///
    /// Only substitutions are tried (video preview, then heal); an exhausted recovery reports
    /// `Unresolved` so the caller keeps what it has.
    pub async fn recover_playback(&self, item: &MediaItem, failed_url: &str) -> Resolution {
        let mut attempt = Attempt::new(self.transport.as_ref());
        attempt.tried.push(failed_url.to_string());

        if has_distinct_video_preview(item) && attempt.probe(&item.preview_url).await {
            return self.log_fallback(item, item.preview_url.clone(), ResolveStep::Preview);
        }
        let target = if is_video_item(item) {
            HealTarget::Video
        } else {
            HealTarget::Image
        };
        if let Some(url) = self.heal(item, target, &mut attempt).await {
            return self.log_fallback(item, url, ResolveStep::Healed);
        }
        self.diagnostics.warn(
            COMPONENT,
            format!("{}: playback recovery found nothing", item.folder),
        );
        Resolution::Unresolved {
            tried: attempt.tried,
        }
    }

    /// Re-lists the folder and probes viable candidates in preference order.
    async fn heal(
        &self,
        item: &MediaItem,
        target: HealTarget,
        attempt: &mut Attempt<'_>,
    ) -> Option<String> {
        let files = match self.transport.list_folder(&item.folder).await {
            Ok(files) => files,
            Err(e) => {
                self.diagnostics.warn(
                    COMPONENT,
                    format!("{}: folder listing failed ({e}); using manifest snapshot", item.folder),
                );
                item.files.clone().unwrap_or_default()
            }
        };
        if files.is_empty() {
            return None;
        }

        let names = self.heal_candidates(item, &files, target);
        let urls: Vec<String> = names
            .iter()
            .map(|name| self.rules.asset_url(&item.folder, name))
            .collect();
        attempt.first_live(&urls).await
    }

    fn heal_candidates(&self, item: &MediaItem, files: &[FileEntry], target: HealTarget) -> Vec<String> {
        let usable: Vec<&FileEntry> = files
            .iter()
            .filter(|f| f.kind.is_media() && f.size > 0)
            .collect();
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };

        match target {
            HealTarget::Video => {
                if let Some(sel) = classify(&item.folder, files, &self.scan) {
                    for f in [sel.full, sel.preview] {
                        if f.kind == MediaKind::Video {
                            push(&f.name);
                        }
                    }
                }
                usable
                    .iter()
                    .filter(|f| f.kind == MediaKind::Video)
                    .for_each(|f| push(&f.name));
                usable
                    .iter()
                    .filter(|f| f.kind == MediaKind::Image)
                    .for_each(|f| push(&f.name));
            }
            HealTarget::Image => {
                let images: Vec<&&FileEntry> =
                    usable.iter().filter(|f| f.kind == MediaKind::Image).collect();
                images
                    .iter()
                    .filter(|f| is_poster_marked(&f.name))
                    .for_each(|f| push(&f.name));
                images
                    .iter()
                    .filter(|f| is_preview_marked(&f.name))
                    .for_each(|f| push(&f.name));
                images.iter().for_each(|f| push(&f.name));
            }
            HealTarget::Full => {
                let preview_name = item.preview_url.rsplit('/').next().unwrap_or_default();
                let wanted = item.full_type;
                if let Some(sel) = classify(&item.folder, files, &self.scan) {
                    if sel.has_distinct_full() {
                        push(&sel.full.name);
                    }
                }
                usable
                    .iter()
                    .filter(|f| f.kind == wanted && !is_preview_marked(&f.name))
                    .for_each(|f| push(&f.name));
                names.retain(|n| n != preview_name);
            }
        }
        names
    }

    fn log_fallback(&self, item: &MediaItem, url: String, step: ResolveStep) -> Resolution {
        self.diagnostics.info(
            COMPONENT,
            format!("{}: resolved via {:?} to {}", item.folder, step, url),
        );
        Resolution::Resolved { url, step }
    }

    /// Applies the fail policy once every probe has failed. An empty `fail_open_url` means
    /// the placeholder.
    fn give_up(&self, item: &MediaItem, attempt: Attempt<'_>, fail_open_url: &str) -> Resolution {
        self.diagnostics.warn(
            COMPONENT,
            format!(
                "{}: no working asset after {} probes",
                item.folder,
                attempt.tried.len()
            ),
        );
        match self.policy {
            FailPolicy::Strict => Resolution::Unresolved {
                tried: attempt.tried,
            },
            FailPolicy::FailOpen if fail_open_url.is_empty() => {
                resolved(&self.placeholder_url, ResolveStep::Placeholder)
            }
            FailPolicy::FailOpen => resolved(fail_open_url, ResolveStep::FailOpen),
        }
    }
}

fn resolved(url: &str, step: ResolveStep) -> Resolution {
    Resolution::Resolved {
        url: url.to_string(),
        step,
    }
}

fn is_video_item(item: &MediaItem) -> bool {
    item.full_type == MediaKind::Video || item.preview_type == MediaKind::Video
}

fn has_distinct_video_preview(item: &MediaItem) -> bool {
    item.preview_type == MediaKind::Video && item.preview_url != item.full_url
}

fn is_poster_marked(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    POSTER_MARKERS.iter().any(|m| lower.contains(m))
}

/// Same path with the extension lower- and upper-cased, and the whole name lower-cased.
pub fn case_variants(url: &str) -> Vec<String> {
    let (dir, name) = match url.rfind('/') {
        Some(idx) => url.split_at(idx + 1),
        None => ("", url),
    };

    let mut variants = Vec::new();
    if let Some((stem, ext)) = name.rsplit_once('.') {
        variants.push(format!("{dir}{stem}.{}", ext.to_ascii_lowercase()));
        variants.push(format!("{dir}{stem}.{}", ext.to_ascii_uppercase()));
    }
    variants.push(format!("{dir}{}", name.to_ascii_lowercase()));

    let mut unique: Vec<String> = Vec::new();
    for v in variants {
        if v != url && !unique.contains(&v) {
            unique.push(v);
        }
    }
    unique
}
