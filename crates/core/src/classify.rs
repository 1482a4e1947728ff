//! Preview/full selection for a single content folder.
//!
//! Selection is a pure function of the folder key and its listing, so repeated runs over the
//! same folder always pick the same assets.
//!
//! Preview priority (first match wins, broken files skipped):
//! 1. stem is exactly `_preview`
//! 2. name contains `short`
//! 3. name contains `preview`
//! 4. first image
//! 5. first video
//!
//! Full priority, over media files carrying none of the preview markers:
//! 1. video whose name starts with the folder key
//! 2. first remaining video
//! 3. first remaining image
//!
//! and otherwise the preview doubles as the full asset.

use crate::constants::{
    LONG_FORM_MARKER, LONG_FORM_SUFFIXES, POSTER_MARKERS, PREVIEW_EXACT_STEM, PREVIEW_MARKER,
    SHORT_MARKER,
};
use folio_files::FileEntry;
use folio_types::{FolderKey, MediaKind};
use std::fmt;

/// A file as seen by the classifier. Sizes are optional so bare name lists work too.
pub trait MediaFile {
    fn name(&self) -> &str;

    fn kind(&self) -> MediaKind {
        MediaKind::from_file_name(self.name())
    }

    fn size(&self) -> Option<u64> {
        None
    }
}

impl MediaFile for FileEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }
}

impl MediaFile for &str {
    fn name(&self) -> &str {
        self
    }
}

impl MediaFile for String {
    fn name(&self) -> &str {
        self.as_str()
    }
}

/// Tunables for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Preview candidates with a known size below this are treated as corrupted.
    pub min_preview_bytes: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            min_preview_bytes: crate::constants::DEFAULT_MIN_PREVIEW_BYTES,
        }
    }
}

/// Which preview rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewTier {
    ExactPreview,
    Short,
    PreviewMarker,
    FirstImage,
    FirstVideo,
}

impl fmt::Display for PreviewTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PreviewTier::ExactPreview => "exact _preview",
            PreviewTier::Short => "short marker",
            PreviewTier::PreviewMarker => "preview marker",
            PreviewTier::FirstImage => "first image",
            PreviewTier::FirstVideo => "first video",
        };
        f.write_str(label)
    }
}

/// Which full rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullTier {
    KeyPrefixedVideo,
    FirstVideo,
    FirstImage,
    /// No distinct candidate; the preview is reused.
    ReusedPreview,
}

impl fmt::Display for FullTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FullTier::KeyPrefixedVideo => "key-prefixed video",
            FullTier::FirstVideo => "first video",
            FullTier::FirstImage => "first image",
            FullTier::ReusedPreview => "reused preview",
        };
        f.write_str(label)
    }
}

/// Result of classifying one folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<'a, F> {
    pub preview: &'a F,
    pub preview_tier: PreviewTier,
    pub full: &'a F,
    pub full_tier: FullTier,
    /// Existing still image usable as a poster for a video preview.
    pub poster: Option<&'a F>,
}

impl<F> Selection<'_, F> {
    /// False when the preview doubles as the full asset.
    pub fn has_distinct_full(&self) -> bool {
        self.full_tier != FullTier::ReusedPreview
    }
}

/// Selects preview and full assets for `folder`. `None` when no usable preview exists.
pub fn classify<'a, F: MediaFile>(
    folder: &FolderKey,
    files: &'a [F],
    options: &ScanOptions,
) -> Option<Selection<'a, F>> {
    let (preview, preview_tier) = select_preview(files, options)?;
    let (full, full_tier) = match select_full(folder, files) {
        Some((full, tier)) => (full, tier),
        None => (preview, FullTier::ReusedPreview),
    };
    let poster = if preview.kind() == MediaKind::Video {
        find_poster(files, options)
    } else {
        None
    };

    Some(Selection {
        preview,
        preview_tier,
        full,
        full_tier,
        poster,
    })
}

/// Applies the preview priority rules.
pub fn select_preview<'a, F: MediaFile>(
    files: &'a [F],
    options: &ScanOptions,
) -> Option<(&'a F, PreviewTier)> {
    let usable = |f: &F| f.kind().is_media() && !is_corrupt(f, options);

    let tiers: [(PreviewTier, &dyn Fn(&F) -> bool); 5] = [
        (PreviewTier::ExactPreview, &|f: &F| {
            stem(f.name()).eq_ignore_ascii_case(PREVIEW_EXACT_STEM)
        }),
        (PreviewTier::Short, &|f: &F| contains_marker(f.name(), SHORT_MARKER)),
        (PreviewTier::PreviewMarker, &|f: &F| {
            contains_marker(f.name(), PREVIEW_MARKER)
        }),
        (PreviewTier::FirstImage, &|f: &F| f.kind() == MediaKind::Image),
        (PreviewTier::FirstVideo, &|f: &F| f.kind() == MediaKind::Video),
    ];

    tiers.iter().find_map(|(tier, matches)| {
        files
            .iter()
            .find(|f| usable(*f) && matches(*f))
            .map(|f| (f, *tier))
    })
}

/// Applies the full-asset priority rules. `None` means "reuse the preview".
pub fn select_full<'a, F: MediaFile>(
    folder: &FolderKey,
    files: &'a [F],
) -> Option<(&'a F, FullTier)> {
    let remaining: Vec<&F> = files
        .iter()
        .filter(|f| f.kind().is_media())
        .filter(|f| !is_preview_marked(f.name()))
        .filter(|f| f.size() != Some(0))
        .collect();

    if let Some(f) = remaining
        .iter()
        .find(|f| f.kind() == MediaKind::Video && is_key_prefixed(folder, f.name()))
    {
        return Some((*f, FullTier::KeyPrefixedVideo));
    }

    if let Some(f) = remaining.iter().find(|f| f.kind() == MediaKind::Video) {
        return Some((*f, FullTier::FirstVideo));
    }

    remaining
        .iter()
        .find(|f| f.kind() == MediaKind::Image)
        .map(|f| (*f, FullTier::FirstImage))
}

/// True if the name carries any of the preview markers.
pub fn is_preview_marked(name: &str) -> bool {
    stem(name).eq_ignore_ascii_case(PREVIEW_EXACT_STEM)
        || contains_marker(name, SHORT_MARKER)
        || contains_marker(name, PREVIEW_MARKER)
}

/// First image whose name marks it as a poster.
pub fn find_poster<'a, F: MediaFile>(files: &'a [F], options: &ScanOptions) -> Option<&'a F> {
    files.iter().find(|f| {
        f.kind() == MediaKind::Image
            && !is_corrupt(*f, options)
            && POSTER_MARKERS
                .iter()
                .any(|m| contains_marker(f.name(), m))
    })
}

/// An extended-length video variant other than `current`, if the folder has one.
pub fn find_long_form_variant<'a, F: MediaFile>(files: &'a [F], current: &str) -> Option<&'a F> {
    files.iter().find(|f| {
        f.kind() == MediaKind::Video && f.name() != current && is_long_form(f.name())
    })
}

pub fn is_long_form(name: &str) -> bool {
    let stem = stem(name).to_ascii_lowercase();
    LONG_FORM_SUFFIXES.iter().any(|s| stem.ends_with(s)) || stem.contains(LONG_FORM_MARKER)
}

fn is_corrupt<F: MediaFile>(file: &F, options: &ScanOptions) -> bool {
    file.size().is_some_and(|s| s < options.min_preview_bytes)
}

/// `01.mp4`, `01_full.mp4`, `01-hero.mov` match key `01`; `010.mp4` does not.
fn is_key_prefixed(folder: &FolderKey, name: &str) -> bool {
    match name.strip_prefix(folder.as_str()) {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_digit()),
        None => false,
    }
}

fn contains_marker(name: &str, marker: &str) -> bool {
    name.to_ascii_lowercase().contains(marker)
}

fn stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> FolderKey {
        FolderKey::parse(s).unwrap()
    }

    fn entry(name: &str, size: u64) -> FileEntry {
        FileEntry {
            name: name.into(),
            kind: MediaKind::from_file_name(name),
            size,
            modified: None,
            content_type: None,
        }
    }

    #[test]
    fn test_image_preview_with_sidecar() {
        let files = ["MANIFEST.txt", "preview.png"];
        let sel = classify(&key("04"), &files, &ScanOptions::default()).unwrap();
        assert_eq!(*sel.preview, "preview.png");
        assert_eq!(sel.preview_tier, PreviewTier::PreviewMarker);
        assert_eq!(*sel.full, "preview.png");
        assert_eq!(sel.full_tier, FullTier::ReusedPreview);
        assert!(!sel.has_distinct_full());
    }

    #[test]
    fn test_short_preview_and_full_video() {
        let files = ["01_full.mp4", "01_short.mp4"];
        let sel = classify(&key("01"), &files, &ScanOptions::default()).unwrap();
        assert_eq!(*sel.preview, "01_short.mp4");
        assert_eq!(sel.preview_tier, PreviewTier::Short);
        assert_eq!(*sel.full, "01_full.mp4");
        assert_eq!(sel.full_tier, FullTier::KeyPrefixedVideo);
    }

    #[test]
    fn test_exact_preview_beats_short() {
        let files = ["clip_short.mp4", "_preview.webm", "hero.mov"];
        let (preview, tier) = select_preview(&files, &ScanOptions::default()).unwrap();
        assert_eq!(*preview, "_preview.webm");
        assert_eq!(tier, PreviewTier::ExactPreview);
    }

    #[test]
    fn test_first_image_then_first_video() {
        let files = ["b.mp4", "a.mov", "z.jpg"];
        let (preview, tier) = select_preview(&files, &ScanOptions::default()).unwrap();
        assert_eq!(*preview, "z.jpg");
        assert_eq!(tier, PreviewTier::FirstImage);

        let files = ["b.mp4", "a.mov", "notes.txt"];
        let (preview, tier) = select_preview(&files, &ScanOptions::default()).unwrap();
        assert_eq!(*preview, "b.mp4");
        assert_eq!(tier, PreviewTier::FirstVideo);
    }

    #[test]
    fn test_unrecognised_extensions_excluded() {
        let files = ["preview.psd", "MANIFEST.txt", "short.docx"];
        assert!(classify(&key("02"), &files, &ScanOptions::default()).is_none());
    }

    #[test]
    fn test_corrupt_preview_skips_tier() {
        let files = vec![
            entry("_preview.mp4", 0),
            entry("clip_short.mp4", 12),
            entry("cover.jpg", 50_000),
            entry("03.mp4", 9_000_000),
        ];
        let sel = classify(&key("03"), &files, &ScanOptions::default()).unwrap();
        assert_eq!(sel.preview.name, "cover.jpg");
        assert_eq!(sel.preview_tier, PreviewTier::FirstImage);
        assert_eq!(sel.full.name, "03.mp4");
    }

    #[test]
    fn test_min_preview_threshold_configurable() {
        let files = vec![entry("preview.png", 100)];
        assert!(classify(&key("05"), &files, &ScanOptions::default()).is_none());
        let lenient = ScanOptions {
            min_preview_bytes: 1,
        };
        assert!(classify(&key("05"), &files, &lenient).is_some());
    }

    #[test]
    fn test_full_skips_preview_marked_files() {
        let files = ["preview.mp4", "raw.jpg"];
        let sel = classify(&key("06"), &files, &ScanOptions::default()).unwrap();
        assert_eq!(*sel.preview, "preview.mp4");
        assert_eq!(*sel.full, "raw.jpg");
        assert_eq!(sel.full_tier, FullTier::FirstImage);
    }

    #[test]
    fn test_key_prefix_requires_boundary() {
        let files = ["010.mp4", "01-hero.mp4"];
        let (full, tier) = select_full(&key("01"), &files).unwrap();
        assert_eq!(*full, "01-hero.mp4");
        assert_eq!(tier, FullTier::KeyPrefixedVideo);

        let files = ["010.mp4", "other.mp4"];
        let (full, tier) = select_full(&key("01"), &files).unwrap();
        assert_eq!(*full, "010.mp4");
        assert_eq!(tier, FullTier::FirstVideo);
    }

    #[test]
    fn test_poster_only_for_video_preview() {
        let files = ["_preview.mp4", "poster.jpg"];
        let sel = classify(&key("07"), &files, &ScanOptions::default()).unwrap();
        assert_eq!(sel.poster.copied(), Some("poster.jpg"));

        let files = ["preview.png", "poster.jpg"];
        let sel = classify(&key("07"), &files, &ScanOptions::default()).unwrap();
        assert!(sel.poster.is_none());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let files = ["c.mp4", "b_short.mp4", "a.jpg", "08_x.mov", "MANIFEST.txt"];
        let first = classify(&key("08"), &files, &ScanOptions::default()).unwrap();
        for _ in 0..10 {
            let again = classify(&key("08"), &files, &ScanOptions::default()).unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(*first.preview, "b_short.mp4");
        assert_eq!(*first.full, "08_x.mov");
    }

    #[test]
    fn test_long_form_variant() {
        let files = ["_preview.mp4", "clip_long.mp4", "other.mp4"];
        assert_eq!(
            find_long_form_variant(&files, "_preview.mp4").copied(),
            Some("clip_long.mp4")
        );
        assert!(find_long_form_variant(&files, "clip_long.mp4").is_none());
        assert!(is_long_form("Wedding-LONG.mov"));
        assert!(is_long_form("bts_longform_cut.mp4"));
        assert!(!is_long_form("belong.mp4"));
    }
}
