//! Live item collection shared between the loader, the reconciler and the UI.

use folio_core::{sort_items, ItemMeta, MediaItem};
use folio_types::FolderKey;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

/// Sorted collection of gallery items.
///
/// Cloning gives another handle to the same collection. Every mutation bumps a revision
/// counter that observers can wait on.
#[derive(Debug, Clone)]
pub struct Gallery {
    items: Arc<RwLock<Vec<MediaItem>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for Gallery {
    fn default() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            revision: Arc::new(revision),
        }
    }
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current items, ascending by order key.
    pub fn snapshot(&self) -> Vec<MediaItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, folder: &FolderKey) -> Option<MediaItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|i| &i.folder == folder)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole collection, sorting it first.
    pub fn replace_all(&self, mut items: Vec<MediaItem>) {
        sort_items(&mut items);
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
        self.bump();
    }

    /// Merges `meta` into one folder's item. Other folders are never touched.
    ///
    /// Returns `true` if the item changed.
    pub fn merge_meta(&self, folder: &FolderKey, meta: &ItemMeta) -> bool {
        let changed = {
            let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
            match items.iter_mut().find(|i| &i.folder == folder) {
                Some(item) => item.apply_meta(meta),
                None => false,
            }
        };
        if changed {
            self.bump();
        }
        changed
    }

    /// Revision counter, incremented on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{placeholder_title, MetaSource};
    use folio_types::MediaKind;

    fn item(folder: &str) -> MediaItem {
        let key = FolderKey::parse(folder).unwrap();
        MediaItem {
            folder: key.clone(),
            order_key: key.clone(),
            title: placeholder_title(&key),
            preview_url: format!("/media/{folder}/preview.png"),
            preview_type: MediaKind::Image,
            full_url: format!("/media/{folder}/preview.png"),
            full_type: MediaKind::Image,
            thumbnail_url: None,
            meta: None,
            files: None,
        }
    }

    fn titled(title: &str) -> ItemMeta {
        ItemMeta {
            title: Some(title.into()),
            source: Some(MetaSource::File),
            ..ItemMeta::default()
        }
    }

    #[test]
    fn test_replace_all_sorts_any_permutation() {
        let gallery = Gallery::new();
        let permutations = [
            vec!["10", "02", "1"],
            vec!["1", "10", "02"],
            vec!["02", "1", "10"],
        ];
        for perm in permutations {
            gallery.replace_all(perm.iter().map(|f| item(f)).collect());
            let order: Vec<String> = gallery
                .snapshot()
                .iter()
                .map(|i| i.order_key.to_string())
                .collect();
            assert_eq!(order, vec!["1", "02", "10"]);
        }
    }

    #[test]
    fn test_merge_leaves_other_folders_alone() {
        let gallery = Gallery::new();
        gallery.replace_all(vec![item("01"), item("02")]);
        assert!(gallery.merge_meta(&FolderKey::parse("02").unwrap(), &titled("Bee")));

        let before = gallery.get(&FolderKey::parse("02").unwrap()).unwrap();
        assert!(gallery.merge_meta(&FolderKey::parse("01").unwrap(), &titled("Ay")));
        let after = gallery.get(&FolderKey::parse("02").unwrap()).unwrap();

        assert_eq!(before, after);
        assert_eq!(after.title, "Bee");
    }

    #[test]
    fn test_revision_bumps_on_change_only() {
        let gallery = Gallery::new();
        let rx = gallery.subscribe();
        gallery.replace_all(vec![item("01")]);
        assert_eq!(*rx.borrow(), 1);

        let key = FolderKey::parse("01").unwrap();
        gallery.merge_meta(&key, &titled("Same"));
        gallery.merge_meta(&key, &titled("Same"));
        assert_eq!(*rx.borrow(), 2);

        assert!(!gallery.merge_meta(&FolderKey::parse("99").unwrap(), &titled("x")));
    }
}
