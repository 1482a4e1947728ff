//! Media-root scoped folder access
//!
//! [`FolderService`] is the only component that touches the synced media tree directly.
//! It validates the media root once at construction and then hands out listings of the
//! numbered content folders and the files inside them.
//!
//! # Listing snapshot
//!
//! Each file is described by a [`FileEntry`]: name, media kind, size, modification time and
//! a best-effort content type. The same snapshot is embedded in the aggregate manifest so the
//! client can run secondary heuristics (long-form variants, healing) without another scan.
//!
//! # Determinism
//!
//! Directory iteration order is filesystem dependent. Listings are always sorted by name so
//! that "first image in listing order" means the same thing on every machine.

use crate::constants::{FINGERPRINT_HEX_LEN, SNIFF_LEN};
use crate::{FilesError, THUMBS_FOLDER_NAME};
use chrono::{DateTime, Utc};
use folio_types::{FolderKey, MediaKind};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// One file inside a content folder.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// File name without any directory component
    pub name: String,

    /// Media classification by extension
    #[serde(rename = "type")]
    pub kind: MediaKind,

    /// Size in bytes
    pub size: u64,

    /// Last modification time, when the filesystem reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    /// Detected MIME type. Sniffed from content first, extension second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl FileEntry {
    pub fn is_media(&self) -> bool {
        self.kind.is_media()
    }
}

/// Service for reading the numbered content folders below a media root.
#[derive(Debug, Clone)]
pub struct FolderService {
    /// Canonicalised media root
    root_directory: PathBuf,
}

impl FolderService {
    /// Creates a new `FolderService` rooted at `media_root`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the root does not exist, is not a
    /// directory, or cannot be canonicalised.
    pub fn new(media_root: &Path) -> Result<Self, FilesError> {
        if !media_root.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                media_root.display()
            )));
        }

        if !media_root.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                media_root.display()
            )));
        }

        let root_directory = media_root.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                media_root.display(),
                e
            ))
        })?;

        Ok(Self { root_directory })
    }

    #[must_use]
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Directory for a content folder. The key type already rules out traversal.
    #[must_use]
    pub fn folder_dir(&self, key: &FolderKey) -> PathBuf {
        self.root_directory.join(key.as_str())
    }

    /// Directory holding generated poster frames.
    #[must_use]
    pub fn thumbs_dir(&self) -> PathBuf {
        self.root_directory.join(THUMBS_FOLDER_NAME)
    }

    pub fn folder_exists(&self, key: &FolderKey) -> bool {
        self.folder_dir(key).is_dir()
    }

    /// Lists every numbered content folder, sorted ascending by numeric key.
    ///
    /// When `width` is given only keys of exactly that many digits are returned, which is
    /// how the fixed-width folder convention is enforced.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::Io` if the media root cannot be read.
    pub fn list_folders(&self, width: Option<usize>) -> Result<Vec<FolderKey>, FilesError> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.root_directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            let Ok(key) = FolderKey::parse(name) else {
                continue;
            };

            // FolderKey::parse trims, so require the raw name to match exactly.
            if key.as_str() != name {
                continue;
            }

            if width.is_some_and(|w| key.width() != w) {
                continue;
            }

            keys.push(key);
        }

        keys.sort();
        Ok(keys)
    }

    /// Lists the regular files of a content folder, sorted by name.
    ///
    /// Hidden files (leading `.`) and subdirectories are skipped.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::FolderNotFound` if the folder does not exist, or
    /// `FilesError::Io` if it cannot be read.
    pub fn list_files(&self, key: &FolderKey) -> Result<Vec<FileEntry>, FilesError> {
        let dir = self.folder_dir(key);
        if !dir.is_dir() {
            return Err(FilesError::FolderNotFound(key.to_string()));
        }

        let mut entries = Vec::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();

            let name = match entry.file_name().to_str() {
                Some(n) => n.to_owned(),
                None => continue,
            };
            if name.starts_with('.') {
                continue;
            }

            // Follow symlinks: sync tools sometimes link rather than copy.
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }

            let kind = MediaKind::from_file_name(&name);
            let content_type = detect_content_type(&path, &name);
            let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

            entries.push(FileEntry {
                name,
                kind,
                size: metadata.len(),
                modified,
                content_type,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Resolves a single file inside a content folder.
    ///
    /// The file need not exist yet; this is also used for writes.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidPath` if `name` is empty or contains path separators or
    /// parent references.
    pub fn file_path(&self, key: &FolderKey, name: &str) -> Result<PathBuf, FilesError> {
        validate_file_name(name)?;
        Ok(self.folder_dir(key).join(name))
    }

    /// Stable fingerprint of a file's identity (folder, name, size, mtime).
    ///
    /// Used to name cached poster frames so a changed video gets a fresh poster while an
    /// unchanged one reuses the cached frame.
    #[must_use]
    pub fn fingerprint(&self, key: &FolderKey, entry: &FileEntry) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_str().as_bytes());
        hasher.update(b"/");
        hasher.update(entry.name.as_bytes());
        hasher.update(b":");
        hasher.update(entry.size.to_le_bytes());
        if let Some(modified) = entry.modified {
            hasher.update(modified.timestamp().to_le_bytes());
        }
        let digest = hex::encode(hasher.finalize());
        digest[..FINGERPRINT_HEX_LEN].to_string()
    }
}

fn validate_file_name(name: &str) -> Result<(), FilesError> {
    if name.trim().is_empty() {
        return Err(FilesError::InvalidPath("file name is empty".into()));
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return Err(FilesError::InvalidPath(format!(
            "file name must not contain separators: {name:?}"
        )));
    }
    if name == "." || name == ".." {
        return Err(FilesError::InvalidPath(format!(
            "file name must not be a directory reference: {name:?}"
        )));
    }
    Ok(())
}

/// Best-effort content type: sniff the first bytes, then fall back to the extension.
fn detect_content_type(path: &Path, name: &str) -> Option<String> {
    let sniffed = fs::File::open(path).ok().and_then(|file| {
        let mut buf = Vec::with_capacity(SNIFF_LEN);
        file.take(SNIFF_LEN as u64).read_to_end(&mut buf).ok()?;
        infer::get(&buf).map(|kind| kind.mime_type().to_string())
    });

    sniffed.or_else(|| {
        name.rsplit_once('.')
            .and_then(|(_, ext)| mime_from_extension(ext))
            .map(str::to_string)
    })
}

/// MIME type for the media and sidecar extensions the portfolio deals with.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "txt" => "text/plain",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn key(s: &str) -> FolderKey {
        FolderKey::parse(s).unwrap()
    }

    fn media_root() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("media");
        fs::create_dir_all(&root).unwrap();
        (temp, root)
    }

    #[test]
    fn test_folder_service_new_success() {
        let (_temp, root) = media_root();
        let service = FolderService::new(&root).unwrap();
        assert!(service.root_directory().ends_with("media"));
        assert!(service.thumbs_dir().ends_with(THUMBS_FOLDER_NAME));
    }

    #[test]
    fn test_folder_service_root_not_exists() {
        let temp = TempDir::new().unwrap();
        let service = FolderService::new(&temp.path().join("missing"));
        assert!(matches!(service, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_folder_service_root_not_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "not a directory").unwrap();
        let service = FolderService::new(&file);
        assert!(matches!(service, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_list_folders_filters_and_sorts() {
        let (_temp, root) = media_root();
        for name in ["10", "02", "01", "_thumbs", "abc", "003"] {
            fs::create_dir_all(root.join(name)).unwrap();
        }
        fs::write(root.join("05"), b"a file, not a folder").unwrap();

        let service = FolderService::new(&root).unwrap();

        let fixed: Vec<String> = service
            .list_folders(Some(2))
            .unwrap()
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(fixed, vec!["01", "02", "10"]);

        let any_width = service.list_folders(None).unwrap();
        assert_eq!(any_width.len(), 4);
        assert_eq!(any_width[2].as_str(), "003");
    }

    #[test]
    fn test_list_files_sorted_and_classified() {
        let (_temp, root) = media_root();
        let dir = root.join("01");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("b.mp4"), vec![0u8; 32]).unwrap();
        fs::write(dir.join("a.png"), [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();
        fs::write(dir.join("MANIFEST.txt"), "---\ntitle: \"x\"\n---\n").unwrap();
        fs::write(dir.join(".DS_Store"), b"junk").unwrap();

        let service = FolderService::new(&root).unwrap();
        let files = service.list_files(&key("01")).unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["MANIFEST.txt", "a.png", "b.mp4"]);

        assert_eq!(files[0].kind, MediaKind::Other);
        assert_eq!(files[1].kind, MediaKind::Image);
        assert_eq!(files[1].content_type.as_deref(), Some("image/png"));
        assert_eq!(files[2].kind, MediaKind::Video);
        assert_eq!(files[2].size, 32);
        // Zeroes are not sniffable, so the extension decides.
        assert_eq!(files[2].content_type.as_deref(), Some("video/mp4"));
        assert!(files[2].modified.is_some());
    }

    #[test]
    fn test_list_files_missing_folder() {
        let (_temp, root) = media_root();
        let service = FolderService::new(&root).unwrap();
        let result = service.list_files(&key("42"));
        assert!(matches!(result, Err(FilesError::FolderNotFound(_))));
    }

    #[test]
    fn test_file_path_rejects_traversal() {
        let (_temp, root) = media_root();
        let service = FolderService::new(&root).unwrap();

        assert!(service.file_path(&key("01"), "MANIFEST.txt").is_ok());
        for bad in ["", "../x", "a/b", "..", "a\\b"] {
            assert!(
                matches!(
                    service.file_path(&key("01"), bad),
                    Err(FilesError::InvalidPath(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_fingerprint_tracks_size_and_name() {
        let (_temp, root) = media_root();
        let service = FolderService::new(&root).unwrap();

        let entry = FileEntry {
            name: "clip.mp4".into(),
            kind: MediaKind::Video,
            size: 100,
            modified: None,
            content_type: None,
        };
        let same = service.fingerprint(&key("01"), &entry);
        assert_eq!(same, service.fingerprint(&key("01"), &entry.clone()));
        assert_eq!(same.len(), FINGERPRINT_HEX_LEN);

        let resized = FileEntry {
            size: 101,
            ..entry.clone()
        };
        assert_ne!(same, service.fingerprint(&key("01"), &resized));
        assert_ne!(same, service.fingerprint(&key("02"), &entry));
    }

    #[test]
    fn test_file_entry_serialises_type_field() {
        let entry = FileEntry {
            name: "a.png".into(),
            kind: MediaKind::Image,
            size: 1,
            modified: None,
            content_type: Some("image/png".into()),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"image\""));
        assert!(json.contains("\"contentType\":\"image/png\""));
        assert!(!json.contains("modified"));
    }
}
