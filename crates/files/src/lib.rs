//! Folio Media Folders
//!
//! Filesystem access to the synced media tree used by the portfolio.
//!
//! ## Layout
//!
//! ```text
//! <media_root>/
//! ├── 01/
//! │   ├── 01_short.mp4
//! │   ├── 01_full.mp4
//! │   └── MANIFEST.txt
//! ├── 04/
//! │   └── preview.png
//! └── _thumbs/        # generated poster frames
//!     └── 01-3f9e2a…jpg
//! ```
//!
//! Folders are created by an external sync process. This crate only reads them, with the
//! exception of the sidecar file which `folio-core` writes through [`FolderService::file_path`].
//!
//! ## Example Usage
//!
//! ```no_run
//! use folio_files::FolderService;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = FolderService::new(Path::new("public/media"))?;
//! for key in service.list_folders(Some(2))? {
//!     let files = service.list_files(&key)?;
//!     println!("{key}: {} files", files.len());
//! }
//! # Ok(())
//! # }
//! ```

mod constants;
mod folders;

pub use constants::THUMBS_FOLDER_NAME;
pub use folders::{mime_from_extension, FileEntry, FolderService};

/// Errors that can occur during folder operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Content folder does not exist
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Path validation failed (potential directory traversal or unsafe name)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
