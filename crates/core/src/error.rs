#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid folder key: {0}")]
    InvalidFolderKey(#[from] folio_types::KeyError),
    #[error("folder not found: {0}")]
    FolderNotFound(String),
    #[error("no usable preview in folder {0}")]
    NoPreview(String),
    #[error("media folder error: {0}")]
    Files(#[from] folio_files::FilesError),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to remove file: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to create directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to serialize manifest: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize manifest: {0}")]
    Deserialization(serde_json::Error),
    #[error("poster extraction failed for {path}: {reason}", path = path.display())]
    PosterExtraction {
        path: std::path::PathBuf,
        reason: String,
    },
    #[error("manifest rebuild failed after sidecar edit: {0}")]
    RebuildAfterEdit(#[source] Box<FolioError>),
}

pub type FolioResult<T> = std::result::Result<T, FolioError>;
