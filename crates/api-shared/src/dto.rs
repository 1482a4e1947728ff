//! Wire types for the folio REST API.

use folio_files::FileEntry;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Raw sidecar text of one folder. `content` is empty when the folder has no sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SidecarRes {
    pub folder: String,
    #[serde(default)]
    pub content: String,
}

/// Result of a sidecar write or delete, after the manifest rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SidecarWriteRes {
    pub folder: String,
    /// Number of items in the rebuilt manifest
    pub items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RebuildRes {
    pub items: usize,
    /// RFC 3339 timestamp of the rebuilt manifest
    pub generated_at: String,
}

/// Directory listing of one folder, used to heal broken asset URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FolderFilesRes {
    pub folder: String,
    #[schema(value_type = Vec<Object>)]
    pub files: Vec<FileEntry>,
}
