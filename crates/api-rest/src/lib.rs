//! # API REST
//!
//! REST API implementation for folio.
//!
//! Handles:
//! - the aggregate manifest and media files (with byte ranges) as static content
//! - sidecar CRUD, each edit followed by a manifest rebuild
//! - folder listings for the client's heal step
//! - OpenAPI/Swagger documentation
//!
//! Filesystem work runs on the blocking pool; handlers only translate errors into status codes.

#![warn(rust_2018_idioms)]

use api_shared::{
    validate_api_key, FolderFilesRes, HealthRes, HealthService, RebuildRes, SidecarRes,
    SidecarWriteRes, API_KEY_HEADER,
};
use axum::{
    extract::{Path as AxumPath, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use folio_core::config::{
    bool_from_env_value, bytes_from_env_value, folder_width_from_env_value, source_from_env_value,
};
use folio_core::constants::{
    DEFAULT_MEDIA_PREFIX, DEFAULT_MEDIA_ROOT, DEFAULT_MIN_PREVIEW_BYTES, DEFAULT_PUBLIC_DIR,
};
use folio_core::{BuildConfig, FolioError, SidecarStore};
use folio_types::FolderKey;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Default listen address when `FOLIO_REST_ADDR` is unset.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

type ApiError = (StatusCode, String);

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<SidecarStore>,
    api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(store: SidecarStore) -> Self {
        Self {
            store: Arc::new(store),
            api_key: None,
        }
    }

    /// Requires `x-api-key` on editing routes. `None` or an empty key leaves them open.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty()).map(Arc::from);
        self
    }

    pub fn store(&self) -> &SidecarStore {
        &self.store
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
        validate_api_key(provided, self.api_key.as_deref())
            .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_sidecar,
        put_sidecar,
        delete_sidecar,
        list_files,
        rebuild_manifest,
    ),
    components(schemas(HealthRes, SidecarRes, SidecarWriteRes, RebuildRes, FolderFilesRes))
)]
pub struct ApiDoc;

/// Build configuration from `FOLIO_*` environment variables.
///
/// # Errors
///
/// Returns an error if any variable is set to an unparsable value.
pub fn build_config_from_env() -> anyhow::Result<BuildConfig> {
    let media_root =
        std::env::var("FOLIO_MEDIA_ROOT").unwrap_or_else(|_| DEFAULT_MEDIA_ROOT.into());
    let public_dir =
        std::env::var("FOLIO_PUBLIC_DIR").unwrap_or_else(|_| DEFAULT_PUBLIC_DIR.into());
    let media_prefix =
        std::env::var("FOLIO_MEDIA_PREFIX").unwrap_or_else(|_| DEFAULT_MEDIA_PREFIX.into());

    let config = BuildConfig::new(PathBuf::from(media_root), PathBuf::from(public_dir), &media_prefix)?
        .with_source(source_from_env_value(std::env::var("FOLIO_SOURCE").ok())?)
        .with_folder_width(folder_width_from_env_value(
            std::env::var("FOLIO_FOLDER_WIDTH").ok(),
        )?)
        .with_min_preview_bytes(bytes_from_env_value(
            std::env::var("FOLIO_MIN_PREVIEW_BYTES").ok(),
            DEFAULT_MIN_PREVIEW_BYTES,
        )?)
        .with_extract_posters(bool_from_env_value(
            std::env::var("FOLIO_EXTRACT_POSTERS").ok(),
            true,
        )?);
    Ok(config)
}

/// Router with every folio route, static content and Swagger UI.
pub fn app(state: AppState) -> Router {
    let config = state.store.builder().config();
    let manifest = ServeFile::new(config.manifest_path());
    let media = ServeDir::new(config.media_root());
    let media_prefix = config.path_rules().canonical_prefix().to_string();

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/folders/:folder/sidecar",
            get(get_sidecar).put(put_sidecar).delete(delete_sidecar),
        )
        .route("/api/folders/:folder/files", get(list_files))
        .route("/api/manifest/rebuild", post(rebuild_manifest))
        .route_service("/manifest.json", manifest)
        .nest_service(&media_prefix, media)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn parse_folder(folder: &str) -> Result<FolderKey, ApiError> {
    FolderKey::parse(folder).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn map_folio_error(e: FolioError) -> ApiError {
    match e {
        FolioError::InvalidFolderKey(_) | FolioError::InvalidInput(_) => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        FolioError::FolderNotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        other => {
            tracing::error!("request failed: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// Runs blocking store work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FolioError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| {
            tracing::error!("blocking task failed: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
        })?
        .map_err(map_folio_error)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/api/folders/{folder}/sidecar",
    params(("folder" = String, Path, description = "Numbered content folder")),
    responses(
        (status = 200, description = "Sidecar text, empty when absent", body = SidecarRes),
        (status = 400, description = "Invalid folder key")
    )
)]
/// Read a folder's sidecar
///
/// A missing sidecar is not an error: the response carries empty content.
async fn get_sidecar(
    State(state): State<AppState>,
    AxumPath(folder): AxumPath<String>,
) -> Result<Json<SidecarRes>, ApiError> {
    let key = parse_folder(&folder)?;
    let store = state.store.clone();
    let read_key = key.clone();
    let content = blocking(move || store.get(&read_key)).await?;
    Ok(Json(SidecarRes {
        folder: key.to_string(),
        content,
    }))
}

#[utoipa::path(
    put,
    path = "/api/folders/{folder}/sidecar",
    params(("folder" = String, Path, description = "Numbered content folder")),
    request_body(content = String, content_type = "text/plain"),
    responses(
        (status = 200, description = "Sidecar written and manifest rebuilt", body = SidecarWriteRes),
        (status = 400, description = "Invalid folder key"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Unknown folder"),
        (status = 500, description = "Write or rebuild failed")
    )
)]
/// Replace a folder's sidecar
///
/// The raw body becomes the new sidecar; the manifest is rebuilt before responding.
async fn put_sidecar(
    State(state): State<AppState>,
    AxumPath(folder): AxumPath<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<SidecarWriteRes>, ApiError> {
    state.authorize(&headers)?;
    let key = parse_folder(&folder)?;
    let store = state.store.clone();
    let write_key = key.clone();
    let manifest = blocking(move || store.put(&write_key, &body)).await?;
    Ok(Json(SidecarWriteRes {
        folder: key.to_string(),
        items: manifest.items.len(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/folders/{folder}/sidecar",
    params(("folder" = String, Path, description = "Numbered content folder")),
    responses(
        (status = 200, description = "Sidecar removed (or already absent) and manifest rebuilt", body = SidecarWriteRes),
        (status = 400, description = "Invalid folder key"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Removal or rebuild failed")
    )
)]
/// Delete a folder's sidecar
async fn delete_sidecar(
    State(state): State<AppState>,
    AxumPath(folder): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Json<SidecarWriteRes>, ApiError> {
    state.authorize(&headers)?;
    let key = parse_folder(&folder)?;
    let store = state.store.clone();
    let delete_key = key.clone();
    let manifest = blocking(move || store.delete(&delete_key)).await?;
    Ok(Json(SidecarWriteRes {
        folder: key.to_string(),
        items: manifest.items.len(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/folders/{folder}/files",
    params(("folder" = String, Path, description = "Numbered content folder")),
    responses(
        (status = 200, description = "Directory listing", body = FolderFilesRes),
        (status = 400, description = "Invalid folder key"),
        (status = 404, description = "Unknown folder")
    )
)]
/// List a folder's files
async fn list_files(
    State(state): State<AppState>,
    AxumPath(folder): AxumPath<String>,
) -> Result<Json<FolderFilesRes>, ApiError> {
    let key = parse_folder(&folder)?;
    let store = state.store.clone();
    let list_key = key.clone();
    let files = blocking(move || {
        if !store.folders().folder_exists(&list_key) {
            return Err(FolioError::FolderNotFound(list_key.to_string()));
        }
        store.list_files(&list_key)
    })
    .await?;
    Ok(Json(FolderFilesRes {
        folder: key.to_string(),
        files,
    }))
}

#[utoipa::path(
    post,
    path = "/api/manifest/rebuild",
    responses(
        (status = 200, description = "Manifest rebuilt", body = RebuildRes),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Rebuild failed")
    )
)]
/// Rebuild the aggregate manifest
async fn rebuild_manifest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RebuildRes>, ApiError> {
    state.authorize(&headers)?;
    let store = state.store.clone();
    let manifest = blocking(move || store.rebuild()).await?;
    tracing::info!("manifest rebuilt with {} items", manifest.items.len());
    Ok(Json(RebuildRes {
        items: manifest.items.len(),
        generated_at: manifest.generated_at.to_rfc3339(),
    }))
}
