//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the folio REST API server on its own, without building the manifest first.
//!
//! ## Intended use
//! Useful during development when the manifest is already built (or rebuilt through
//! `POST /api/manifest/rebuild`). The workspace's main `folio-run` binary builds the manifest
//! once at start-up and then serves the same router.

use api_rest::{app, build_config_from_env, AppState, DEFAULT_REST_ADDR};
use folio_core::{ManifestBuilder, SidecarStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the folio REST API server
///
/// # Environment Variables
/// - `FOLIO_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `FOLIO_API_KEY`: optional key required on editing routes
/// - `FOLIO_MEDIA_ROOT`, `FOLIO_PUBLIC_DIR`, `FOLIO_MEDIA_PREFIX` and the other build settings
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the build configuration is invalid or the media root is missing,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("folio_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("FOLIO_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let config = build_config_from_env()?;
    if !config.media_root().is_dir() {
        anyhow::bail!(
            "Media root does not exist: {}",
            config.media_root().display()
        );
    }

    let store = SidecarStore::new(ManifestBuilder::new(config))?;
    let state = AppState::new(store).with_api_key(std::env::var("FOLIO_API_KEY").ok());

    tracing::info!("-- Starting folio REST API on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
