use api_rest::{AppState, DEFAULT_REST_ADDR, app, build_config_from_env};
use folio_core::{ManifestBuilder, SidecarStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the folio application
///
/// Builds the aggregate manifest once, then serves it together with the media files and the
/// sidecar API.
///
/// # Environment Variables
/// - `FOLIO_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FOLIO_MEDIA_ROOT`: numbered content folders (default: "public/media")
/// - `FOLIO_PUBLIC_DIR`: where `manifest.json` is written (default: "public")
/// - `FOLIO_API_KEY`: optional key required on editing routes
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, the initial build or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio_run=info".parse()?)
                .add_directive("folio_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("FOLIO_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let config = build_config_from_env()?;
    if !config.media_root().is_dir() {
        anyhow::bail!(
            "Media root does not exist: {}",
            config.media_root().display()
        );
    }

    let builder = ManifestBuilder::new(config);
    let (builder, manifest) = tokio::task::spawn_blocking(move || {
        let manifest = builder.build_and_write();
        (builder, manifest)
    })
    .await?;
    let manifest = manifest?;
    tracing::info!(
        "++ Built manifest with {} items at {}",
        manifest.items.len(),
        builder.config().manifest_path().display()
    );

    let state = AppState::new(SidecarStore::new(builder)?)
        .with_api_key(std::env::var("FOLIO_API_KEY").ok());

    tracing::info!("++ Starting folio REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
