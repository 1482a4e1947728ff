use clap::{Args, Parser, Subcommand};
use folio_client::config::{
    concurrency_from_env_value, fail_policy_from_env_value, seconds_from_env_value,
    DEFAULT_BASE_URL, DEFAULT_NEGATIVE_TTL, DEFAULT_POSITIVE_TTL,
};
use folio_client::{
    ClientConfig, DiagnosticsLog, FailPolicy, Gallery, HttpTransport, JsonFileMetaCache,
    ManifestLoader, MediaResolver, MetaCache, ReconcileOptions, Reconciler,
};
use folio_core::config::{
    bool_from_env_value, bytes_from_env_value, folder_width_from_env_value, source_from_env_value,
};
use folio_core::constants::{
    DEFAULT_MEDIA_PREFIX, DEFAULT_MEDIA_ROOT, DEFAULT_MIN_PREVIEW_BYTES, DEFAULT_PUBLIC_DIR,
};
use folio_core::{
    canonicalize_media_path, classify, format_sidecar, parse_sidecar, BuildConfig,
    ManifestBuilder, PathRules, SidecarStore,
};
use folio_types::{FolderKey, OwnerId};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CACHE_DIR: &str = ".folio-cache";
const DEFAULT_OWNER: &str = "default";

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Portfolio media manifest tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and write the aggregate manifest
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Show how folders are classified, without writing anything
    Inspect {
        /// Folder key (all folders when omitted)
        folder: Option<String>,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Canonicalise a media path or URL
    Canonicalize {
        input: String,
        /// Canonical media prefix
        #[arg(long, env = "FOLIO_MEDIA_PREFIX", default_value = DEFAULT_MEDIA_PREFIX)]
        media_prefix: String,
    },
    /// Read or edit a folder's sidecar (rebuilds the manifest after edits)
    Sidecar {
        #[command(subcommand)]
        action: SidecarAction,
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Fetch the served manifest and run one reconciliation pass
    Reconcile {
        /// Re-fetch every folder, ignoring the cache
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Resolve the tile and lightbox URLs of one served item
    Resolve {
        folder: String,
        #[command(flatten)]
        client: ClientArgs,
    },
    /// Inspect or clear the local metadata cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
        #[command(flatten)]
        client: ClientArgs,
    },
}

#[derive(Subcommand)]
enum SidecarAction {
    /// Print the raw sidecar and its parsed fields
    Get { folder: String },
    /// Update fields; unspecified fields keep their current value
    Set {
        folder: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Remove the sidecar
    Delete { folder: String },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print the cached entries
    Show,
    /// Remove every cached entry for the owner
    Clear,
}

#[derive(Args)]
struct BuildArgs {
    /// Directory holding the numbered content folders
    #[arg(long, env = "FOLIO_MEDIA_ROOT", default_value = DEFAULT_MEDIA_ROOT)]
    media_root: PathBuf,
    /// Directory receiving manifest.json
    #[arg(long, env = "FOLIO_PUBLIC_DIR", default_value = DEFAULT_PUBLIC_DIR)]
    public_dir: PathBuf,
    #[arg(long, env = "FOLIO_MEDIA_PREFIX", default_value = DEFAULT_MEDIA_PREFIX)]
    media_prefix: String,
    /// Folder name width, or "any"
    #[arg(long, env = "FOLIO_FOLDER_WIDTH")]
    folder_width: Option<String>,
    #[arg(long, env = "FOLIO_MIN_PREVIEW_BYTES")]
    min_preview_bytes: Option<String>,
    /// Manifest source label
    #[arg(long, env = "FOLIO_SOURCE")]
    source: Option<String>,
    /// Skip ffmpeg poster extraction
    #[arg(long)]
    no_posters: bool,
}

impl BuildArgs {
    fn to_config(&self) -> Result<BuildConfig, Box<dyn Error>> {
        let extract = !self.no_posters
            && bool_from_env_value(std::env::var("FOLIO_EXTRACT_POSTERS").ok(), true)?;
        let config = BuildConfig::new(
            self.media_root.clone(),
            self.public_dir.clone(),
            &self.media_prefix,
        )?
        .with_source(source_from_env_value(self.source.clone())?)
        .with_folder_width(folder_width_from_env_value(self.folder_width.clone())?)
        .with_min_preview_bytes(bytes_from_env_value(
            self.min_preview_bytes.clone(),
            DEFAULT_MIN_PREVIEW_BYTES,
        )?)
        .with_extract_posters(extract);
        Ok(config)
    }
}

#[derive(Args)]
struct ClientArgs {
    /// Origin serving manifest.json and the API
    #[arg(long, env = "FOLIO_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Cache namespace
    #[arg(long, env = "FOLIO_OWNER", default_value = DEFAULT_OWNER)]
    owner: String,
    #[arg(long, env = "FOLIO_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,
    /// Concurrent sidecar fetches
    #[arg(long)]
    concurrency: Option<usize>,
    /// Report unresolved tiles instead of failing open
    #[arg(long)]
    strict: bool,
}

impl ClientArgs {
    fn to_config(&self) -> Result<ClientConfig, Box<dyn Error>> {
        let concurrency = match self.concurrency {
            Some(0) => return Err("concurrency must be a positive number".into()),
            Some(n) => n,
            None => concurrency_from_env_value(std::env::var("FOLIO_RECONCILE_CONCURRENCY").ok())?,
        };
        let reconcile = ReconcileOptions {
            negative_ttl: seconds_from_env_value(
                std::env::var("FOLIO_NEGATIVE_TTL_SECS").ok(),
                DEFAULT_NEGATIVE_TTL,
            )?,
            positive_ttl: seconds_from_env_value(
                std::env::var("FOLIO_POSITIVE_TTL_SECS").ok(),
                DEFAULT_POSITIVE_TTL,
            )?,
            concurrency,
        };
        let policy = if self.strict {
            FailPolicy::Strict
        } else {
            fail_policy_from_env_value(std::env::var("FOLIO_STRICT_RESOLVE").ok())
        };

        Ok(ClientConfig::new(
            self.base_url.clone(),
            OwnerId::new(&self.owner)?,
            self.cache_dir.clone(),
        )
        .with_reconcile(reconcile)
        .with_fail_policy(policy))
    }
}

/// Everything the network commands share.
struct ClientContext {
    config: ClientConfig,
    transport: Arc<HttpTransport>,
    cache: Arc<JsonFileMetaCache>,
    diagnostics: Arc<DiagnosticsLog>,
}

impl ClientContext {
    fn new(args: &ClientArgs) -> Result<Self, Box<dyn Error>> {
        let config = args.to_config()?;
        let transport = HttpTransport::new(config.base_url())
            .with_api_key(std::env::var("FOLIO_API_KEY").ok());
        Ok(Self {
            cache: Arc::new(JsonFileMetaCache::new(config.cache_dir())),
            transport: Arc::new(transport),
            diagnostics: Arc::new(DiagnosticsLog::default()),
            config,
        })
    }

    fn loader(&self) -> ManifestLoader {
        ManifestLoader::new(
            self.transport.clone(),
            self.cache.clone(),
            self.config.clone(),
            self.diagnostics.clone(),
        )
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.transport.clone(),
            self.cache.clone(),
            self.config.owner().clone(),
            self.config.reconcile(),
            self.diagnostics.clone(),
        )
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("folio=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build { build }) => {
            let builder = ManifestBuilder::new(build.to_config()?);
            let manifest = builder.build_and_write()?;
            println!(
                "Wrote {} items to {}",
                manifest.items.len(),
                builder.config().manifest_path().display()
            );
        }
        Some(Commands::Inspect { folder, build }) => inspect(folder, &build)?,
        Some(Commands::Canonicalize {
            input,
            media_prefix,
        }) => {
            println!(
                "{}",
                canonicalize_media_path(&input, &PathRules::new(&media_prefix))
            );
        }
        Some(Commands::Sidecar { action, build }) => sidecar(action, &build)?,
        Some(Commands::Reconcile { force, client }) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(reconcile(&client, force))?;
        }
        Some(Commands::Resolve { folder, client }) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(resolve(&client, &folder))?;
        }
        Some(Commands::Cache { action, client }) => {
            let config = client.to_config()?;
            let cache = JsonFileMetaCache::new(config.cache_dir());
            match action {
                CacheAction::Show => {
                    let blob = cache.load(config.owner())?;
                    println!("{}", serde_json::to_string_pretty(&blob)?);
                }
                CacheAction::Clear => {
                    cache.clear(config.owner())?;
                    println!("Cleared cache for owner {}", config.owner());
                }
            }
        }
        None => {
            println!("Use 'folio --help' for commands");
        }
    }

    Ok(())
}

fn inspect(folder: Option<String>, build: &BuildArgs) -> Result<(), Box<dyn Error>> {
    let config = build.to_config()?;
    let builder = ManifestBuilder::new(config.clone());
    let folders = builder.folders()?;
    let keys = match folder {
        Some(f) => vec![FolderKey::parse(&f)?],
        None => folders.list_folders(config.folder_width())?,
    };

    for key in keys {
        let files = folders.list_files(&key)?;
        match classify(&key, &files, &config.scan_options()) {
            Some(sel) => {
                println!("{}", key);
                println!("  preview: {} ({})", sel.preview.name, sel.preview_tier);
                println!("  full:    {} ({})", sel.full.name, sel.full_tier);
                if let Some(poster) = sel.poster {
                    println!("  poster:  {}", poster.name);
                }
            }
            None => println!("{}: no usable preview, skipped", key),
        }
    }
    Ok(())
}

fn sidecar(action: SidecarAction, build: &BuildArgs) -> Result<(), Box<dyn Error>> {
    let store = SidecarStore::new(ManifestBuilder::new(build.to_config()?))?;

    match action {
        SidecarAction::Get { folder } => {
            let content = store.get(&FolderKey::parse(&folder)?)?;
            if content.is_empty() {
                println!("No sidecar for folder {}", folder);
            } else {
                print!("{}", content);
                println!("{}", serde_json::to_string_pretty(&parse_sidecar(&content))?);
            }
        }
        SidecarAction::Set {
            folder,
            title,
            description,
            tags,
        } => {
            let key = FolderKey::parse(&folder)?;
            let mut meta = parse_sidecar(&store.get(&key)?);
            if title.is_some() {
                meta.title = title;
            }
            if description.is_some() {
                meta.description = description;
            }
            if let Some(tags) = tags {
                let tags: Vec<String> = tags
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                meta.tags = Some(tags);
            }
            let manifest = store.put(&key, &format_sidecar(&meta))?;
            println!(
                "Updated sidecar for folder {}; manifest has {} items",
                key,
                manifest.items.len()
            );
        }
        SidecarAction::Delete { folder } => {
            let key = FolderKey::parse(&folder)?;
            let manifest = store.delete(&key)?;
            println!(
                "Removed sidecar for folder {}; manifest has {} items",
                key,
                manifest.items.len()
            );
        }
    }
    Ok(())
}

async fn reconcile(args: &ClientArgs, force: bool) -> Result<(), Box<dyn Error>> {
    let ctx = ClientContext::new(args)?;
    let gallery = Gallery::new();
    let (error, task) = ctx
        .loader()
        .load_and_reconcile(&gallery, &ctx.reconciler(), force)
        .await;
    if let Some(e) = error {
        eprintln!("Manifest unavailable: {}", e);
    }

    let report = task.join().await;
    for item in gallery.snapshot() {
        println!("{}  {}", item.folder, item.title);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn resolve(args: &ClientArgs, folder: &str) -> Result<(), Box<dyn Error>> {
    let ctx = ClientContext::new(args)?;
    let key = FolderKey::parse(folder)?;
    let items = ctx.loader().load().await?;
    let item = items
        .iter()
        .find(|i| i.folder == key)
        .ok_or_else(|| format!("folder {} is not in the manifest", key))?;

    let resolver = MediaResolver::new(ctx.transport.clone(), &ctx.config, ctx.diagnostics.clone());
    let tile = resolver.resolve_tile(item).await;
    let lightbox = resolver.resolve_lightbox(item).await;
    println!("tile:     {}", serde_json::to_string(&tile)?);
    println!("lightbox: {}", serde_json::to_string(&lightbox)?);
    Ok(())
}
