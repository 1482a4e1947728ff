//! # Folio Client
//!
//! Runtime side of the portfolio gallery:
//! - [`ManifestLoader`] fetches the aggregate manifest, canonicalises URLs and overlays
//!   sidecar-confirmed cache entries
//! - [`Reconciler`] refreshes per-folder metadata in the background with bounded concurrency
//! - [`MediaResolver`] and [`TileSlot`] validate asset URLs and heal broken ones
//! - [`SidecarEditor`] edits sidecars through the server
//!
//! Network access goes through the [`Transport`] trait; [`HttpTransport`] is the `reqwest`
//! implementation. Diagnostics are collected in an injected [`DiagnosticsLog`].

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod editor;
mod error;
pub mod gallery;
pub mod loader;
pub mod reconcile;
pub mod resolver;
pub mod tile;
pub mod transport;

pub use cache::{CacheBlob, CacheEntry, JsonFileMetaCache, MemoryMetaCache, MetaCache};
pub use config::{ClientConfig, FailPolicy, ReconcileOptions};
pub use diagnostics::{DiagLevel, DiagnosticEntry, DiagnosticsLog};
pub use editor::SidecarEditor;
pub use error::{CacheError, EditorError, LoadError, TransportError};
pub use gallery::Gallery;
pub use loader::ManifestLoader;
pub use reconcile::{decide, Decision, ReconcileProgress, ReconcileReport, ReconcileTask, Reconciler};
pub use resolver::{MediaResolver, Resolution, ResolveStep};
pub use tile::{TileSlot, TileState, ValidationTicket};
pub use transport::{HttpResponse, HttpTransport, Transport};
