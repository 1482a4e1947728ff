//! # API Shared
//!
//! Shared definitions for the folio HTTP API.
//!
//! Contains:
//! - Request/response DTOs with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - API key checks for the editing endpoints
//!
//! Used by `api-rest` on the serving side and `folio-client` on the consuming side, so both
//! agree on the wire shapes.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{validate_api_key, AuthError, API_KEY_HEADER};
pub use dto::*;
pub use health::HealthService;
