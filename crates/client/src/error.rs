/// Failure to get a usable response from the server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Why the aggregate manifest could not be turned into items.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("manifest fetch failed: {0}")]
    Transport(#[from] TransportError),
    #[error("manifest fetch returned HTTP {0}")]
    Status(u16),
    #[error("manifest is not valid JSON: {0}")]
    Malformed(serde_json::Error),
    #[error("manifest has no items array")]
    MissingItems,
}

impl LoadError {
    /// Structural failures (the payload is JSON but not a manifest), as opposed to fetch
    /// failures that a retry may fix.
    pub fn is_structural(&self) -> bool {
        matches!(self, LoadError::MissingItems)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read cache: {0}")]
    Read(std::io::Error),
    #[error("failed to write cache: {0}")]
    Write(std::io::Error),
    #[error("failed to encode cache: {0}")]
    Encode(serde_json::Error),
}

/// Sidecar edits that did not go through.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server rejected edit with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}
