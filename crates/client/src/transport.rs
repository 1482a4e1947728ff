//! HTTP access to the folio server.
//!
//! Everything the client needs from the network goes through [`Transport`], so the loader,
//! reconciler and resolver can be exercised against an in-memory fake.

use crate::error::TransportError;
use api_shared::{FolderFilesRes, API_KEY_HEADER};
use async_trait::async_trait;
use folio_files::FileEntry;
use folio_types::FolderKey;
use reqwest::header::RANGE;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Server path of a folder's sidecar resource.
pub fn sidecar_path(folder: &FolderKey) -> String {
    format!("/api/folders/{folder}/sidecar")
}

/// Server path of a folder's directory listing.
pub fn files_path(folder: &FolderKey) -> String {
    format!("/api/folders/{folder}/files")
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `path` (root-relative or absolute).
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError>;

    /// PUT a text body to `path`.
    async fn put(&self, path: &str, body: String) -> Result<HttpResponse, TransportError>;

    async fn delete(&self, path: &str) -> Result<HttpResponse, TransportError>;

    /// Lightweight existence check: a two-byte range request that succeeds on 200 or 206.
    async fn probe(&self, url: &str) -> bool;

    /// Directory listing of a folder.
    async fn list_folder(&self, folder: &FolderKey) -> Result<Vec<FileEntry>, TransportError> {
        let path = files_path(folder);
        let res = self.get(&path).await?;
        if !res.is_success() {
            return Err(TransportError::Status {
                url: path,
                status: res.status,
            });
        }
        let listing: FolderFilesRes =
            serde_json::from_slice(&res.body).map_err(|e| TransportError::Decode {
                url: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(listing.files)
    }
}

/// [`Transport`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Key sent with sidecar writes.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Absolute URLs pass through; root-relative paths are joined onto the base URL with
    /// every segment percent-encoded, so `#`, `?` and `%` in file names stay part of the path.
    fn url(&self, path: &str) -> Result<reqwest::Url, TransportError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return reqwest::Url::parse(path).map_err(|e| TransportError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            });
        }

        let segments: Vec<String> = path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        let raw = format!("{}/{}", self.base_url, segments.join("/"));
        reqwest::Url::parse(&raw).map_err(|e| TransportError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    async fn send(&self, req: reqwest::RequestBuilder, url: &str) -> Result<HttpResponse, TransportError> {
        let resp = req.send().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header(API_KEY_HEADER, key),
            None => req,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
        let url = self.url(path)?;
        let label = url.to_string();
        self.send(self.client.get(url), &label).await
    }

    async fn put(&self, path: &str, body: String) -> Result<HttpResponse, TransportError> {
        let url = self.url(path)?;
        let label = url.to_string();
        let req = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);
        self.send(self.with_key(req), &label).await
    }

    async fn delete(&self, path: &str) -> Result<HttpResponse, TransportError> {
        let url = self.url(path)?;
        let label = url.to_string();
        let req = self.client.delete(url);
        self.send(self.with_key(req), &label).await
    }

    async fn probe(&self, url: &str) -> bool {
        let Ok(parsed) = self.url(url) else {
            return false;
        };
        match self.client.get(parsed).header(RANGE, "bytes=0-1").send().await {
            Ok(resp) => matches!(resp.status().as_u16(), 200 | 206),
            Err(e) => {
                tracing::debug!("probe of {} failed: {}", url, e);
                false
            }
        }
    }
}
