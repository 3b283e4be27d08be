//! Raw content fetchers (filesystem and HTTP).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::fs;

use crate::infrastructure::ports::{ContentFetcherPort, FetchError};

/// Reads payloads from a local data directory.
#[derive(Debug, Clone)]
pub struct FsContentFetcher {
    root: PathBuf,
}

impl FsContentFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FetchError> {
        // Data paths are relative and may not climb out of the root.
        if path.split('/').any(|segment| segment == "..") || Path::new(path).is_absolute() {
            return Err(FetchError::not_found(path));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ContentFetcherPort for FsContentFetcher {
    async fn fetch_json(&self, path: &str) -> Result<Value, FetchError> {
        let full = self.resolve(path)?;
        let bytes = match fs::read(&full).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::not_found(path))
            }
            Err(e) => return Err(FetchError::io(path, e)),
        };
        tracing::debug!(path = %full.display(), bytes = bytes.len(), "Read content file");
        serde_json::from_slice(&bytes).map_err(|e| FetchError::parse(path, e))
    }
}

/// Fetches payloads over HTTP relative to a base URL.
///
/// Absolute `http(s)://` paths (homebrew package URLs) are fetched as-is.
#[derive(Clone)]
pub struct HttpContentFetcher {
    client: Client,
    base_url: String,
}

impl HttpContentFetcher {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, 30)
    }

    pub fn with_timeout(base_url: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl ContentFetcherPort for HttpContentFetcher {
    async fn fetch_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = self.url_for(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::http(&url, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::not_found(&url));
        }
        if !response.status().is_success() {
            return Err(FetchError::http(&url, format!("status {}", response.status())));
        }

        tracing::debug!(url = %url, "Fetched content");
        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::parse(&url, e))
    }
}
