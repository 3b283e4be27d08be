//! In-memory homebrew store.
//!
//! Holds override packages registered for the session. Packages are plain
//! payloads (`{"_meta": {"sources": [...]}, "<prop>": [...]}`); their sources
//! are taken from `_meta.sources[].json` plus the sources of their entities.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use grimoire_domain::{clean_source, RawBatch};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::infrastructure::ports::{ContentFetcherPort, HomebrewError, HomebrewStorePort};

struct HomebrewPackage {
    origin: String,
    sources: HashSet<String>,
    batch: RawBatch,
}

pub struct InMemoryHomebrewStore {
    fetcher: Arc<dyn ContentFetcherPort>,
    index_path: Option<String>,
    packages: RwLock<Vec<HomebrewPackage>>,
    merged: RwLock<Arc<RawBatch>>,
}

impl InMemoryHomebrewStore {
    pub fn new(fetcher: Arc<dyn ContentFetcherPort>) -> Self {
        Self {
            fetcher,
            index_path: None,
            packages: RwLock::new(Vec::new()),
            merged: RwLock::new(Arc::new(RawBatch::new())),
        }
    }

    /// Location of the `{source: url}` index consulted for unknown sources.
    pub fn with_index_path(mut self, index_path: impl Into<String>) -> Self {
        self.index_path = Some(index_path.into());
        self
    }

    /// Register a package payload under `origin` (a URL or a label).
    pub async fn register(&self, origin: &str, payload: Value) -> Result<(), HomebrewError> {
        let meta_sources = meta_sources(&payload);
        let batch = RawBatch::from_json(payload).map_err(HomebrewError::invalid)?;

        let mut sources: HashSet<String> = meta_sources;
        for (_, entities) in batch.iter() {
            sources.extend(entities.iter().filter_map(|e| e.source()).map(clean_source));
        }

        tracing::info!(
            origin = %origin,
            sources = sources.len(),
            entities = batch.len(),
            "Registered homebrew package"
        );

        let mut packages = self.packages.write().await;
        packages.retain(|p| p.origin != origin);
        packages.push(HomebrewPackage {
            origin: origin.to_string(),
            sources,
            batch,
        });

        let mut merged = RawBatch::new();
        for package in packages.iter() {
            merged.merge(package.batch.clone());
        }
        *self.merged.write().await = Arc::new(merged);
        Ok(())
    }

    pub async fn package_count(&self) -> usize {
        self.packages.read().await.len()
    }
}

fn meta_sources(payload: &Value) -> HashSet<String> {
    payload
        .get("_meta")
        .and_then(|m| m.get("sources"))
        .and_then(Value::as_array)
        .map(|sources| {
            sources
                .iter()
                .filter_map(|s| s.get("json").and_then(Value::as_str))
                .map(clean_source)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl HomebrewStorePort for InMemoryHomebrewStore {
    async fn has_source_known(&self, source_clean: &str) -> bool {
        self.packages
            .read()
            .await
            .iter()
            .any(|p| p.sources.contains(source_clean))
    }

    async fn processed_override_data(&self) -> Result<Arc<RawBatch>, HomebrewError> {
        Ok(self.merged.read().await.clone())
    }

    async fn source_index(&self) -> Result<HashMap<String, String>, HomebrewError> {
        let Some(index_path) = &self.index_path else {
            return Ok(HashMap::new());
        };
        let index = self.fetcher.fetch_json(index_path).await?;
        let Value::Object(map) = index else {
            return Err(HomebrewError::invalid(format!(
                "{index_path} is not a source index object"
            )));
        };
        Ok(map
            .into_iter()
            .filter_map(|(source, url)| url.as_str().map(|u| (source, u.to_string())))
            .collect())
    }

    async fn add_from_url(&self, url: &str) -> Result<(), HomebrewError> {
        let payload = self.fetcher.fetch_json(url).await?;
        self.register(url, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{FetchError, MockContentFetcherPort};
    use serde_json::json;

    fn package() -> Value {
        json!({
            "_meta": {"sources": [{"json": "MyBrew"}]},
            "monster": [{"name": "Glorp", "source": "MyBrew"}],
            "spell": [{"name": "Zap", "source": "OtherBrew"}]
        })
    }

    #[tokio::test]
    async fn register_tracks_meta_and_entity_sources() {
        let store = InMemoryHomebrewStore::new(Arc::new(MockContentFetcherPort::new()));
        store.register("local", package()).await.expect("register");

        assert!(store.has_source_known("mybrew").await);
        assert!(store.has_source_known("otherbrew").await);
        assert!(!store.has_source_known("phb").await);

        let merged = store.processed_override_data().await.expect("merged");
        assert_eq!(merged.get("monster").len(), 1);
        assert_eq!(merged.get("spell").len(), 1);
    }

    #[tokio::test]
    async fn re_registering_an_origin_replaces_it() {
        let store = InMemoryHomebrewStore::new(Arc::new(MockContentFetcherPort::new()));
        store.register("local", package()).await.expect("first");
        store.register("local", package()).await.expect("second");
        assert_eq!(store.package_count().await, 1);
        let merged = store.processed_override_data().await.expect("merged");
        assert_eq!(merged.get("monster").len(), 1);
    }

    #[tokio::test]
    async fn add_from_url_fetches_and_registers() {
        let mut fetcher = MockContentFetcherPort::new();
        fetcher
            .expect_fetch_json()
            .withf(|path| path == "https://brew.example.org/mybrew.json")
            .times(1)
            .returning(|_| Ok(package()));

        let store = InMemoryHomebrewStore::new(Arc::new(fetcher));
        store
            .add_from_url("https://brew.example.org/mybrew.json")
            .await
            .expect("add");
        assert!(store.has_source_known("mybrew").await);
    }

    #[tokio::test]
    async fn source_index_without_path_is_empty() {
        let store = InMemoryHomebrewStore::new(Arc::new(MockContentFetcherPort::new()));
        assert!(store.source_index().await.expect("index").is_empty());
    }

    #[tokio::test]
    async fn source_index_propagates_fetch_errors() {
        let mut fetcher = MockContentFetcherPort::new();
        fetcher
            .expect_fetch_json()
            .returning(|p| Err(FetchError::not_found(p)));
        let store = InMemoryHomebrewStore::new(Arc::new(fetcher)).with_index_path("brew/index.json");
        assert!(matches!(
            store.source_index().await,
            Err(HomebrewError::Fetch(_))
        ));
    }
}
