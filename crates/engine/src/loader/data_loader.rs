//! The loading orchestrator.
//!
//! [`DataLoader`] is the public entry point: cache lookup, override-source
//! preloading, collection-loader invocation and the two-phase cache
//! population pipeline. Three independent lock domains serialize the work:
//!
//! - override preload: one "is this source fetchable" check at a time, with
//!   confirmed-missing sources memoized for the session;
//! - phase 1: fetch raw data and populate the cache;
//! - phase 2: post-processing, reentrant through an explicit [`LockToken`] so
//!   nested loads triggered by dereferencing do not deadlock.
//!
//! Reads through [`DataLoader::get_from_cache`] never lock. While a load is in
//! flight they may observe phase-1 data; callers needing resolved data use
//! [`DataLoader::cache_and_get`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use grimoire_domain::{
    clean_collection, clean_source, CleanKey, Entity, RawBatch, SourceScope,
};
use serde::Serialize;
use tokio::sync::Mutex;

use super::cache::{CacheResult, EntityCache};
use super::catalog::PropCatalog;
use super::collection_loader::CollectionLoader;
use super::context::LoadContext;
use super::dereference::{RefKindRegistry, ReferenceResolver};
use super::error::LoaderError;
use super::lock::{LockToken, ReentrantLock};
use super::registry::LoaderRegistry;
use super::sources::SourceCatalog;
use crate::infrastructure::exclusion::NoExclusions;
use crate::infrastructure::notifier::TracingNotifier;
use crate::infrastructure::ports::{
    ContentFetcherPort, DereferenceFailures, ExclusionPort, HomebrewStorePort, NotifierPort,
};
use crate::infrastructure::settings::DEFAULT_MAX_DEREFERENCE_PASSES;

/// Collections that never have content of their own.
const NO_CONTENT_COLLECTIONS: &[&str] = &["generic", "hover"];

/// Options for entity lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Return an independent clone instead of the cached entity.
    pub copy: bool,
    /// Fail with [`LoaderError::NotFound`] instead of returning `None`.
    pub required: bool,
    /// Treat a collection with no loader as content-less instead of an error.
    pub silent: bool,
}

impl GetOptions {
    pub fn copied(mut self) -> Self {
        self.copy = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Counters for observing how much work the loader has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
    pub site_fetches: usize,
    pub post_cache_runs: usize,
    pub override_reads: usize,
    pub override_downloads: usize,
    pub cached_slots: usize,
}

#[derive(Default)]
struct OverridePreloadState {
    /// Sources confirmed to have no fetchable override package.
    missing: HashSet<String>,
    /// Clean source -> package URL, fetched at most once.
    index: Option<HashMap<String, String>>,
}

pub struct DataLoader {
    registry: LoaderRegistry,
    catalog: PropCatalog,
    cache: EntityCache,
    sources: Arc<SourceCatalog>,
    resolver: ReferenceResolver,
    fetcher: Arc<dyn ContentFetcherPort>,
    homebrew: Option<Arc<dyn HomebrewStorePort>>,
    exclusions: Arc<dyn ExclusionPort>,
    notifier: Arc<dyn NotifierPort>,
    override_preload: Mutex<OverridePreloadState>,
    phase1: Mutex<()>,
    phase2: ReentrantLock,
    /// Loaders whose post-processing is running in the current phase-2 section.
    active_post_cache: DashSet<String>,
    override_reads: AtomicUsize,
    override_downloads: AtomicUsize,
}

impl DataLoader {
    pub fn builder(fetcher: Arc<dyn ContentFetcherPort>) -> DataLoaderBuilder {
        DataLoaderBuilder::new(fetcher)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Cache-only lookup. Never loads.
    pub fn get_from_cache(
        &self,
        collection: &str,
        source: &str,
        hash: &str,
        options: GetOptions,
    ) -> Result<Option<Arc<Entity>>, LoaderError> {
        let key = CleanKey::new(collection, source, hash);
        let found = self.cache.get(&key).found();
        verify_required(&key, found.map(|e| maybe_copy(e, options.copy)), options.required)
    }

    /// Look up an entity, loading its collection on a miss.
    pub async fn cache_and_get(
        &self,
        collection: &str,
        source: &str,
        hash: &str,
        options: GetOptions,
    ) -> Result<Option<Arc<Entity>>, LoaderError> {
        self.cache_and_get_with_token(collection, source, hash, options, None)
            .await
    }

    /// Load every first-party entity of `collection` (both phases) and return them.
    /// `None` if the collection has no content.
    pub async fn cache_and_get_all_first_party(
        &self,
        collection: &str,
        silent: bool,
    ) -> Result<Option<Vec<Arc<Entity>>>, LoaderError> {
        self.all_first_party_with_token(collection, silent, None)
            .await
    }

    /// Load every currently registered override entity of `collection` and return them.
    /// Never downloads new override packages.
    pub async fn cache_and_get_all_override(
        &self,
        collection: &str,
        silent: bool,
    ) -> Result<Option<Vec<Arc<Entity>>>, LoaderError> {
        let collection_clean = clean_collection(collection);
        let Some(loader) = self.content_loader(&collection_clean, silent)? else {
            return Ok(None);
        };

        let (_, overrides) = self
            .phase1(&collection_clean, &SourceScope::AllOverrideCurrent, &loader)
            .await?;
        self.phase2(&loader, None, overrides, None).await?;

        Ok(Some(self.cache.get_all_override(&collection_clean)))
    }

    pub fn stats(&self) -> LoaderStats {
        let (site_fetches, post_cache_runs) = self
            .registry
            .loaders()
            .fold((0, 0), |(fetches, runs), loader| {
                (fetches + loader.site_fetches(), runs + loader.post_cache_runs())
            });
        LoaderStats {
            site_fetches,
            post_cache_runs,
            override_reads: self.override_reads.load(Ordering::Relaxed),
            override_downloads: self.override_downloads.load(Ordering::Relaxed),
            cached_slots: self.cache.len(),
        }
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    fn cache_and_get_with_token<'a>(
        &'a self,
        collection: &'a str,
        source: &'a str,
        hash: &'a str,
        options: GetOptions,
        token: Option<LockToken>,
    ) -> BoxFuture<'a, Result<Option<Arc<Entity>>, LoaderError>> {
        async move {
            let key = CleanKey::new(collection, source, hash);
            match self.cache.get(&key) {
                CacheResult::Found(entity) => return Ok(Some(maybe_copy(entity, options.copy))),
                CacheResult::ConfirmedAbsent => return verify_required(&key, None, options.required),
                CacheResult::NotLoaded => {}
            }

            tracing::debug!(key = %key, "Cache miss");

            let Some(loader) = self.content_loader(&key.collection, options.silent)? else {
                return verify_required(&key, None, options.required);
            };

            if self.preload_missing_override(&key.source).await? {
                tracing::debug!(source = %key.source, "Override source unavailable");
                return verify_required(&key, None, options.required);
            }

            let scope = SourceScope::Source(key.source.clone());
            let (site, overrides) = self.phase1(&key.collection, &scope, &loader).await?;
            self.phase2(&loader, site, overrides, token).await?;

            self.cache.mark_absent_if_vacant(key.clone());
            let found = self.cache.get(&key).found();
            verify_required(&key, found.map(|e| maybe_copy(e, options.copy)), options.required)
        }
        .boxed()
    }

    fn all_first_party_with_token<'a>(
        &'a self,
        collection: &'a str,
        silent: bool,
        token: Option<LockToken>,
    ) -> BoxFuture<'a, Result<Option<Vec<Arc<Entity>>>, LoaderError>> {
        async move {
            let collection_clean = clean_collection(collection);
            let Some(loader) = self.content_loader(&collection_clean, silent)? else {
                return Ok(None);
            };

            let (site, _) = self
                .phase1(&collection_clean, &SourceScope::AllFirstParty, &loader)
                .await?;
            self.phase2(&loader, site, None, token).await?;

            Ok(Some(self.cache.get_all_first_party(&collection_clean)))
        }
        .boxed()
    }

    /// The loader for a collection, or `None` for content-less collections.
    fn content_loader(
        &self,
        collection_clean: &str,
        silent: bool,
    ) -> Result<Option<Arc<CollectionLoader>>, LoaderError> {
        if NO_CONTENT_COLLECTIONS.contains(&collection_clean) {
            return Ok(None);
        }
        self.registry.resolve_checked(collection_clean, silent)
    }

    /// Make sure override content for `source_clean` is registered, downloading
    /// it if the homebrew index knows it. Returns `true` if the source is
    /// unavailable.
    async fn preload_missing_override(&self, source_clean: &str) -> Result<bool, LoaderError> {
        let mut state = self.override_preload.lock().await;

        if state.missing.contains(source_clean) {
            return Ok(true);
        }
        if self.sources.is_first_party(source_clean) {
            return Ok(false);
        }
        let Some(homebrew) = &self.homebrew else {
            state.missing.insert(source_clean.to_string());
            return Ok(true);
        };
        if homebrew.has_source_known(source_clean).await {
            return Ok(false);
        }

        if state.index.is_none() {
            let index = match homebrew.source_index().await {
                Ok(index) => index
                    .into_iter()
                    .map(|(source, url)| (clean_source(&source), url))
                    .collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read homebrew source index");
                    HashMap::new()
                }
            };
            state.index = Some(index);
        }

        let url = state
            .index
            .as_ref()
            .and_then(|index| index.get(source_clean))
            .cloned();
        let Some(url) = url else {
            state.missing.insert(source_clean.to_string());
            return Ok(true);
        };

        tracing::info!(source = %source_clean, url = %url, "Downloading override package");
        homebrew.add_from_url(&url).await?;
        self.override_downloads.fetch_add(1, Ordering::Relaxed);
        Ok(false)
    }

    /// Fetch raw data and populate the cache with it.
    async fn phase1(
        &self,
        collection_clean: &str,
        scope: &SourceScope,
        loader: &CollectionLoader,
    ) -> Result<(Option<Arc<RawBatch>>, Option<RawBatch>), LoaderError> {
        let _guard = self.phase1.lock().await;
        tracing::debug!(
            collection = %collection_clean,
            scope = %scope,
            loader = loader.name(),
            "Phase 1"
        );

        let site = loader.fetch_site_data(scope, self.fetcher.as_ref()).await?;
        self.add_to_cache(&site, |prop| loader.phase1_allows(prop));

        let is_site_scope = match scope {
            SourceScope::Source(source) => self.sources.is_first_party(source),
            SourceScope::AllFirstParty => true,
            SourceScope::AllOverrideCurrent => false,
        };
        if is_site_scope {
            return Ok((Some(site), None));
        }

        let Some(homebrew) = &self.homebrew else {
            return Ok((Some(site), None));
        };
        let overrides = loader
            .fetch_stored_override_data(Some(homebrew.as_ref()))
            .await?;
        self.override_reads.fetch_add(1, Ordering::Relaxed);
        self.add_to_cache(&overrides, |prop| loader.phase1_allows(prop));

        Ok((Some(site), Some(overrides)))
    }

    /// Post-process and insert the resolved data, for loaders that need it.
    async fn phase2(
        &self,
        loader: &CollectionLoader,
        site: Option<Arc<RawBatch>>,
        overrides: Option<RawBatch>,
        token: Option<LockToken>,
    ) -> Result<(), LoaderError> {
        if !loader.has_post_cache() {
            return Ok(());
        }
        if token.is_some() && self.active_post_cache.contains(loader.name()) {
            tracing::debug!(loader = loader.name(), "Post-processing already in progress");
            return Ok(());
        }

        let guard = self.phase2.lock(token).await;
        self.active_post_cache.insert(loader.name().to_string());
        let result = self
            .post_process_and_cache(loader, site, overrides, guard.token())
            .await;
        self.active_post_cache.remove(loader.name());
        drop(guard);
        result
    }

    /// Site output is cached before overrides are resolved, so override
    /// entities can reference first-party entities of the same collection.
    async fn post_process_and_cache(
        &self,
        loader: &CollectionLoader,
        site: Option<Arc<RawBatch>>,
        overrides: Option<RawBatch>,
        token: LockToken,
    ) -> Result<(), LoaderError> {
        let data = loader
            .compute_post_cache(site.as_deref(), None, &self.resolver, self, Some(token))
            .await?;
        if let Some(site) = &data.site {
            self.add_to_cache(site, |prop| loader.phase2_allows(prop));
        }

        if overrides.is_none() {
            return Ok(());
        }
        let data = loader
            .compute_post_cache(None, overrides.as_ref(), &self.resolver, self, Some(token))
            .await?;
        if let Some(overrides) = &data.overrides {
            self.add_to_cache(overrides, |prop| loader.phase2_allows(prop));
        }
        Ok(())
    }

    /// Insert every cacheable entity of `batch`. Slots already holding an
    /// entity are left untouched.
    fn add_to_cache(&self, batch: &RawBatch, allows: impl Fn(&str) -> bool) {
        let mut claimed: HashSet<&str> = HashSet::new();
        for manifest in self.registry.manifests() {
            if !manifest.claims(batch) {
                continue;
            }
            for (source, hash, pack) in manifest.packs(batch) {
                self.cache
                    .insert_if_vacant(CleanKey::new(&manifest.page, &source, &hash), Arc::new(pack));
            }
            claimed.insert(manifest.prop.as_str());
            claimed.insert(manifest.data_prop.as_str());
        }

        for (prop, entities) in batch.iter() {
            if claimed.contains(prop) || !allows(prop) {
                continue;
            }
            let Some(spec) = self.catalog.spec(prop) else {
                continue;
            };

            for entity in entities {
                let mut entity = entity.clone();
                entity.ensure_collection_origin(prop);
                let hash = spec.scheme.hash(&entity);
                let key = CleanKey::new(prop, entity.source().unwrap_or_default(), &hash);
                let entity = Arc::new(entity);

                if let Some(page) = &spec.page {
                    self.cache
                        .insert_if_vacant(key.with_collection(page), entity.clone());
                }
                self.cache.insert_if_vacant(key, entity);
            }
        }
    }
}

fn maybe_copy(entity: Arc<Entity>, copy: bool) -> Arc<Entity> {
    if copy {
        Arc::new((*entity).clone())
    } else {
        entity
    }
}

fn verify_required(
    key: &CleanKey,
    found: Option<Arc<Entity>>,
    required: bool,
) -> Result<Option<Arc<Entity>>, LoaderError> {
    match found {
        None if required => Err(LoaderError::not_found(&key.collection, &key.source, &key.hash)),
        found => Ok(found),
    }
}

#[async_trait]
impl LoadContext for DataLoader {
    fn cached(&self, collection: &str, source: &str, hash: &str) -> Option<Arc<Entity>> {
        self.cache.get(&CleanKey::new(collection, source, hash)).found()
    }

    fn is_excluded(&self, hash: &str, collection: &str, source: &str) -> bool {
        self.exclusions.is_excluded(hash, collection, source)
    }

    fn notify_failures(&self, failures: &DereferenceFailures) {
        self.notifier.notify_failed_dereferences(failures);
    }

    async fn preload_collection(
        &self,
        collection: &str,
        token: Option<LockToken>,
    ) -> Result<(), LoaderError> {
        tracing::debug!(collection = %collection, "Preloading reference targets");
        self.all_first_party_with_token(collection, true, token)
            .await
            .map(|_| ())
    }

    async fn cache_and_get_nested(
        &self,
        collection: &str,
        source: &str,
        hash: &str,
        token: Option<LockToken>,
    ) -> Result<Option<Arc<Entity>>, LoaderError> {
        self.cache_and_get_with_token(collection, source, hash, GetOptions::default(), token)
            .await
    }
}

// =============================================================================
// Builder
// =============================================================================

pub struct DataLoaderBuilder {
    fetcher: Arc<dyn ContentFetcherPort>,
    registry: LoaderRegistry,
    catalog: PropCatalog,
    ref_kinds: RefKindRegistry,
    sources: SourceCatalog,
    homebrew: Option<Arc<dyn HomebrewStorePort>>,
    exclusions: Arc<dyn ExclusionPort>,
    notifier: Arc<dyn NotifierPort>,
    max_passes: usize,
}

impl DataLoaderBuilder {
    pub fn new(fetcher: Arc<dyn ContentFetcherPort>) -> Self {
        Self {
            fetcher,
            registry: LoaderRegistry::new(),
            catalog: PropCatalog::new(),
            ref_kinds: RefKindRegistry::new(),
            sources: SourceCatalog::default(),
            homebrew: None,
            exclusions: Arc::new(NoExclusions),
            notifier: Arc::new(TracingNotifier),
            max_passes: DEFAULT_MAX_DEREFERENCE_PASSES,
        }
    }

    pub fn registry(mut self, registry: LoaderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn catalog(mut self, catalog: PropCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn ref_kinds(mut self, ref_kinds: RefKindRegistry) -> Self {
        self.ref_kinds = ref_kinds;
        self
    }

    pub fn sources(mut self, sources: SourceCatalog) -> Self {
        self.sources = sources;
        self
    }

    pub fn homebrew(mut self, homebrew: Arc<dyn HomebrewStorePort>) -> Self {
        self.homebrew = Some(homebrew);
        self
    }

    pub fn exclusions(mut self, exclusions: Arc<dyn ExclusionPort>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotifierPort>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn max_dereference_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn build(self) -> DataLoader {
        let sources = Arc::new(self.sources);
        DataLoader {
            registry: self.registry,
            catalog: self.catalog,
            cache: EntityCache::new(sources.clone()),
            sources,
            resolver: ReferenceResolver::new(Arc::new(self.ref_kinds), self.max_passes),
            fetcher: self.fetcher,
            homebrew: self.homebrew,
            exclusions: self.exclusions,
            notifier: self.notifier,
            override_preload: Mutex::new(OverridePreloadState::default()),
            phase1: Mutex::new(()),
            phase2: ReentrantLock::new("phase2"),
            active_post_cache: DashSet::new(),
            override_reads: AtomicUsize::new(0),
            override_downloads: AtomicUsize::new(0),
        }
    }
}
