//! Collection loading strategies.
//!
//! A [`CollectionLoader`] knows how to fetch first-party raw data for a
//! collection, how to read already-registered override data, and, for
//! composite collections, how to post-process both into cache-ready form.
//! The loading shape is a closed set of variants ([`LoaderKind`]).

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use grimoire_domain::{
    clean_source, encode_for_hash, raw_prop, Entity, HashScheme, RawBatch, SourceScope,
};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use super::class_assembly;
use super::context::LoadContext;
use super::dereference::{ReferenceResolver, ResolveOptions};
use super::error::LoaderError;
use super::lock::LockToken;
use crate::infrastructure::ports::{
    BespokeLoaderPort, ContentFetcherPort, FetchError, HomebrewStorePort,
};

/// A set of data files merged into one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSet {
    Single(String),
    Many(Vec<String>),
    /// An index file mapping keys to file names relative to the index's directory.
    Indexed(String),
}

impl FileSet {
    async fn load(&self, fetcher: &dyn ContentFetcherPort) -> Result<RawBatch, LoaderError> {
        match self {
            Self::Single(path) => load_batch(fetcher, path).await,
            Self::Many(paths) => {
                let mut batch = RawBatch::new();
                for path in paths {
                    batch.merge(load_batch(fetcher, path).await?);
                }
                Ok(batch)
            }
            Self::Indexed(index_path) => {
                let dir = parent_dir(index_path);
                let mut batch = RawBatch::new();
                for file in index_files(fetcher, index_path).await? {
                    batch.merge(load_batch(fetcher, &join_path(dir, &file)).await?);
                }
                Ok(batch)
            }
        }
    }
}

/// One dereferencing step of a composite loader.
#[derive(Debug, Clone)]
pub struct DereferencePass {
    pub prop: String,
    pub scheme: HashScheme,
    pub options: ResolveOptions,
}

impl DereferencePass {
    pub fn new(prop: &str, scheme: HashScheme, options: ResolveOptions) -> Self {
        Self {
            prop: prop.to_string(),
            scheme,
            options,
        }
    }
}

/// Adventure/book style collections: an index of contents plus one data file per id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSpec {
    pub page: String,
    pub prop: String,
    pub data_prop: String,
    pub index_path: String,
    pub data_dir: String,
}

impl ManifestSpec {
    /// Whether `batch` holds anything this manifest caches itself.
    pub fn claims(&self, batch: &RawBatch) -> bool {
        batch.contains(&self.prop) || batch.contains(&self.data_prop)
    }

    /// Pack every id present in both the contents and the data props into one
    /// `{prop: contents, data_prop: data}` entity keyed like the contents.
    /// Returns `(source, hash, pack)` triples.
    pub fn packs(&self, batch: &RawBatch) -> Vec<(String, String, Entity)> {
        let scheme = HashScheme::fields(&["id"]);
        let contents = batch.get(&self.prop);

        batch
            .get(&self.data_prop)
            .iter()
            .filter_map(|data| {
                let id = data.get_str("id")?;
                let content = contents.iter().find(|c| c.get_str("id") == Some(id))?;
                let source = content.source()?.to_string();
                let hash = scheme.hash(content);

                let mut data = data.clone();
                if let Some(entries) = data.get_mut("data") {
                    tag_map_regions(entries, &self.page, &source, &hash);
                }

                let mut pack = Entity::default();
                pack.insert(self.prop.clone(), content.to_value());
                pack.insert(self.data_prop.clone(), data.into_value());
                Some((source, hash, pack))
            })
            .collect()
    }

    async fn load(
        &self,
        fetcher: &dyn ContentFetcherPort,
        scope: &SourceScope,
    ) -> Result<RawBatch, LoaderError> {
        if matches!(scope, SourceScope::AllOverrideCurrent) {
            return Ok(RawBatch::new());
        }

        let index = load_batch(fetcher, &self.index_path).await?;
        let mut batch = RawBatch::new();
        for contents in index.get(&self.prop) {
            if let SourceScope::Source(source) = scope {
                if contents.source().map(clean_source).as_deref() != Some(source.as_str()) {
                    continue;
                }
            }
            let Some(id) = contents.get_str("id") else {
                continue;
            };
            let path = format!(
                "{}/{}-{}.json",
                self.data_dir,
                self.prop,
                encode_for_hash(&[id])
            );
            let payload = fetcher.fetch_json(&path).await?;
            let Value::Object(fields) = payload else {
                return Err(FetchError::parse(&path, "payload is not a JSON object").into());
            };

            let mut data = Map::new();
            if let Some(source) = contents.get("source") {
                data.insert("source".to_string(), source.clone());
            }
            data.insert("id".to_string(), Value::String(id.to_string()));
            data.extend(fields);

            batch.extend(&self.prop, [contents.clone()]);
            batch.extend(&self.data_prop, [Entity::new(data)]);

            if matches!(scope, SourceScope::Source(_)) {
                break;
            }
        }
        Ok(batch)
    }
}

/// Loading shape of a collection.
#[derive(Clone)]
pub enum LoaderKind {
    /// One file holds every source.
    SingleFile { path: String },
    /// One file per source, listed in `<dir>/index.json` (`{source: file}`).
    MultiSource { prop: String, dir: String },
    /// A hand-written loader.
    Predefined { loader: Arc<dyn BespokeLoaderPort> },
    /// Entities referencing each other, resolved in a post-cache phase.
    /// `stage_raw` props are exposed as `raw_<prop>` in phase 1.
    Dereferenced {
        files: FileSet,
        passes: Vec<DereferencePass>,
        stage_raw: Vec<String>,
    },
    /// Classes and subclasses, whose feature lists are assembled post-cache.
    ClassAssembly { files: FileSet },
    Manifest(ManifestSpec),
}

impl LoaderKind {
    fn label(&self) -> &'static str {
        match self {
            Self::SingleFile { .. } => "single-file",
            Self::MultiSource { .. } => "multi-source",
            Self::Predefined { .. } => "predefined",
            Self::Dereferenced { .. } => "dereferenced",
            Self::ClassAssembly { .. } => "class-assembly",
            Self::Manifest(_) => "manifest",
        }
    }

    /// Props renamed to `raw_` in phase 1.
    fn staged_props(&self) -> Vec<&str> {
        match self {
            Self::Dereferenced { stage_raw, .. } => stage_raw.iter().map(String::as_str).collect(),
            Self::ClassAssembly { .. } => vec!["class", "subclass"],
            _ => Vec::new(),
        }
    }
}

/// Post-processed data, ready for phase-2 insertion.
#[derive(Debug, Clone, Default)]
pub struct PostCacheData {
    pub site: Option<Arc<RawBatch>>,
    pub overrides: Option<RawBatch>,
}

pub struct CollectionLoader {
    name: String,
    kind: LoaderKind,
    prop_allowlist: Option<HashSet<String>>,
    phase1_allowlist: Option<HashSet<String>>,
    post_cache: bool,
    site_data: DashMap<String, Arc<OnceCell<Arc<RawBatch>>>>,
    site_post_cache: OnceCell<Arc<RawBatch>>,
    site_fetches: AtomicUsize,
    post_cache_runs: AtomicUsize,
}

impl CollectionLoader {
    pub fn new(name: &str, kind: LoaderKind) -> Self {
        let post_cache = matches!(
            kind,
            LoaderKind::Dereferenced { .. } | LoaderKind::ClassAssembly { .. }
        );
        Self {
            name: name.to_string(),
            kind,
            prop_allowlist: None,
            phase1_allowlist: None,
            post_cache,
            site_data: DashMap::new(),
            site_post_cache: OnceCell::new(),
            site_fetches: AtomicUsize::new(0),
            post_cache_runs: AtomicUsize::new(0),
        }
    }

    pub fn single_file(name: &str, path: &str) -> Self {
        Self::new(
            name,
            LoaderKind::SingleFile {
                path: path.to_string(),
            },
        )
    }

    pub fn multi_source(name: &str, prop: &str, dir: &str) -> Self {
        Self::new(
            name,
            LoaderKind::MultiSource {
                prop: prop.to_string(),
                dir: dir.to_string(),
            },
        )
    }

    pub fn predefined(loader: Arc<dyn BespokeLoaderPort>) -> Self {
        let name = loader.name().to_string();
        Self::new(&name, LoaderKind::Predefined { loader })
    }

    /// Props eligible for caching from this loader's payloads.
    pub fn with_prop_allowlist(mut self, props: &[&str]) -> Self {
        self.prop_allowlist = Some(props.iter().map(|p| (*p).to_string()).collect());
        self
    }

    /// Narrower allowlist for phase 1, for loaders whose phase-1 output is premature.
    pub fn with_phase1_allowlist(mut self, props: &[&str]) -> Self {
        self.phase1_allowlist = Some(props.iter().map(|p| (*p).to_string()).collect());
        self
    }

    /// The same loading shape with no post-cache phase; serves `raw_` aliases.
    pub fn without_post_cache(&self) -> Self {
        Self {
            name: format!("{}:raw", self.name),
            kind: self.kind.clone(),
            prop_allowlist: self.prop_allowlist.clone(),
            phase1_allowlist: self.phase1_allowlist.clone(),
            post_cache: false,
            site_data: DashMap::new(),
            site_post_cache: OnceCell::new(),
            site_fetches: AtomicUsize::new(0),
            post_cache_runs: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &LoaderKind {
        &self.kind
    }

    pub fn has_post_cache(&self) -> bool {
        self.post_cache
    }

    /// Site fetches actually issued (memoized calls excluded).
    pub fn site_fetches(&self) -> usize {
        self.site_fetches.load(Ordering::Relaxed)
    }

    /// Post-processing runs actually performed.
    pub fn post_cache_runs(&self) -> usize {
        self.post_cache_runs.load(Ordering::Relaxed)
    }

    pub fn manifest(&self) -> Option<&ManifestSpec> {
        match &self.kind {
            LoaderKind::Manifest(spec) => Some(spec),
            _ => None,
        }
    }

    /// Without an explicit phase-1 allowlist, props a dereferencing pass rewrites
    /// in place are held back until phase 2.
    pub fn phase1_allows(&self, prop: &str) -> bool {
        if let Some(allowed) = &self.phase1_allowlist {
            return allowed.contains(prop);
        }
        if let LoaderKind::Dereferenced { passes, stage_raw, .. } = &self.kind {
            let rewritten = passes
                .iter()
                .any(|pass| pass.prop == prop && !stage_raw.contains(&pass.prop));
            if rewritten {
                return false;
            }
        }
        self.phase2_allows(prop)
    }

    pub fn phase2_allows(&self, prop: &str) -> bool {
        self.prop_allowlist
            .as_ref()
            .map_or(true, |allowed| allowed.contains(prop))
    }

    /// Memoization key of the first-party fetch for `scope`.
    pub fn site_ident(&self, scope: &SourceScope) -> String {
        match &self.kind {
            LoaderKind::SingleFile { path } => path.clone(),
            LoaderKind::MultiSource { prop, .. } => format!("{prop}__{scope}"),
            LoaderKind::Predefined { loader } => loader.name().to_string(),
            LoaderKind::Dereferenced { .. } | LoaderKind::ClassAssembly { .. } => self.name.clone(),
            LoaderKind::Manifest(spec) => format!("{}__{scope}", spec.page),
        }
    }

    /// First-party raw data. Concurrent and repeated calls for one site ident
    /// share a single fetch; failed fetches are not memoized.
    pub async fn fetch_site_data(
        &self,
        scope: &SourceScope,
        fetcher: &dyn ContentFetcherPort,
    ) -> Result<Arc<RawBatch>, LoaderError> {
        let ident = self.site_ident(scope);
        let cell = self
            .site_data
            .entry(ident.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(|| async {
            tracing::debug!(
                loader = %self.name,
                kind = self.kind.label(),
                ident = %ident,
                "Fetching site data"
            );
            self.site_fetches.fetch_add(1, Ordering::Relaxed);
            self.load_site(scope, fetcher).await.map(Arc::new)
        })
        .await
        .cloned()
    }

    async fn load_site(
        &self,
        scope: &SourceScope,
        fetcher: &dyn ContentFetcherPort,
    ) -> Result<RawBatch, LoaderError> {
        match &self.kind {
            LoaderKind::SingleFile { path } => load_batch(fetcher, path).await,
            LoaderKind::MultiSource { prop, dir } => load_multi_source(fetcher, prop, dir, scope).await,
            LoaderKind::Predefined { loader } => loader
                .load_site(fetcher)
                .await
                .map_err(|e| LoaderError::bespoke(loader.name(), e)),
            LoaderKind::Dereferenced { files, stage_raw, .. } => {
                let batch = files.load(fetcher).await?;
                if stage_raw.is_empty() {
                    Ok(batch)
                } else {
                    Ok(batch.raw_prefixed(&self.kind.staged_props()))
                }
            }
            LoaderKind::ClassAssembly { files } => {
                let batch = files.load(fetcher).await?;
                Ok(batch.raw_prefixed(&self.kind.staged_props()))
            }
            LoaderKind::Manifest(spec) => spec.load(fetcher, scope).await,
        }
    }

    /// Override data already registered with the homebrew store. Never fetches.
    pub async fn fetch_stored_override_data(
        &self,
        homebrew: Option<&dyn HomebrewStorePort>,
    ) -> Result<RawBatch, LoaderError> {
        let Some(homebrew) = homebrew else {
            return Ok(RawBatch::new());
        };
        let processed = homebrew.processed_override_data().await?;

        match &self.kind {
            LoaderKind::Predefined { loader } => loader
                .load_override(&processed)
                .await
                .map_err(|e| LoaderError::bespoke(loader.name(), e)),
            LoaderKind::Dereferenced { stage_raw, .. } if !stage_raw.is_empty() => {
                Ok(processed.raw_prefixed(&self.kind.staged_props()))
            }
            LoaderKind::ClassAssembly { .. } => {
                Ok(processed.raw_prefixed(&self.kind.staged_props()))
            }
            _ => Ok((*processed).clone()),
        }
    }

    /// Post-process site and override data. Site output is memoized for the
    /// lifetime of the loader; override output is recomputed on every call.
    pub async fn compute_post_cache(
        &self,
        site: Option<&RawBatch>,
        overrides: Option<&RawBatch>,
        resolver: &ReferenceResolver,
        ctx: &dyn LoadContext,
        token: Option<LockToken>,
    ) -> Result<PostCacheData, LoaderError> {
        if !self.post_cache {
            return Ok(PostCacheData::default());
        }

        let site = match site {
            Some(site) => Some(
                self.site_post_cache
                    .get_or_try_init(|| async {
                        tracing::debug!(loader = %self.name, "Computing site post-cache data");
                        self.post_process(site, resolver, ctx, token)
                            .await
                            .map(Arc::new)
                    })
                    .await?
                    .clone(),
            ),
            None => None,
        };

        let overrides = match overrides {
            Some(overrides) => Some(self.post_process(overrides, resolver, ctx, token).await?),
            None => None,
        };

        Ok(PostCacheData { site, overrides })
    }

    async fn post_process(
        &self,
        batch: &RawBatch,
        resolver: &ReferenceResolver,
        ctx: &dyn LoadContext,
        token: Option<LockToken>,
    ) -> Result<RawBatch, LoaderError> {
        self.post_cache_runs.fetch_add(1, Ordering::Relaxed);
        match &self.kind {
            LoaderKind::Dereferenced {
                passes, stage_raw, ..
            } => {
                let mut out = RawBatch::new();
                for pass in passes {
                    let input = if out.contains(&pass.prop) {
                        out.take(&pass.prop)
                    } else if stage_raw.contains(&pass.prop) {
                        batch.get(&raw_prop(&pass.prop)).to_vec()
                    } else {
                        batch.get(&pass.prop).to_vec()
                    };
                    if input.is_empty() {
                        continue;
                    }

                    let outcome = resolver
                        .resolve_all(input, &pass.prop, &pass.scheme, &pass.options, ctx, token)
                        .await;
                    if !outcome.failures.is_empty() {
                        ctx.notify_failures(&outcome.failures);
                    }
                    out.insert(pass.prop.clone(), outcome.entities);
                }
                Ok(out)
            }
            LoaderKind::ClassAssembly { .. } => class_assembly::assemble(batch, ctx, token).await,
            _ => Ok(RawBatch::new()),
        }
    }
}

async fn load_batch(fetcher: &dyn ContentFetcherPort, path: &str) -> Result<RawBatch, LoaderError> {
    let payload = fetcher.fetch_json(path).await?;
    RawBatch::from_json(payload).map_err(|e| FetchError::parse(path, e).into())
}

/// File names listed by an index (`{key: file}`), in key order.
async fn index_files(
    fetcher: &dyn ContentFetcherPort,
    index_path: &str,
) -> Result<Vec<String>, LoaderError> {
    let index = fetcher.fetch_json(index_path).await?;
    let Value::Object(entries) = index else {
        return Err(FetchError::parse(index_path, "index is not a JSON object").into());
    };
    Ok(entries
        .into_iter()
        .filter_map(|(_, file)| file.as_str().map(str::to_string))
        .collect())
}

async fn load_multi_source(
    fetcher: &dyn ContentFetcherPort,
    prop: &str,
    dir: &str,
    scope: &SourceScope,
) -> Result<RawBatch, LoaderError> {
    let index_path = join_path(dir, "index.json");
    match scope {
        SourceScope::AllOverrideCurrent => Ok(RawBatch::new()),
        SourceScope::AllFirstParty => {
            let mut batch = RawBatch::new();
            for file in index_files(fetcher, &index_path).await? {
                batch.merge(load_batch(fetcher, &join_path(dir, &file)).await?);
            }
            Ok(batch)
        }
        SourceScope::Source(source) => {
            let index = fetcher.fetch_json(&index_path).await?;
            let file = index.as_object().and_then(|entries| {
                entries
                    .iter()
                    .find(|(key, _)| clean_source(key) == *source)
                    .and_then(|(_, file)| file.as_str())
            });
            match file {
                Some(file) => load_batch(fetcher, &join_path(dir, file)).await,
                None => {
                    tracing::debug!(prop = %prop, source = %source, "No site file for source");
                    Ok(RawBatch::new())
                }
            }
        }
    }
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn join_path(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

/// Give every image with map regions a back-reference to the page entity that owns it.
fn tag_map_regions(value: &mut Value, page: &str, source: &str, hash: &str) {
    match value {
        Value::Array(items) => {
            for item in items {
                tag_map_regions(item, page, source, hash);
            }
        }
        Value::Object(obj) => {
            let is_mapped_image = obj.get("type").and_then(Value::as_str) == Some("image")
                && obj.contains_key("mapRegions");
            if is_mapped_image {
                for (key, fallback) in [("page", page), ("source", source), ("hash", hash)] {
                    obj.entry(key)
                        .or_insert_with(|| Value::String(fallback.to_string()));
                }
            }
            for child in obj.values_mut() {
                tag_map_regions(child, page, source, hash);
            }
        }
        _ => {}
    }
}
