//! Collection name -> loader lookup, with many-to-one aliasing.

use std::collections::HashMap;
use std::sync::Arc;

use grimoire_domain::clean_collection;

use super::collection_loader::{CollectionLoader, ManifestSpec};
use super::error::LoaderError;

#[derive(Default)]
pub struct LoaderRegistry {
    by_collection: HashMap<String, Arc<CollectionLoader>>,
    loaders: Vec<Arc<CollectionLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `loader` under every alias. Aliases are case-insensitive;
    /// a later registration of the same alias wins.
    pub fn register(self, loader: CollectionLoader, aliases: &[&str]) -> Self {
        self.register_shared(Arc::new(loader), aliases)
    }

    pub fn register_shared(mut self, loader: Arc<CollectionLoader>, aliases: &[&str]) -> Self {
        for alias in aliases {
            self.by_collection
                .insert(clean_collection(alias), loader.clone());
        }
        self.loaders.push(loader);
        self
    }

    pub fn resolve(&self, collection: &str) -> Option<Arc<CollectionLoader>> {
        self.by_collection.get(&clean_collection(collection)).cloned()
    }

    /// Resolve, treating a missing loader as a configuration error unless `silent`.
    pub fn resolve_checked(
        &self,
        collection: &str,
        silent: bool,
    ) -> Result<Option<Arc<CollectionLoader>>, LoaderError> {
        match self.resolve(collection) {
            Some(loader) => Ok(Some(loader)),
            None if silent => Ok(None),
            None => Err(LoaderError::no_loader(clean_collection(collection))),
        }
    }

    /// Every distinct loader, in registration order.
    pub fn loaders(&self) -> impl Iterator<Item = &Arc<CollectionLoader>> {
        self.loaders.iter()
    }

    /// Loaders with a custom cache strategy.
    pub fn manifests(&self) -> impl Iterator<Item = &ManifestSpec> {
        self.loaders.iter().filter_map(|loader| loader.manifest())
    }

    /// Number of registered aliases.
    pub fn len(&self) -> usize {
        self.by_collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_collection.is_empty()
    }
}
