//! Three-tier entity cache.
//!
//! A primary `(collection, source, hash)` table plus two bulk partitions per
//! collection: first-party entities and override entities. The partition an
//! entity lands in is decided once, when it is inserted, from its key's source.
//!
//! The cache is session-scoped and never evicts.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use grimoire_domain::{CleanKey, Entity};

use super::sources::SourceCatalog;

/// What a slot holds once a lookup has happened.
#[derive(Debug, Clone)]
pub enum CacheSlot {
    Entity(Arc<Entity>),
    /// Confirmed absent after a full load attempt.
    Absent,
}

/// Result of a cache read.
#[derive(Debug, Clone)]
pub enum CacheResult {
    Found(Arc<Entity>),
    ConfirmedAbsent,
    NotLoaded,
}

impl CacheResult {
    pub fn found(self) -> Option<Arc<Entity>> {
        match self {
            Self::Found(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

type Partition = DashMap<String, BTreeMap<(String, String), Arc<Entity>>>;

pub struct EntityCache {
    primary: DashMap<CleanKey, CacheSlot>,
    first_party: Partition,
    overrides: Partition,
    sources: Arc<SourceCatalog>,
}

impl EntityCache {
    pub fn new(sources: Arc<SourceCatalog>) -> Self {
        Self {
            primary: DashMap::new(),
            first_party: DashMap::new(),
            overrides: DashMap::new(),
            sources,
        }
    }

    pub fn get(&self, key: &CleanKey) -> CacheResult {
        match self.primary.get(key).map(|slot| slot.value().clone()) {
            Some(CacheSlot::Entity(entity)) => CacheResult::Found(entity),
            Some(CacheSlot::Absent) => CacheResult::ConfirmedAbsent,
            None => CacheResult::NotLoaded,
        }
    }

    pub fn get_all_first_party(&self, collection_clean: &str) -> Vec<Arc<Entity>> {
        partition_values(&self.first_party, collection_clean)
    }

    pub fn get_all_override(&self, collection_clean: &str) -> Vec<Arc<Entity>> {
        partition_values(&self.overrides, collection_clean)
    }

    /// Insert or replace a slot.
    pub fn set(&self, key: CleanKey, slot: CacheSlot) {
        if let CacheSlot::Entity(entity) = &slot {
            self.add_to_partition(&key, entity.clone());
        }
        self.primary.insert(key, slot);
    }

    /// Insert `entity` unless the slot already holds an entity. Returns whether it was inserted.
    pub fn insert_if_vacant(&self, key: CleanKey, entity: Arc<Entity>) -> bool {
        match self.primary.entry(key) {
            Entry::Occupied(mut occupied) => {
                if matches!(occupied.get(), CacheSlot::Entity(_)) {
                    return false;
                }
                self.add_to_partition(occupied.key(), entity.clone());
                occupied.insert(CacheSlot::Entity(entity));
                true
            }
            Entry::Vacant(vacant) => {
                self.add_to_partition(vacant.key(), entity.clone());
                vacant.insert(CacheSlot::Entity(entity));
                true
            }
        }
    }

    /// Record a confirmed miss, unless the slot has already been filled.
    pub fn mark_absent_if_vacant(&self, key: CleanKey) {
        self.primary.entry(key).or_insert(CacheSlot::Absent);
    }

    /// Number of populated slots (entities and confirmed misses).
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    fn add_to_partition(&self, key: &CleanKey, entity: Arc<Entity>) {
        let partition = if self.sources.is_first_party(&key.source) {
            &self.first_party
        } else {
            &self.overrides
        };
        partition
            .entry(key.collection.clone())
            .or_default()
            .insert((key.source.clone(), key.hash.clone()), entity);
    }
}

fn partition_values(partition: &Partition, collection_clean: &str) -> Vec<Arc<Entity>> {
    partition
        .get(collection_clean)
        .map(|entities| entities.values().cloned().collect())
        .unwrap_or_default()
}
