//! Canonical cache keys.
//!
//! Every lookup into the entity cache goes through these helpers so that two
//! keys differing only by case land on the same slot.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix appended to a page collection to address its companion ("fluff") data.
pub const FLUFF_SUFFIX: &str = "fluff";

/// Prefix marking the phase-1 (pre-dereference) copy of a prop.
pub const RAW_PREFIX: &str = "raw_";

pub fn clean_collection(collection: &str) -> String {
    collection.to_lowercase()
}

pub fn clean_source(source: &str) -> String {
    source.to_lowercase()
}

pub fn clean_hash(hash: &str) -> String {
    hash.to_lowercase()
}

/// Collection name of the fluff variant of `collection`, e.g. `bestiary` -> `bestiaryfluff`.
pub fn fluff_collection(collection: &str) -> String {
    format!("{}{}", clean_collection(collection), FLUFF_SUFFIX)
}

/// Name under which the phase-1 copy of `prop` is cached, e.g. `classFeature` -> `raw_classFeature`.
pub fn raw_prop(prop: &str) -> String {
    format!("{RAW_PREFIX}{prop}")
}

/// Strip the phase-1 prefix, if present.
pub fn unraw_prop(prop: &str) -> &str {
    prop.strip_prefix(RAW_PREFIX).unwrap_or(prop)
}

/// A case-normalized (collection, source, hash) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CleanKey {
    pub collection: String,
    pub source: String,
    pub hash: String,
}

impl CleanKey {
    pub fn new(collection: &str, source: &str, hash: &str) -> Self {
        Self {
            collection: clean_collection(collection),
            source: clean_source(source),
            hash: clean_hash(hash),
        }
    }

    /// The same source/hash under another collection (used for page aliases).
    pub fn with_collection(&self, collection: &str) -> Self {
        Self {
            collection: clean_collection(collection),
            source: self.source.clone(),
            hash: self.hash.clone(),
        }
    }
}

impl fmt::Display for CleanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.collection, self.source, self.hash)
    }
}

/// Which sources a phase-1 load covers.
///
/// The two pseudo-scopes are used by the bulk "get all" operations; they never
/// trigger an override-source preload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceScope {
    /// A single, already cleaned source.
    Source(String),
    /// Every first-party source.
    AllFirstParty,
    /// Every override package currently held by the homebrew store.
    AllOverrideCurrent,
}

impl SourceScope {
    pub fn source(source: &str) -> Self {
        Self::Source(clean_source(source))
    }

    pub fn as_source(&self) -> Option<&str> {
        match self {
            Self::Source(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(s) => write!(f, "{s}"),
            Self::AllFirstParty => write!(f, "<all first-party>"),
            Self::AllOverrideCurrent => write!(f, "<all current override>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_differing_by_case_are_equal() {
        assert_eq!(
            CleanKey::new("Monster", "PHB", "Goblin_phb"),
            CleanKey::new("monster", "phb", "goblin_phb")
        );
    }

    #[test]
    fn fluff_collection_appends_suffix_to_clean_name() {
        assert_eq!(fluff_collection("Bestiary"), "bestiaryfluff");
    }

    #[test]
    fn raw_prefix_round_trips() {
        assert_eq!(raw_prop("classFeature"), "raw_classFeature");
        assert_eq!(unraw_prop("raw_classFeature"), "classFeature");
        assert_eq!(unraw_prop("spell"), "spell");
    }

    #[test]
    fn with_collection_keeps_source_and_hash() {
        let key = CleanKey::new("monster", "MM", "Goblin_MM");
        let alias = key.with_collection("Bestiary");
        assert_eq!(alias.collection, "bestiary");
        assert_eq!(alias.source, "mm");
        assert_eq!(alias.hash, "goblin_mm");
    }

    #[test]
    fn source_scope_cleans_source() {
        assert_eq!(SourceScope::source("XGE").as_source(), Some("xge"));
        assert_eq!(SourceScope::AllFirstParty.as_source(), None);
    }
}
