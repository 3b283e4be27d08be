//! Content-exclusion policy.
//!
//! Rules are `(hash, category, source)` triples where any part may be `*`.
//! A dereference whose target matches a rule resolves to an empty placeholder
//! instead of being reported as missing.

use grimoire_domain::{clean_collection, clean_hash, clean_source};
use serde::Deserialize;
use serde_json::Value;

use crate::infrastructure::ports::{ExclusionPort, FetchError};

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExclusionRule {
    #[serde(default = "wildcard")]
    pub hash: String,
    #[serde(default = "wildcard")]
    pub category: String,
    #[serde(default = "wildcard")]
    pub source: String,
}

fn wildcard() -> String {
    WILDCARD.to_string()
}

impl ExclusionRule {
    pub fn new(hash: &str, category: &str, source: &str) -> Self {
        Self {
            hash: hash.to_string(),
            category: category.to_string(),
            source: source.to_string(),
        }
    }

    fn matches(&self, hash: &str, category: &str, source: &str) -> bool {
        part_matches(&self.hash, hash, clean_hash)
            && part_matches(&self.category, category, clean_collection)
            && part_matches(&self.source, source, clean_source)
    }
}

fn part_matches(rule: &str, value: &str, clean: fn(&str) -> String) -> bool {
    rule == WILDCARD || clean(rule) == clean(value)
}

#[derive(Debug, Deserialize)]
struct ExclusionFile {
    #[serde(default)]
    blacklist: Vec<ExclusionRule>,
}

#[derive(Debug, Clone, Default)]
pub struct ExclusionList {
    rules: Vec<ExclusionRule>,
}

impl ExclusionList {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules }
    }

    /// Parse `{"blacklist": [{"hash", "category", "source"}, ...]}`.
    pub fn from_json(path: &str, value: Value) -> Result<Self, FetchError> {
        let file: ExclusionFile =
            serde_json::from_value(value).map_err(|e| FetchError::parse(path, e))?;
        Ok(Self::new(file.blacklist))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl ExclusionPort for ExclusionList {
    fn is_excluded(&self, hash: &str, collection: &str, source: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.matches(hash, collection, source))
    }
}

/// Policy used when no exclusion list is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusions;

impl ExclusionPort for NoExclusions {
    fn is_excluded(&self, _hash: &str, _collection: &str, _source: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_rule_matches_case_insensitively() {
        let list = ExclusionList::new(vec![ExclusionRule::new(
            "agonizing%20blast_phb",
            "optionalfeature",
            "PHB",
        )]);
        assert!(list.is_excluded("Agonizing%20Blast_PHB", "optionalFeature", "phb"));
        assert!(!list.is_excluded("eldritch%20sight_phb", "optionalfeature", "PHB"));
    }

    #[test]
    fn wildcards_match_anything() {
        let list = ExclusionList::new(vec![ExclusionRule::new("*", "*", "UA")]);
        assert!(list.is_excluded("anything_ua", "classFeature", "UA"));
        assert!(!list.is_excluded("anything_phb", "classFeature", "PHB"));
    }

    #[test]
    fn parses_blacklist_file_with_missing_parts() {
        let list = ExclusionList::from_json(
            "blacklist.json",
            json!({"blacklist": [{"source": "XGE"}, {"hash": "x", "category": "item", "source": "DMG"}]}),
        )
        .expect("valid file");
        assert_eq!(list.len(), 2);
        assert!(list.is_excluded("whatever", "spell", "xge"));
    }

    #[test]
    fn no_exclusions_never_excludes() {
        assert!(!NoExclusions.is_excluded("a", "b", "c"));
    }
}
