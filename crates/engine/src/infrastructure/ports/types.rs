//! Shared types used by port traits.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// References that could not be resolved, grouped by target collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DereferenceFailures {
    by_target: BTreeMap<String, BTreeSet<String>>,
}

impl DereferenceFailures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, target: &str, uid: &str) {
        self.by_target
            .entry(target.to_string())
            .or_default()
            .insert(uid.to_string());
    }

    pub fn merge(&mut self, other: DereferenceFailures) {
        for (target, uids) in other.by_target {
            self.by_target.entry(target).or_default().extend(uids);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.values().all(BTreeSet::is_empty)
    }

    /// Number of distinct failed uids across all targets.
    pub fn count(&self) -> usize {
        self.by_target.values().map(BTreeSet::len).sum()
    }

    pub fn uids(&self, target: &str) -> Vec<&str> {
        self.by_target
            .get(target)
            .map(|uids| uids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.by_target.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for DereferenceFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups: Vec<String> = self
            .by_target
            .iter()
            .filter(|(_, uids)| !uids.is_empty())
            .map(|(target, uids)| {
                format!(
                    "{target}: {}",
                    uids.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
                )
            })
            .collect();
        write!(f, "{}", groups.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_and_dedupes_by_target() {
        let mut failures = DereferenceFailures::new();
        failures.add("classFeature", "Second Wind|Fighter||1");
        failures.add("classFeature", "Action Surge|Fighter||2");
        failures.add("classFeature", "Action Surge|Fighter||2");
        failures.add("itemEntry", "Armor of Resistance|DMG");

        assert_eq!(failures.count(), 3);
        assert_eq!(
            failures.to_string(),
            "classFeature: Action Surge|Fighter||2, Second Wind|Fighter||1; itemEntry: Armor of Resistance|DMG"
        );
    }

    #[test]
    fn merge_unions_sets() {
        let mut a = DereferenceFailures::new();
        a.add("optionalfeature", "Agonizing Blast");
        let mut b = DereferenceFailures::new();
        b.add("optionalfeature", "Devil's Sight");
        a.merge(b);
        assert_eq!(a.uids("optionalfeature").len(), 2);
        assert!(!a.is_empty());
        assert!(DereferenceFailures::new().is_empty());
    }
}
