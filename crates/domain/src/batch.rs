//! Raw entity batches.
//!
//! A raw payload is a JSON object whose array-valued props hold entities,
//! e.g. `{"monster": [...], "legendaryGroup": [...], "_meta": {...}}`.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::entity::Entity;
use crate::error::DomainError;
use crate::keys::raw_prop;

/// Prop name -> entities, as loaded from one or more payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    props: BTreeMap<String, Vec<Entity>>,
}

impl RawBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a payload. Non-array props and non-object array items are ignored.
    pub fn from_json(value: Value) -> Result<Self, DomainError> {
        let Value::Object(map) = value else {
            return Err(DomainError::parse("payload is not a JSON object"));
        };
        let mut batch = Self::new();
        for (prop, items) in map {
            let Value::Array(items) = items else {
                continue;
            };
            let entities: Vec<Entity> = items
                .into_iter()
                .filter_map(|item| Entity::from_value(item).ok())
                .collect();
            batch.extend(&prop, entities);
        }
        Ok(batch)
    }

    pub fn get(&self, prop: &str) -> &[Entity] {
        self.props.get(prop).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, prop: &str) -> bool {
        self.props.get(prop).is_some_and(|items| !items.is_empty())
    }

    pub fn insert(&mut self, prop: impl Into<String>, entities: Vec<Entity>) {
        self.props.insert(prop.into(), entities);
    }

    pub fn extend(&mut self, prop: &str, entities: impl IntoIterator<Item = Entity>) {
        self.props
            .entry(prop.to_string())
            .or_default()
            .extend(entities);
    }

    pub fn take(&mut self, prop: &str) -> Vec<Entity> {
        self.props.remove(prop).unwrap_or_default()
    }

    /// Append every prop of `other`.
    pub fn merge(&mut self, other: RawBatch) {
        for (prop, entities) in other.props {
            self.extend(&prop, entities);
        }
    }

    /// Only the listed props, renamed to their `raw_` form.
    pub fn raw_prefixed(&self, props: &[&str]) -> RawBatch {
        let mut out = RawBatch::new();
        for prop in props {
            if let Some(entities) = self.props.get(*prop) {
                out.insert(raw_prop(prop), entities.clone());
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Entity])> {
        self.props
            .iter()
            .map(|(prop, entities)| (prop.as_str(), entities.as_slice()))
    }

    pub fn prop_names(&self) -> impl Iterator<Item = &str> {
        self.props.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.props.values().all(Vec::is_empty)
    }

    /// Total number of entities across props.
    pub fn len(&self) -> usize {
        self.props.values().map(Vec::len).sum()
    }
}

impl FromIterator<(String, Vec<Entity>)> for RawBatch {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Entity>)>>(iter: I) -> Self {
        let mut batch = Self::new();
        for (prop, entities) in iter {
            batch.extend(&prop, entities);
        }
        batch
    }
}
