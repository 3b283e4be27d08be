//! Pipe-delimited reference identifiers.
//!
//! References name their target with a uid such as `Spring|PHB` or
//! `Action Surge|Fighter||2`. Unpacking yields the fields a [`HashScheme`]
//! needs to hash the target, plus an optional display text.
//!
//! [`HashScheme`]: crate::hash::HashScheme

use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::DomainError;

/// Source assumed when a uid leaves it blank.
pub const DEFAULT_SOURCE: &str = "PHB";

/// The layout of a uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidFormat {
    /// `name|source|display`
    Generic { default_source: String },
    /// `name|className|classSource|level|source|display`
    ClassFeature,
    /// `name|className|classSource|subclassShortName|subclassSource|level|source|display`
    SubclassFeature,
}

impl Default for UidFormat {
    fn default() -> Self {
        Self::Generic {
            default_source: DEFAULT_SOURCE.to_string(),
        }
    }
}

/// The parts of an unpacked uid.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpackedUid {
    /// Hashable fields, shaped like the target entity (`name`, `source`, ...).
    pub fields: Entity,
    pub display_text: Option<String>,
}

impl UnpackedUid {
    pub fn source(&self) -> &str {
        self.fields.source().unwrap_or_default()
    }
}

impl UidFormat {
    fn label(&self) -> &'static str {
        match self {
            Self::Generic { .. } => "generic",
            Self::ClassFeature => "classFeature",
            Self::SubclassFeature => "subclassFeature",
        }
    }

    /// Unpack a uid, rejecting ones missing a required part.
    pub fn unpack(&self, uid: &str) -> Result<UnpackedUid, DomainError> {
        let parts: Vec<&str> = uid.split('|').map(str::trim).collect();
        let part = |ix: usize| parts.get(ix).copied().filter(|p| !p.is_empty());

        let mut fields = Map::new();
        let display_text;

        match self {
            Self::Generic { default_source } => {
                let name = part(0).ok_or_else(|| DomainError::invalid_uid(self.label(), uid))?;
                put(&mut fields, "name", name);
                put(&mut fields, "source", part(1).unwrap_or(default_source.as_str()));
                display_text = part(2);
            }
            Self::ClassFeature => {
                let class_source = part(2).unwrap_or(DEFAULT_SOURCE);
                put_opt(&mut fields, "name", part(0));
                put_opt(&mut fields, "className", part(1));
                put(&mut fields, "classSource", class_source);
                put_level(&mut fields, part(3));
                put(&mut fields, "source", part(4).unwrap_or(class_source));
                display_text = part(5);
                self.require(&fields, &["name", "className", "level"], uid)?;
            }
            Self::SubclassFeature => {
                let subclass_source = part(4).unwrap_or(DEFAULT_SOURCE);
                put_opt(&mut fields, "name", part(0));
                put_opt(&mut fields, "className", part(1));
                put(&mut fields, "classSource", part(2).unwrap_or(DEFAULT_SOURCE));
                put_opt(&mut fields, "subclassShortName", part(3));
                put(&mut fields, "subclassSource", subclass_source);
                put_level(&mut fields, part(5));
                put(&mut fields, "source", part(6).unwrap_or(subclass_source));
                display_text = part(7);
                self.require(
                    &fields,
                    &["name", "className", "subclassShortName", "level"],
                    uid,
                )?;
            }
        }

        Ok(UnpackedUid {
            fields: Entity::new(fields),
            display_text: display_text.map(str::to_string),
        })
    }

    fn require(
        &self,
        fields: &Map<String, Value>,
        required: &[&str],
        uid: &str,
    ) -> Result<(), DomainError> {
        if required.iter().all(|f| fields.contains_key(*f)) {
            Ok(())
        } else {
            Err(DomainError::invalid_uid(self.label(), uid))
        }
    }
}

fn put(fields: &mut Map<String, Value>, key: &str, value: &str) {
    fields.insert(key.to_string(), Value::String(value.to_string()));
}

fn put_opt(fields: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        put(fields, key, value);
    }
}

// Levels must be positive integers; anything else leaves the field unset.
fn put_level(fields: &mut Map<String, Value>, value: Option<&str>) {
    if let Some(level) = value.and_then(|v| v.parse::<u64>().ok()).filter(|l| *l > 0) {
        fields.insert("level".to_string(), Value::from(level));
    }
}
