//! Content entity.
//!
//! Entities are schemaless JSON objects; the loader only cares about a handful
//! of well-known fields (`name`, `source`, the collection-origin tag) plus the
//! entry trees it dereferences.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DomainError;

/// Loose truthiness of a JSON value: `null`, `false`, zero and `""` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Field recording which collection an entity was first loaded under.
pub const COLLECTION_ORIGIN_FIELD: &str = "__prop";

/// A single content record (creature, spell, class feature, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse from a JSON value; only objects are entities.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::parse(format!(
                "expected an entity object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// The entity's source, falling back to `inherits.source` for copy-style entities.
    pub fn source(&self) -> Option<&str> {
        self.get_str("source").or_else(|| {
            self.0
                .get("inherits")
                .and_then(|v| v.get("source"))
                .and_then(Value::as_str)
        })
    }

    pub fn collection_origin(&self) -> Option<&str> {
        self.get_str(COLLECTION_ORIGIN_FIELD)
    }

    /// Tag the entity with the collection it was loaded under, unless already tagged.
    pub fn ensure_collection_origin(&mut self, collection: &str) {
        if self.collection_origin().is_none() {
            self.0.insert(
                COLLECTION_ORIGIN_FIELD.to_string(),
                Value::String(collection.to_string()),
            );
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// A field rendered as a hash part: strings verbatim, numbers and bools via `Display`.
    pub fn field_as_text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn is_truthy(&self, field: &str) -> bool {
        self.0.get(field).is_some_and(is_truthy)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn set_name(&mut self, name: &str) {
        self.0
            .insert("name".to_string(), Value::String(name.to_string()));
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Entity {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
