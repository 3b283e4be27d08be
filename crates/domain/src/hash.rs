//! Collection-specific entity hashes.
//!
//! A hash is the deterministic per-source identifier of an entity within its
//! collection. Each part is lowercased and URI-component encoded, and parts are
//! joined with [`HASH_PART_SEP`].

use crate::entity::Entity;

pub const HASH_PART_SEP: &str = "_";

/// Characters `encodeURIComponent` leaves as-is but `urlencoding` escapes.
const URI_COMPONENT_UNRESERVED: &[(&str, &str)] = &[
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Encode hash parts, e.g. `["Goblin", "MM"]` -> `goblin_mm`.
pub fn encode_for_hash<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|part| encode_uri_component(&part.as_ref().to_lowercase()))
        .collect::<Vec<_>>()
        .join(HASH_PART_SEP)
}

fn encode_uri_component(part: &str) -> String {
    let mut encoded = urlencoding::encode(part).into_owned();
    for (escaped, raw) in URI_COMPONENT_UNRESERVED {
        if encoded.contains(escaped) {
            encoded = encoded.replace(escaped, raw);
        }
    }
    encoded
}

/// How a collection derives the hash of its entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashScheme {
    /// `name` + `source`; the scheme for most collections.
    NameSource,
    /// `name`, `className`, `classSource`, `level`, `source`.
    ClassFeature,
    /// `name`, `className`, `classSource`, `subclassShortName`, `subclassSource`, `level`, `source`.
    SubclassFeature,
    /// `name`, `shortName`, `className`, `classSource`, `source`.
    Subclass,
    /// An arbitrary ordered field list (e.g. `id` for adventures and books).
    Fields(Vec<String>),
}

impl HashScheme {
    pub fn fields(fields: &[&str]) -> Self {
        Self::Fields(fields.iter().map(|f| (*f).to_string()).collect())
    }

    fn parts(&self) -> Vec<&str> {
        match self {
            Self::NameSource => vec!["name", "source"],
            Self::ClassFeature => vec!["name", "className", "classSource", "level", "source"],
            Self::SubclassFeature => vec![
                "name",
                "className",
                "classSource",
                "subclassShortName",
                "subclassSource",
                "level",
                "source",
            ],
            Self::Subclass => vec!["name", "shortName", "className", "classSource", "source"],
            Self::Fields(fields) => fields.iter().map(String::as_str).collect(),
        }
    }

    /// Hash an entity. Missing fields contribute an empty part; `source` falls
    /// back to the entity's inherited source.
    pub fn hash(&self, entity: &Entity) -> String {
        let values: Vec<String> = self
            .parts()
            .into_iter()
            .map(|field| {
                if field == "source" {
                    return entity.source().unwrap_or_default().to_string();
                }
                entity.field_as_text(field).unwrap_or_default()
            })
            .collect();
        encode_for_hash(&values)
    }
}
