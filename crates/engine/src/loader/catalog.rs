//! Prop catalog: how each raw prop is hashed and which page collection aliases it.

use std::collections::HashMap;

use grimoire_domain::{fluff_collection, unraw_prop, HashScheme, RAW_PREFIX};

/// Cache metadata for one prop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropSpec {
    pub scheme: HashScheme,
    /// Page collection the entity is also stored under (e.g. `monster` -> `bestiary`).
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PropCatalog {
    props: HashMap<String, PropSpec>,
}

impl PropCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `prop`. When it has a page alias, `<prop>Fluff` is registered too,
    /// aliased to the page's fluff collection.
    pub fn register(mut self, prop: &str, scheme: HashScheme, page: Option<&str>) -> Self {
        if let Some(page) = page {
            self.props.insert(
                format!("{prop}Fluff"),
                PropSpec {
                    scheme: HashScheme::NameSource,
                    page: Some(fluff_collection(page)),
                },
            );
        }
        self.props.insert(
            prop.to_string(),
            PropSpec {
                scheme,
                page: page.map(str::to_string),
            },
        );
        self
    }

    /// Spec for `prop`. `raw_<prop>` shares the scheme of `<prop>` and has no page alias.
    pub fn spec(&self, prop: &str) -> Option<PropSpec> {
        if let Some(spec) = self.props.get(prop) {
            return Some(spec.clone());
        }
        if prop.starts_with(RAW_PREFIX) {
            return self.props.get(unraw_prop(prop)).map(|spec| PropSpec {
                scheme: spec.scheme.clone(),
                page: None,
            });
        }
        None
    }

    pub fn scheme(&self, prop: &str) -> Option<HashScheme> {
        self.spec(prop).map(|spec| spec.scheme)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}
