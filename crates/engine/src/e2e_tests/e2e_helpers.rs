//! Shared fixtures for the end-to-end scenarios.

use std::collections::HashMap;

use grimoire_domain::HashScheme;
use serde_json::{json, Value};

use crate::infrastructure::ports::{ContentFetcherPort, FetchError, MockContentFetcherPort};
use crate::loader::{
    CollectionLoader, DataLoaderBuilder, DereferencePass, FileSet, LoaderKind, LoaderRegistry,
    PropCatalog, RefKind, RefKindRegistry, ResolveOptions,
};

/// A fetcher serving fixed payloads by path; unknown paths are not found.
pub fn fixture_fetcher(files: Vec<(&'static str, Value)>) -> MockContentFetcherPort {
    let files: HashMap<&'static str, Value> = files.into_iter().collect();
    let mut fetcher = MockContentFetcherPort::new();
    fetcher.expect_fetch_json().returning(move |path| {
        files
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::not_found(path))
    });
    fetcher
}

/// Widgets referencing each other through `{#refWidget ...}` tokens and
/// `refWidget` objects.
pub fn widget_builder(fetcher: impl ContentFetcherPort + 'static) -> DataLoaderBuilder {
    let widgets = CollectionLoader::new(
        "widgets",
        LoaderKind::Dereferenced {
            files: FileSet::Single("widgets.json".to_string()),
            passes: vec![DereferencePass::new(
                "widgets",
                HashScheme::NameSource,
                ResolveOptions::default(),
            )],
            stage_raw: Vec::new(),
        },
    );

    DataLoaderBuilder::new(std::sync::Arc::new(fetcher))
        .registry(LoaderRegistry::new().register(widgets, &["widget", "widgets"]))
        .catalog(PropCatalog::new().register("widgets", HashScheme::NameSource, Some("widget")))
        .ref_kinds(
            RefKindRegistry::new().register(RefKind::whole_entity("refWidget", "widget", "widgets")),
        )
}

pub fn widget(name: &str, entries: Value) -> Value {
    json!({"name": name, "source": "PHB", "entries": entries})
}

pub fn widget_ref(uid: &str) -> Value {
    json!({"type": "refWidget", "widget": uid})
}

/// True if any string in `value` still holds a reference token or object.
pub fn has_marker(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains("{#refWidget"),
        Value::Array(items) => items.iter().any(has_marker),
        Value::Object(map) => {
            map.get("type").and_then(Value::as_str) == Some("refWidget")
                || map.values().any(has_marker)
        }
        _ => false,
    }
}
