//! Class and subclass assembly.
//!
//! Raw classes list their features as uids (`"Rage|Barbarian||1"` or
//! `{"classFeature": "...", "gainSubclassFeature": true}`). Assembly replaces
//! that list with the referenced feature entities grouped by level, fetching
//! each through a nested load that re-enters the phase-2 lock.

use std::collections::BTreeMap;

use grimoire_domain::{is_truthy, raw_prop, Entity, HashScheme, RawBatch, UidFormat};
use serde_json::Value;

use super::context::LoadContext;
use super::error::LoaderError;
use super::lock::LockToken;
use crate::infrastructure::ports::DereferenceFailures;

/// Placeholder source of features that do not exist yet. Never loaded.
pub const TEMP_SOURCE: &str = "TMP";

/// Highest feature level kept. Features above it are dropped.
pub const MAX_FEATURE_LEVEL: u64 = 30;

/// How one kind of parent lists its features.
struct FeatureList {
    list_field: &'static str,
    ref_field: &'static str,
    uid_format: UidFormat,
    scheme: HashScheme,
    /// Class feature lists are indexed by level (`[level 1, level 2, ...]`);
    /// subclass lists only hold the levels present.
    dense: bool,
}

impl FeatureList {
    fn class() -> Self {
        Self {
            list_field: "classFeatures",
            ref_field: "classFeature",
            uid_format: UidFormat::ClassFeature,
            scheme: HashScheme::ClassFeature,
            dense: true,
        }
    }

    fn subclass() -> Self {
        Self {
            list_field: "subclassFeatures",
            ref_field: "subclassFeature",
            uid_format: UidFormat::SubclassFeature,
            scheme: HashScheme::SubclassFeature,
            dense: false,
        }
    }

    /// Legacy data has its features inlined already.
    fn is_legacy(&self, parent: &Entity) -> bool {
        parent
            .get(self.list_field)
            .and_then(Value::as_array)
            .is_some_and(|refs| {
                refs.iter()
                    .all(|r| !r.is_string() && r.get(self.ref_field).is_none())
            })
    }
}

/// Assemble every `raw_class` and `raw_subclass` of `batch` into `class` and `subclass`.
pub async fn assemble(
    batch: &RawBatch,
    ctx: &dyn LoadContext,
    token: Option<LockToken>,
) -> Result<RawBatch, LoaderError> {
    let mut out = RawBatch::new();

    let classes = batch.get(&raw_prop("class"));
    if !classes.is_empty() {
        let spec = FeatureList::class();
        let mut assembled = Vec::with_capacity(classes.len());
        for cls in classes {
            assembled.push(assemble_one(cls, &spec, ctx, token).await?);
        }
        out.insert("class", assembled);
    }

    let subclasses = batch.get(&raw_prop("subclass"));
    if !subclasses.is_empty() {
        let spec = FeatureList::subclass();
        let mut assembled = Vec::with_capacity(subclasses.len());
        for sc in subclasses {
            assembled.push(assemble_one(sc, &spec, ctx, token).await?);
        }
        out.insert("subclass", assembled);
    }

    Ok(out)
}

async fn assemble_one(
    parent: &Entity,
    spec: &FeatureList,
    ctx: &dyn LoadContext,
    token: Option<LockToken>,
) -> Result<Entity, LoaderError> {
    if spec.is_legacy(parent) {
        return Ok(parent.clone());
    }

    let mut by_level: BTreeMap<u64, Vec<Value>> = BTreeMap::new();
    let mut failures = DereferenceFailures::new();

    let refs = parent
        .get(spec.list_field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for feature_ref in &refs {
        let uid = match feature_ref {
            Value::String(uid) => uid.as_str(),
            other => match other.get(spec.ref_field).and_then(Value::as_str) {
                Some(uid) => uid,
                None => continue,
            },
        };

        // Broken links are skipped silently.
        let Ok(unpacked) = spec.uid_format.unpack(uid) else {
            tracing::debug!(uid = %uid, "Skipping invalid feature uid");
            continue;
        };
        let source = unpacked.source();
        if source.eq_ignore_ascii_case(TEMP_SOURCE) {
            continue;
        }

        let hash = spec.scheme.hash(&unpacked.fields);
        if ctx.is_excluded(&hash, spec.ref_field, source) {
            continue;
        }

        let Some(found) = ctx
            .cache_and_get_nested(spec.ref_field, source, &hash, token)
            .await?
        else {
            failures.add(spec.ref_field, uid);
            continue;
        };

        let mut feature = (*found).clone();
        if let Some(display) = &unpacked.display_text {
            feature.insert("_displayName", Value::String(display.clone()));
        }
        if let Some(table_name) = feature_ref.get("tableDisplayName") {
            feature.insert("_displayNameTable", table_name.clone());
        }
        for flag in ["gainSubclassFeature", "gainSubclassFeatureHasContent"] {
            if feature_ref.get(flag).is_some_and(is_truthy) {
                feature.insert(flag, Value::Bool(true));
            }
        }
        if let Some(other_sources) = parent.get("otherSources") {
            if parent.get_str("source") == feature.get_str("source") {
                feature.insert("otherSources", other_sources.clone());
            }
        }

        nest_by_header(&mut feature);

        let level = feature
            .get("level")
            .and_then(Value::as_u64)
            .filter(|l| *l > 0)
            .unwrap_or(1);
        if level > MAX_FEATURE_LEVEL {
            tracing::warn!(
                parent = parent.name().unwrap_or_default(),
                feature = feature.name().unwrap_or_default(),
                level,
                "Skipping feature above the maximum level"
            );
            continue;
        }
        by_level.entry(level).or_default().push(feature.into_value());
    }

    if !failures.is_empty() {
        ctx.notify_failures(&failures);
    }

    let features: Vec<Value> = if spec.dense {
        let max = by_level.keys().next_back().copied().unwrap_or(0);
        (1..=max)
            .map(|level| Value::Array(by_level.remove(&level).unwrap_or_default()))
            .collect()
    } else {
        by_level.into_values().map(Value::Array).collect()
    };

    let mut assembled = parent.clone();
    assembled.insert(spec.list_field, Value::Array(features));
    Ok(assembled)
}

/// Wrap a feature in `header - 1` anonymous entry layers.
fn nest_by_header(feature: &mut Entity) {
    let depth = feature
        .get("header")
        .and_then(Value::as_u64)
        .unwrap_or(1)
        .saturating_sub(1);
    for _ in 0..depth {
        let inner = feature.clone();
        feature.insert("entries", Value::Array(vec![inner.into_value()]));
        feature.remove("name");
        feature.remove("page");
        feature.remove("source");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::context::MockLoadContext;
    use serde_json::json;
    use std::sync::Arc;

    fn feature(value: Value) -> Option<Arc<Entity>> {
        Some(Arc::new(Entity::from_value(value).expect("object")))
    }

    fn fighter() -> Entity {
        Entity::from_value(json!({
            "name": "Fighter",
            "source": "PHB",
            "otherSources": [{"source": "SRD"}],
            "classFeatures": [
                "Fighting Style|Fighter||1",
                {"classFeature": "Martial Archetype|Fighter||3", "gainSubclassFeature": true},
                "Future Thing|Fighter||3|TMP",
                "Missing|Fighter||2",
                "not a uid"
            ]
        }))
        .expect("object")
    }

    #[tokio::test]
    async fn class_features_are_grouped_by_dense_level() {
        let mut ctx = MockLoadContext::new();
        ctx.expect_is_excluded().returning(|_, _, _| false);
        ctx.expect_cache_and_get_nested()
            .returning(|collection, _, hash, _| {
                assert_eq!(collection, "classFeature");
                Ok(match hash {
                    "fighting%20style_fighter_phb_1_phb" => feature(json!({
                        "name": "Fighting Style", "source": "PHB", "level": 1,
                        "className": "Fighter", "entries": ["Pick one."]
                    })),
                    "martial%20archetype_fighter_phb_3_phb" => feature(json!({
                        "name": "Martial Archetype", "source": "PHB", "level": 3,
                        "className": "Fighter", "header": 2, "entries": ["Choose."]
                    })),
                    _ => None,
                })
            });
        ctx.expect_notify_failures()
            .withf(|failures| failures.uids("classFeature") == vec!["Missing|Fighter||2"])
            .times(1)
            .return_const(());

        let mut batch = RawBatch::new();
        batch.insert("raw_class", vec![fighter()]);
        let out = assemble(&batch, &ctx, None).await.expect("assembled");

        let cls = out.get("class")[0].to_value();
        let levels = cls["classFeatures"].as_array().expect("levels");
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0][0]["name"], "Fighting Style");
        assert_eq!(levels[0][0]["otherSources"], json!([{"source": "SRD"}]));
        assert_eq!(levels[1], json!([]));

        let archetype = &levels[2][0];
        assert_eq!(archetype["gainSubclassFeature"], true);
        // header 2 wraps once and drops the outer name.
        assert!(archetype.get("name").is_none());
        assert_eq!(archetype["entries"][0]["name"], "Martial Archetype");
    }

    #[tokio::test]
    async fn subclass_features_keep_only_present_levels() {
        let mut ctx = MockLoadContext::new();
        ctx.expect_is_excluded()
            .returning(|hash, _, _| hash.starts_with("banned"));
        ctx.expect_cache_and_get_nested().returning(|_, _, hash, _| {
            let level = if hash.contains("_3_") { 3 } else { 7 };
            Ok(feature(json!({"name": hash, "source": "PHB", "level": level})))
        });

        let mut batch = RawBatch::new();
        batch.insert(
            "raw_subclass",
            vec![Entity::from_value(json!({
                "name": "Champion",
                "shortName": "Champion",
                "source": "PHB",
                "subclassFeatures": [
                    "Champion|Fighter||Champion||3||Shown",
                    "Banned|Fighter||Champion||5",
                    "Remarkable Athlete|Fighter||Champion||7"
                ]
            }))
            .expect("object")],
        );

        let out = assemble(&batch, &ctx, None).await.expect("assembled");
        let sc = out.get("subclass")[0].to_value();
        let levels = sc["subclassFeatures"].as_array().expect("levels");
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0][0]["_displayName"], "Shown");
        assert_eq!(levels[1][0]["level"], 7);
    }

    #[tokio::test]
    async fn out_of_range_levels_are_skipped() {
        let mut ctx = MockLoadContext::new();
        ctx.expect_is_excluded().returning(|_, _, _| false);
        ctx.expect_cache_and_get_nested().returning(|_, _, hash, _| {
            let level = if hash.starts_with("second") { 2 } else { 4_000_000_000u64 };
            Ok(feature(json!({"name": hash, "source": "HB", "level": level})))
        });

        let brewed = Entity::from_value(json!({
            "name": "Brewer",
            "source": "HB",
            "classFeatures": [
                {"classFeature": "Second|Brewer|HB|2|HB", "gainSubclassFeature": "yes"},
                "Overflow|Brewer|HB|4000000000|HB"
            ]
        }))
        .expect("object");
        let mut batch = RawBatch::new();
        batch.insert("raw_class", vec![brewed]);

        let out = assemble(&batch, &ctx, None).await.expect("assembled");
        let cls = out.get("class")[0].to_value();
        let levels = cls["classFeatures"].as_array().expect("levels");
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1][0]["gainSubclassFeature"], true);
    }

    #[tokio::test]
    async fn legacy_classes_pass_through() {
        let legacy = Entity::from_value(json!({
            "name": "Old",
            "source": "PHB",
            "classFeatures": [[{"name": "Inline", "entries": []}]]
        }))
        .expect("object");
        let mut batch = RawBatch::new();
        batch.insert("raw_class", vec![legacy.clone()]);

        let out = assemble(&batch, &MockLoadContext::new(), None)
            .await
            .expect("assembled");
        assert_eq!(out.get("class")[0], legacy);
    }

    #[tokio::test]
    async fn nested_load_errors_propagate() {
        let mut ctx = MockLoadContext::new();
        ctx.expect_is_excluded().returning(|_, _, _| false);
        ctx.expect_cache_and_get_nested()
            .returning(|_, _, _, _| Err(LoaderError::invalid_data("broken file")));

        let mut batch = RawBatch::new();
        batch.insert("raw_class", vec![fighter()]);
        assert!(assemble(&batch, &ctx, None).await.is_err());
    }
}
