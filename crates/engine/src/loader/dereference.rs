//! Reference resolution ("dereferencing").
//!
//! Entities whose entries contain reference markers are resolved iteratively:
//! each pass collects every reference site of an entity in one read-only walk,
//! then substitutes them left to right. A pass that resolves every site of an
//! entity moves it to the clean set, where later references can copy from it.
//! Resolution stops at a fixed point or after `max_passes`; whatever is still
//! unresolved is reported and returned with its markers intact.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use grimoire_domain::{
    apply_template_deep, clean_collection, clean_hash, find_ref_tokens, object_type, Entity,
    HashScheme, RefObject, UidFormat,
};
use serde_json::{Map, Value};

use super::context::LoadContext;
use super::lock::LockToken;
use crate::infrastructure::ports::DereferenceFailures;

/// Keys never walked when looking for references.
const WALKER_KEY_BLOCKLIST: &[&str] = &[
    "caption",
    "type",
    "colLabels",
    "colLabelGroups",
    "name",
    "colStyles",
    "style",
    "shortName",
    "subclassShortName",
    "id",
    "path",
];

/// How a resolved reference replaces its marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitution {
    /// Replace the marker with a copy of the target, minus `strip` fields.
    WholeEntity { strip: Vec<String> },
    /// Splice in the target's `template_field` entries, with `{{item.*}}`
    /// placeholders bound to the embedding entity.
    TemplateSplice { template_field: String },
}

/// A registered reference kind, e.g. `refClassFeature`.
#[derive(Debug, Clone)]
pub struct RefKind {
    pub tag: String,
    /// Field of an object marker holding the uid.
    pub uid_field: String,
    /// Collection (prop) the uid points into.
    pub target: String,
    pub uid_format: UidFormat,
    pub target_scheme: HashScheme,
    pub substitution: Substitution,
    /// Collection to force-load before resolving this kind.
    pub preload: Option<String>,
}

impl RefKind {
    pub fn whole_entity(tag: &str, uid_field: &str, target: &str) -> Self {
        Self {
            tag: tag.to_string(),
            uid_field: uid_field.to_string(),
            target: target.to_string(),
            uid_format: UidFormat::default(),
            target_scheme: HashScheme::NameSource,
            substitution: Substitution::WholeEntity { strip: Vec::new() },
            preload: None,
        }
    }

    pub fn template_splice(tag: &str, uid_field: &str, target: &str, template_field: &str) -> Self {
        Self {
            substitution: Substitution::TemplateSplice {
                template_field: template_field.to_string(),
            },
            ..Self::whole_entity(tag, uid_field, target)
        }
    }

    pub fn with_uid_format(mut self, uid_format: UidFormat, scheme: HashScheme) -> Self {
        self.uid_format = uid_format;
        self.target_scheme = scheme;
        self
    }

    /// Fields removed from a whole-entity copy.
    pub fn stripping(mut self, fields: &[&str]) -> Self {
        if let Substitution::WholeEntity { strip } = &mut self.substitution {
            strip.extend(fields.iter().map(|f| (*f).to_string()));
        }
        self
    }

    pub fn preloading(mut self, collection: &str) -> Self {
        self.preload = Some(collection.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RefKindRegistry {
    kinds: HashMap<String, Arc<RefKind>>,
}

impl RefKindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: RefKind) -> Self {
        self.kinds.insert(kind.tag.clone(), Arc::new(kind));
        self
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<RefKind>> {
        self.kinds.get(tag)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Which field holds an entity's entries, and optionally a flag field that
/// marks entities with references (skipping the walk when partitioning).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub entries_field: String,
    pub ref_flag_field: Option<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            entries_field: "entries".to_string(),
            ref_flag_field: None,
        }
    }
}

impl ResolveOptions {
    pub fn new(entries_field: &str, ref_flag_field: Option<&str>) -> Self {
        Self {
            entries_field: entries_field.to_string(),
            ref_flag_field: ref_flag_field.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOutcome {
    /// Every input entity, resolved or not, in input order.
    pub entities: Vec<Entity>,
    pub failures: DereferenceFailures,
    /// Passes actually run.
    pub passes: usize,
    pub unresolved: usize,
}

// =============================================================================
// Reference sites
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSeg {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone)]
enum TextSegment {
    Text(String),
    Ref { kind: Arc<RefKind>, uid: String },
}

#[derive(Debug, Clone)]
enum Marker {
    Object {
        kind: Arc<RefKind>,
        uid: String,
        name: Option<String>,
    },
    Text(Vec<TextSegment>),
}

/// An array position holding a marker. `array_path` is relative to the entries field.
#[derive(Debug, Clone)]
struct Site {
    array_path: Vec<PathSeg>,
    index: usize,
    marker: Marker,
}

enum Target {
    Found(Entity),
    Excluded,
    Missing,
}

struct Pending {
    hash: String,
    entity: Entity,
    resolved: bool,
}

pub struct ReferenceResolver {
    kinds: Arc<RefKindRegistry>,
    max_passes: usize,
}

impl ReferenceResolver {
    pub fn new(kinds: Arc<RefKindRegistry>, max_passes: usize) -> Self {
        Self { kinds, max_passes }
    }

    pub fn kinds(&self) -> &RefKindRegistry {
        &self.kinds
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Whether `entity` holds any resolvable marker in `entries_field`.
    pub fn has_refs(&self, entity: &Entity, entries_field: &str) -> bool {
        !self.collect_sites(entity, entries_field).is_empty()
    }

    /// Resolve every reference in `entities` (all of collection `collection`,
    /// hashed with `scheme`).
    pub async fn resolve_all(
        &self,
        entities: Vec<Entity>,
        collection: &str,
        scheme: &HashScheme,
        options: &ResolveOptions,
        ctx: &dyn LoadContext,
        token: Option<LockToken>,
    ) -> ResolveOutcome {
        let collection_clean = clean_collection(collection);
        let entries_field = options.entries_field.as_str();

        let mut items: Vec<Pending> = entities
            .into_iter()
            .map(|entity| {
                let has_refs = match &options.ref_flag_field {
                    Some(flag) => entity.is_truthy(flag),
                    None => self.has_refs(&entity, entries_field),
                };
                Pending {
                    hash: clean_hash(&scheme.hash(&entity)),
                    entity,
                    resolved: !has_refs,
                }
            })
            .collect();

        let mut clean: HashMap<String, usize> = items
            .iter()
            .enumerate()
            .filter(|(_, p)| p.resolved)
            .map(|(ix, p)| (p.hash.clone(), ix))
            .collect();

        let mut preloaded: HashSet<String> = HashSet::new();
        let mut passes = 0;

        while passes < self.max_passes && items.iter().any(|p| !p.resolved) {
            passes += 1;

            for ix in 0..items.len() {
                if items[ix].resolved {
                    continue;
                }

                let mut sites = self.collect_sites(&items[ix].entity, entries_field);
                if sites.is_empty() {
                    items[ix].resolved = true;
                    clean.insert(items[ix].hash.clone(), ix);
                    continue;
                }

                for target in sites.iter().flat_map(site_preloads) {
                    if !preloaded.insert(target.clone()) {
                        continue;
                    }
                    if let Err(e) = ctx.preload_collection(&target, token).await {
                        tracing::warn!(
                            collection = %target,
                            error = %e,
                            "Failed to preload reference targets"
                        );
                    }
                }

                let binding = items[ix].entity.clone();
                let mut replaced = 0;
                for s in 0..sites.len() {
                    let Some(values) =
                        self.replacement(&sites[s].marker, &binding, &collection_clean, &items, &clean, ctx)
                    else {
                        continue;
                    };
                    let delta = values.len() as isize - 1;
                    let site = sites[s].clone();
                    if splice(&mut items[ix].entity, entries_field, &site, values) {
                        replaced += 1;
                        if delta != 0 {
                            shift_sites(&mut sites[s + 1..], &site, delta);
                        }
                    }
                }

                if replaced == sites.len() && !self.has_refs(&items[ix].entity, entries_field) {
                    items[ix].resolved = true;
                    clean.insert(items[ix].hash.clone(), ix);
                }
            }
        }

        let mut failures = DereferenceFailures::new();
        let mut unresolved = 0;
        for pending in items.iter().filter(|p| !p.resolved) {
            unresolved += 1;
            for site in self.collect_sites(&pending.entity, entries_field) {
                match &site.marker {
                    Marker::Object { kind, uid, .. } => failures.add(&kind.target, uid),
                    Marker::Text(segments) => {
                        for segment in segments {
                            if let TextSegment::Ref { kind, uid } = segment {
                                failures.add(&kind.target, uid);
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!(
            collection = %collection_clean,
            entities = items.len(),
            passes,
            unresolved,
            "Dereferenced batch"
        );

        ResolveOutcome {
            entities: items.into_iter().map(|p| p.entity).collect(),
            failures,
            passes,
            unresolved,
        }
    }

    fn collect_sites(&self, entity: &Entity, entries_field: &str) -> Vec<Site> {
        let mut sites = Vec::new();
        if let Some(root) = entity.get(entries_field) {
            self.walk(root, &mut Vec::new(), &mut sites);
        }
        sites
    }

    fn walk(&self, value: &Value, path: &mut Vec<PathSeg>, out: &mut Vec<Site>) {
        match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    if let Some(marker) = self.marker_for(item) {
                        out.push(Site {
                            array_path: path.clone(),
                            index,
                            marker,
                        });
                        continue;
                    }
                    path.push(PathSeg::Index(index));
                    self.walk(item, path, out);
                    path.pop();
                }
            }
            Value::Object(map) => {
                for (key, child) in map {
                    if WALKER_KEY_BLOCKLIST.contains(&key.as_str()) {
                        continue;
                    }
                    path.push(PathSeg::Key(key.clone()));
                    self.walk(child, path, out);
                    path.pop();
                }
            }
            _ => {}
        }
    }

    fn marker_for(&self, item: &Value) -> Option<Marker> {
        if let Some(kind) = object_type(item).and_then(|tag| self.kinds.get(tag)) {
            let parsed = RefObject::parse(item, &kind.uid_field)?;
            return Some(Marker::Object {
                kind: kind.clone(),
                uid: parsed.uid,
                name: parsed.name,
            });
        }

        let text = item.as_str()?;
        let mut segments = Vec::new();
        let mut last_end = 0;
        for token in find_ref_tokens(text) {
            let Some(kind) = self.kinds.get(&token.tag) else {
                continue;
            };
            if token.range.start > last_end {
                segments.push(TextSegment::Text(text[last_end..token.range.start].to_string()));
            }
            segments.push(TextSegment::Ref {
                kind: kind.clone(),
                uid: token.text,
            });
            last_end = token.range.end;
        }
        if segments.is_empty() {
            return None;
        }
        if last_end < text.len() {
            segments.push(TextSegment::Text(text[last_end..].to_string()));
        }
        Some(Marker::Text(segments))
    }

    /// The values replacing a marker, or `None` if any of its references is missing.
    fn replacement(
        &self,
        marker: &Marker,
        binding: &Entity,
        collection_clean: &str,
        items: &[Pending],
        clean: &HashMap<String, usize>,
        ctx: &dyn LoadContext,
    ) -> Option<Vec<Value>> {
        match marker {
            Marker::Object { kind, uid, name } => {
                match self.lookup(kind, uid, collection_clean, items, clean, ctx) {
                    Target::Found(entity) => substitute(kind, entity, name.as_deref(), binding),
                    Target::Excluded => Some(vec![Value::Object(Map::new())]),
                    Target::Missing => None,
                }
            }
            Marker::Text(segments) => {
                let mut values = Vec::new();
                for segment in segments {
                    match segment {
                        TextSegment::Text(text) => values.push(Value::String(text.clone())),
                        TextSegment::Ref { kind, uid } => {
                            match self.lookup(kind, uid, collection_clean, items, clean, ctx) {
                                Target::Found(entity) => {
                                    values.extend(substitute(kind, entity, None, binding)?)
                                }
                                Target::Excluded => values.push(Value::Object(Map::new())),
                                Target::Missing => return None,
                            }
                        }
                    }
                }
                Some(values)
            }
        }
    }

    fn lookup(
        &self,
        kind: &RefKind,
        uid: &str,
        collection_clean: &str,
        items: &[Pending],
        clean: &HashMap<String, usize>,
        ctx: &dyn LoadContext,
    ) -> Target {
        let unpacked = match kind.uid_format.unpack(uid) {
            Ok(unpacked) => unpacked,
            Err(e) => {
                tracing::debug!(uid = %uid, error = %e, "Unresolvable reference uid");
                return Target::Missing;
            }
        };
        let hash = clean_hash(&kind.target_scheme.hash(&unpacked.fields));
        let source = unpacked.source();

        if ctx.is_excluded(&hash, &kind.target, source) {
            return Target::Excluded;
        }

        // Prefer the in-flight batch over the cache.
        if clean_collection(&kind.target) == collection_clean {
            if let Some(&ix) = clean.get(&hash) {
                return Target::Found(items[ix].entity.clone());
            }
        }

        match ctx.cached(&kind.target, source, &hash) {
            Some(entity) => Target::Found((*entity).clone()),
            None => Target::Missing,
        }
    }
}

fn site_preloads(site: &Site) -> Vec<String> {
    match &site.marker {
        Marker::Object { kind, .. } => kind.preload.iter().cloned().collect(),
        Marker::Text(segments) => segments
            .iter()
            .filter_map(|segment| match segment {
                TextSegment::Ref { kind, .. } => kind.preload.clone(),
                TextSegment::Text(_) => None,
            })
            .collect(),
    }
}

fn substitute(
    kind: &RefKind,
    mut target: Entity,
    name: Option<&str>,
    binding: &Entity,
) -> Option<Vec<Value>> {
    match &kind.substitution {
        Substitution::WholeEntity { strip } => {
            for field in strip {
                target.remove(field);
            }
            if let Some(name) = name {
                target.set_name(name);
            }
            Some(vec![target.into_value()])
        }
        Substitution::TemplateSplice { template_field } => {
            let mut template = target.get(template_field)?.as_array()?.clone();
            for value in &mut template {
                apply_template_deep(binding, value);
            }
            Some(template)
        }
    }
}

fn array_at<'v>(root: &'v mut Value, path: &[PathSeg]) -> Option<&'v mut Vec<Value>> {
    let mut current = root;
    for seg in path {
        current = match seg {
            PathSeg::Key(key) => current.get_mut(key.as_str())?,
            PathSeg::Index(ix) => current.get_mut(*ix)?,
        };
    }
    current.as_array_mut()
}

fn splice(entity: &mut Entity, entries_field: &str, site: &Site, values: Vec<Value>) -> bool {
    let Some(array) = entity
        .get_mut(entries_field)
        .and_then(|root| array_at(root, &site.array_path))
    else {
        return false;
    };
    if site.index >= array.len() {
        return false;
    }
    array.splice(site.index..=site.index, values);
    true
}

/// Correct later sites after a splice of net length change `delta` at `at`.
/// Only positions after the splice point within the same array move.
fn shift_sites(later: &mut [Site], at: &Site, delta: isize) {
    let depth = at.array_path.len();
    for site in later {
        if site.array_path == at.array_path {
            if site.index > at.index {
                site.index = site.index.saturating_add_signed(delta);
            }
            continue;
        }
        if site.array_path.len() > depth && site.array_path[..depth] == at.array_path[..] {
            if let PathSeg::Index(ix) = &mut site.array_path[depth] {
                if *ix > at.index {
                    *ix = ix.saturating_add_signed(delta);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::context::MockLoadContext;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        Entity::from_value(value).expect("object")
    }

    fn widget_kinds() -> Arc<RefKindRegistry> {
        Arc::new(
            RefKindRegistry::new()
                .register(RefKind::whole_entity("refWidget", "widget", "widgets"))
                .register(
                    RefKind::template_splice("refItemEntry", "itemEntry", "itemEntry", "entriesTemplate")
                        .preloading("itemEntry"),
                ),
        )
    }

    fn quiet_context() -> MockLoadContext {
        let mut ctx = MockLoadContext::new();
        ctx.expect_is_excluded().returning(|_, _, _| false);
        ctx.expect_cached().returning(|_, _, _| None);
        ctx.expect_preload_collection().returning(|_, _| Ok(()));
        ctx
    }

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(widget_kinds(), 25)
    }

    #[tokio::test]
    async fn inlines_embedded_string_token() {
        let entities = vec![
            entity(json!({"name": "Gear", "source": "PHB", "entries": ["See {#refWidget Spring|PHB}"]})),
            entity(json!({"name": "Spring", "source": "PHB", "entries": ["A coil."]})),
        ];
        let outcome = resolver()
            .resolve_all(
                entities,
                "widgets",
                &HashScheme::NameSource,
                &ResolveOptions::default(),
                &quiet_context(),
                None,
            )
            .await;

        assert!(outcome.failures.is_empty());
        let gear = &outcome.entities[0];
        let entries = gear.get("entries").expect("entries");
        assert_eq!(entries[0], "See ");
        assert_eq!(entries[1]["name"], "Spring");
        assert_eq!(entries[1]["entries"][0], "A coil.");
        assert!(!entries.to_string().contains("{#refWidget"));
    }

    #[tokio::test]
    async fn chain_resolves_within_three_passes() {
        let entities = vec![
            entity(json!({"name": "A", "source": "PHB", "entries": [{"type": "refWidget", "widget": "B"}]})),
            entity(json!({"name": "B", "source": "PHB", "entries": [{"type": "refWidget", "widget": "C"}]})),
            entity(json!({"name": "C", "source": "PHB", "entries": ["leaf"]})),
        ];
        let outcome = resolver()
            .resolve_all(
                entities,
                "widgets",
                &HashScheme::NameSource,
                &ResolveOptions::default(),
                &quiet_context(),
                None,
            )
            .await;

        assert!(outcome.passes <= 3);
        assert_eq!(outcome.unresolved, 0);
        let a = outcome.entities[0].to_value();
        assert_eq!(a["entries"][0]["name"], "B");
        assert_eq!(a["entries"][0]["entries"][0]["name"], "C");
        assert_eq!(a["entries"][0]["entries"][0]["entries"][0], "leaf");
    }

    #[tokio::test]
    async fn cycles_stop_at_the_ceiling_and_are_reported() {
        let entities = vec![
            entity(json!({"name": "A", "source": "PHB", "entries": [{"type": "refWidget", "widget": "B"}]})),
            entity(json!({"name": "B", "source": "PHB", "entries": [{"type": "refWidget", "widget": "A"}]})),
        ];
        let outcome = ReferenceResolver::new(widget_kinds(), 5)
            .resolve_all(
                entities,
                "widgets",
                &HashScheme::NameSource,
                &ResolveOptions::default(),
                &quiet_context(),
                None,
            )
            .await;

        assert_eq!(outcome.passes, 5);
        assert_eq!(outcome.unresolved, 2);
        assert_eq!(outcome.failures.uids("widgets"), vec!["A", "B"]);
        // Markers stay in place.
        assert_eq!(outcome.entities[0].to_value()["entries"][0]["type"], "refWidget");
    }

    #[tokio::test]
    async fn excluded_targets_become_empty_placeholders() {
        let mut ctx = MockLoadContext::new();
        ctx.expect_is_excluded()
            .returning(|hash, collection, _| hash == "secret_phb" && collection == "widgets");
        ctx.expect_cached().returning(|_, _, _| None);

        let outcome = resolver()
            .resolve_all(
                vec![entity(json!({
                    "name": "Gear",
                    "source": "PHB",
                    "entries": [{"type": "refWidget", "widget": "Secret"}]
                }))],
                "widgets",
                &HashScheme::NameSource,
                &ResolveOptions::default(),
                &ctx,
                None,
            )
            .await;

        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.entities[0].to_value()["entries"][0], json!({}));
    }

    #[tokio::test]
    async fn whole_entity_copies_come_from_cache_and_honour_overrides() {
        let kinds = Arc::new(RefKindRegistry::new().register(
            RefKind::whole_entity("refOptionalfeature", "optionalfeature", "optionalfeature")
                .stripping(&["featureType", "prerequisite"]),
        ));
        let mut ctx = MockLoadContext::new();
        ctx.expect_is_excluded().returning(|_, _, _| false);
        ctx.expect_cached()
            .withf(|collection, source, hash| {
                collection == "optionalfeature" && source == "PHB" && hash == "agonizing%20blast_phb"
            })
            .returning(|_, _, _| {
                Some(Arc::new(
                    Entity::from_value(json!({
                        "name": "Agonizing Blast",
                        "source": "PHB",
                        "featureType": ["EI"],
                        "prerequisite": [{"spell": ["eldritch blast"]}],
                        "entries": ["Add your Charisma modifier."]
                    }))
                    .expect("object"),
                ))
            });

        let outcome = ReferenceResolver::new(kinds, 25)
            .resolve_all(
                vec![entity(json!({
                    "name": "Eldritch Invocations",
                    "source": "PHB",
                    "entries": [{"type": "refOptionalfeature", "optionalfeature": "Agonizing Blast", "name": "Blast"}]
                }))],
                "classFeature",
                &HashScheme::NameSource,
                &ResolveOptions::default(),
                &ctx,
                None,
            )
            .await;

        let inlined = &outcome.entities[0].to_value()["entries"][0];
        assert_eq!(inlined["name"], "Blast");
        assert!(inlined.get("featureType").is_none());
        assert!(inlined.get("prerequisite").is_none());
        assert_eq!(inlined["entries"][0], "Add your Charisma modifier.");
    }

    #[tokio::test]
    async fn template_splice_shifts_later_sites() {
        let mut ctx = MockLoadContext::new();
        ctx.expect_is_excluded().returning(|_, _, _| false);
        ctx.expect_preload_collection()
            .withf(|collection, _| collection == "itemEntry")
            .times(1)
            .returning(|_, _| Ok(()));
        ctx.expect_cached().returning(|collection, _, hash| {
            (collection == "itemEntry" && hash == "resistance_dmg").then(|| {
                Arc::new(
                    Entity::from_value(json!({
                        "name": "Resistance",
                        "source": "DMG",
                        "entriesTemplate": ["You have {{item.resist}} resistance.", "While attuned."]
                    }))
                    .expect("object"),
                )
            })
        });

        let outcome = resolver()
            .resolve_all(
                vec![entity(json!({
                    "name": "Armor of Fire Resistance",
                    "source": "DMG",
                    "resist": "fire",
                    "hasRefs": true,
                    "entries": [
                        {"type": "refItemEntry", "itemEntry": "Resistance|DMG"},
                        {"type": "entries", "entries": [{"type": "refItemEntry", "itemEntry": "Resistance|DMG"}]},
                        {"type": "refItemEntry", "itemEntry": "Resistance|DMG"}
                    ]
                }))],
                "item",
                &HashScheme::NameSource,
                &ResolveOptions::new("entries", Some("hasRefs")),
                &ctx,
                None,
            )
            .await;

        assert_eq!(outcome.unresolved, 0);
        let entries = outcome.entities[0].to_value()["entries"].clone();
        assert_eq!(
            entries,
            json!([
                "You have fire resistance.",
                "While attuned.",
                {"type": "entries", "entries": ["You have fire resistance.", "While attuned."]},
                "You have fire resistance.",
                "While attuned."
            ])
        );
    }

    #[tokio::test]
    async fn unflagged_entities_are_left_alone() {
        let outcome = resolver()
            .resolve_all(
                vec![entity(json!({
                    "name": "Plain",
                    "source": "PHB",
                    "entries": [{"type": "refWidget", "widget": "Missing"}]
                }))],
                "widgets",
                &HashScheme::NameSource,
                &ResolveOptions::new("entries", Some("hasRefs")),
                &MockLoadContext::new(),
                None,
            )
            .await;

        assert_eq!(outcome.passes, 0);
        assert_eq!(outcome.entities[0].to_value()["entries"][0]["type"], "refWidget");
    }

    #[test]
    fn unknown_tags_are_not_sites() {
        let resolver = resolver();
        let ent = entity(json!({"entries": ["{#refUnknown x}", {"type": "list", "items": ["a"]}]}));
        assert!(!resolver.has_refs(&ent, "entries"));
    }
}
