//! Hand-written loaders for collections with irregular assembly.

use async_trait::async_trait;
use grimoire_domain::{clean_source, Entity, RawBatch};
use serde_json::Value;

use crate::infrastructure::ports::{BespokeLoaderPort, ContentFetcherPort, FetchError};

/// Fields of a subrace that describe the link to its base, not the merged race.
const SUBRACE_LINK_FIELDS: &[&str] = &["name", "source", "raceName", "raceSource", "page"];

/// Races with their subraces expanded.
///
/// Each subrace is merged onto its base race; the result is a race named
/// `Base (Sub)` (or just `Base` for an unnamed subrace). Base races that have
/// subraces are replaced by the merged entries unless `keep_base_races` is set,
/// in which case they are kept and flagged `_isBaseRace`.
pub struct RaceLoader {
    path: String,
    keep_base_races: bool,
}

impl RaceLoader {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            keep_base_races: false,
        }
    }

    pub fn with_base_races(mut self, keep: bool) -> Self {
        self.keep_base_races = keep;
        self
    }

    fn expand(&self, batch: &RawBatch) -> RawBatch {
        let races = batch.get("race");
        let subraces = batch.get("subrace");

        let mut has_subraces = vec![false; races.len()];
        let mut merged = Vec::new();
        for sub in subraces {
            let Some(ix) = races.iter().position(|race| is_base_of(race, sub)) else {
                tracing::debug!(
                    subrace = sub.name().unwrap_or_default(),
                    base = sub.get_str("raceName").unwrap_or_default(),
                    "Subrace has no base race"
                );
                continue;
            };
            has_subraces[ix] = true;
            merged.push(merge_subrace(&races[ix], sub));
        }

        let mut out_races = Vec::with_capacity(races.len() + merged.len());
        for (race, expanded) in races.iter().zip(&has_subraces) {
            if !expanded {
                out_races.push(race.clone());
            } else if self.keep_base_races {
                let mut base = race.clone();
                base.insert("_isBaseRace", Value::Bool(true));
                out_races.push(base);
            }
        }
        out_races.extend(merged);

        let mut out = batch.clone();
        out.insert("race", out_races);
        out
    }
}

fn is_base_of(race: &Entity, sub: &Entity) -> bool {
    let same_name = match (race.name(), sub.get_str("raceName")) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    let same_source = match (race.source(), sub.get_str("raceSource")) {
        (Some(a), Some(b)) => clean_source(a) == clean_source(b),
        _ => false,
    };
    same_name && same_source
}

fn merge_subrace(base: &Entity, sub: &Entity) -> Entity {
    let mut merged = base.clone();
    merged.remove("subraces");

    for (field, value) in sub.fields() {
        if SUBRACE_LINK_FIELDS.contains(&field.as_str()) {
            continue;
        }
        match (field.as_str(), merged.get_mut(field)) {
            ("entries", Some(Value::Array(existing))) => {
                if let Value::Array(extra) = value {
                    existing.extend(extra.iter().cloned());
                }
            }
            _ => {
                merged.insert(field.clone(), value.clone());
            }
        }
    }

    let base_name = base.name().unwrap_or_default().to_string();
    let name = match sub.name() {
        Some(sub_name) => format!("{base_name} ({sub_name})"),
        None => base_name.clone(),
    };
    merged.set_name(&name);
    if let Some(source) = sub.get_str("source") {
        merged.insert("source", Value::String(source.to_string()));
    }
    if let Some(page) = sub.get("page") {
        merged.insert("page", page.clone());
    }
    merged.insert("_baseName", Value::String(base_name));
    if let Some(base_source) = base.source() {
        merged.insert("_baseSource", Value::String(base_source.to_string()));
    }
    merged
}

#[async_trait]
impl BespokeLoaderPort for RaceLoader {
    fn name(&self) -> &str {
        "race"
    }

    async fn load_site(&self, fetcher: &dyn ContentFetcherPort) -> Result<RawBatch, FetchError> {
        let payload = fetcher.fetch_json(&self.path).await?;
        let batch = RawBatch::from_json(payload).map_err(|e| FetchError::parse(&self.path, e))?;
        Ok(self.expand(&batch))
    }

    async fn load_override(&self, data: &RawBatch) -> Result<RawBatch, FetchError> {
        Ok(self.expand(data))
    }
}
