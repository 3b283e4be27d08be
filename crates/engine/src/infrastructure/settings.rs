//! Loader settings from environment variables.

use std::path::PathBuf;

/// Default local data directory.
pub const DEFAULT_DATA_PATH: &str = "./data";

/// Default ceiling on dereference passes.
pub const DEFAULT_MAX_DEREFERENCE_PASSES: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    /// Local data directory (used unless `data_url` is set).
    pub data_path: PathBuf,
    /// HTTP base URL for raw data.
    pub data_url: Option<String>,
    /// Path or URL of the homebrew `{source: url}` index.
    pub homebrew_index: Option<String>,
    /// Path of an exclusion-list JSON file.
    pub exclusions: Option<String>,
    pub max_dereference_passes: usize,
    /// Overrides the built-in first-party source codes.
    pub first_party_sources: Option<Vec<String>>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            data_url: None,
            homebrew_index: None,
            exclusions: None,
            max_dereference_passes: DEFAULT_MAX_DEREFERENCE_PASSES,
            first_party_sources: None,
        }
    }
}

impl LoaderSettings {
    /// Read `GRIMOIRE_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_dereference_passes = match non_empty("GRIMOIRE_MAX_DEREFERENCE_PASSES") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %raw,
                    "Invalid GRIMOIRE_MAX_DEREFERENCE_PASSES, using default"
                );
                DEFAULT_MAX_DEREFERENCE_PASSES
            }),
            None => DEFAULT_MAX_DEREFERENCE_PASSES,
        };

        Self {
            data_path: non_empty("GRIMOIRE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            data_url: non_empty("GRIMOIRE_DATA_URL"),
            homebrew_index: non_empty("GRIMOIRE_HOMEBREW_INDEX"),
            exclusions: non_empty("GRIMOIRE_EXCLUSIONS"),
            max_dereference_passes,
            first_party_sources: non_empty("GRIMOIRE_FIRST_PARTY_SOURCES").map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
        }
    }
}
