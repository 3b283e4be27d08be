//! First-party source catalog.

use std::collections::HashSet;

use grimoire_domain::clean_source;

/// Source codes of content shipped with the base application.
pub const FIRST_PARTY_SOURCES: &[&str] = &[
    "PHB", "MM", "DMG", "SCAG", "VGM", "XGE", "MTF", "GGR", "AI", "ERLW", "EGW", "MOT", "TCE",
    "VRGR", "FTD", "MPMM", "SCC", "AAG", "BMT", "BGG", "XPHB", "XDMG", "XMM", "LMoP", "HotDQ",
    "RoT", "PotA", "OotA", "CoS", "SKT", "TftYP", "ToA", "WDH", "WDMM", "GoS", "BGDIA", "IDRotF",
    "WBtW", "CRCotN", "SatO", "ToFW", "UA",
];

/// Classifies sources as first-party or override. Case-insensitive.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    first_party: HashSet<String>,
}

impl SourceCatalog {
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            first_party: sources.into_iter().map(|s| clean_source(s.as_ref())).collect(),
        }
    }

    pub fn is_first_party(&self, source: &str) -> bool {
        self.first_party.contains(&clean_source(source))
    }

    pub fn len(&self) -> usize {
        self.first_party.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_party.is_empty()
    }
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::new(FIRST_PARTY_SOURCES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_knows_core_books() {
        let catalog = SourceCatalog::default();
        assert!(catalog.is_first_party("PHB"));
        assert!(catalog.is_first_party("xge"));
        assert!(!catalog.is_first_party("MyBrew"));
    }

    #[test]
    fn custom_catalog_replaces_defaults() {
        let catalog = SourceCatalog::new(["Core"]);
        assert!(catalog.is_first_party("core"));
        assert!(!catalog.is_first_party("PHB"));
        assert_eq!(catalog.len(), 1);
    }
}
