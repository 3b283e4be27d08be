//! The default fifth-edition content layout: which file holds which
//! collection, how each prop is hashed, and which reference kinds exist.

use std::sync::Arc;

use grimoire_domain::{HashScheme, UidFormat};

use super::bespoke::RaceLoader;
use super::catalog::PropCatalog;
use super::collection_loader::{
    CollectionLoader, DereferencePass, FileSet, LoaderKind, ManifestSpec,
};
use super::data_loader::DataLoaderBuilder;
use super::dereference::{RefKind, RefKindRegistry, ResolveOptions};
use super::registry::LoaderRegistry;
use crate::infrastructure::ports::ContentFetcherPort;

const CLASS_INDEX: &str = "class/index.json";

/// A [`DataLoaderBuilder`] preloaded with the default registry, catalog and reference kinds.
pub fn builder(fetcher: Arc<dyn ContentFetcherPort>) -> DataLoaderBuilder {
    DataLoaderBuilder::new(fetcher)
        .registry(loader_registry())
        .catalog(prop_catalog())
        .ref_kinds(ref_kinds())
}

pub fn prop_catalog() -> PropCatalog {
    let name_source = [
        ("monster", "bestiary"),
        ("spell", "spells"),
        ("class", "classes"),
        ("item", "items"),
        ("baseitem", "items"),
        ("itemGroup", "items"),
        ("background", "backgrounds"),
        ("psionic", "psionics"),
        ("object", "objects"),
        ("action", "actions"),
        ("trap", "trapshazards"),
        ("hazard", "trapshazards"),
        ("cult", "cultsboons"),
        ("boon", "cultsboons"),
        ("condition", "conditionsdiseases"),
        ("disease", "conditionsdiseases"),
        ("status", "conditionsdiseases"),
        ("vehicle", "vehicles"),
        ("vehicleUpgrade", "vehicles"),
        ("feat", "feats"),
        ("optionalfeature", "optionalfeatures"),
        ("reward", "rewards"),
        ("charoption", "charcreationoptions"),
        ("race", "races"),
        ("subrace", "races"),
        ("variantrule", "variantrules"),
        ("table", "tables"),
        ("tableGroup", "tables"),
        ("language", "languages"),
        ("recipe", "recipes"),
    ];

    let mut catalog = name_source
        .into_iter()
        .fold(PropCatalog::new(), |catalog, (prop, page)| {
            catalog.register(prop, HashScheme::NameSource, Some(page))
        });

    catalog = catalog
        .register("subclass", HashScheme::Subclass, Some("classes"))
        .register("classFeature", HashScheme::ClassFeature, Some("classfeatures"))
        .register("subclassFeature", HashScheme::SubclassFeature, Some("classfeatures"))
        .register(
            "deity",
            HashScheme::fields(&["name", "pantheon", "source"]),
            Some("deities"),
        );

    for prop in ["itemEntry", "itemType", "itemProperty", "skill", "sense", "legendaryGroup"] {
        catalog = catalog.register(prop, HashScheme::NameSource, None);
    }
    catalog
}

pub fn ref_kinds() -> RefKindRegistry {
    RefKindRegistry::new()
        .register(
            RefKind::whole_entity("refClassFeature", "classFeature", "classFeature")
                .with_uid_format(UidFormat::ClassFeature, HashScheme::ClassFeature)
                .stripping(&["level", "header"]),
        )
        .register(
            RefKind::whole_entity("refSubclassFeature", "subclassFeature", "subclassFeature")
                .with_uid_format(UidFormat::SubclassFeature, HashScheme::SubclassFeature)
                .stripping(&["level", "header"]),
        )
        .register(
            RefKind::whole_entity("refOptionalfeature", "optionalfeature", "optionalfeature")
                .stripping(&["featureType", "prerequisite"])
                .preloading("optionalfeature"),
        )
        .register(
            RefKind::template_splice("refItemEntry", "itemEntry", "itemEntry", "entriesTemplate")
                .with_uid_format(
                    UidFormat::Generic {
                        default_source: "DMG".to_string(),
                    },
                    HashScheme::NameSource,
                )
                .preloading("item"),
        )
}

pub fn loader_registry() -> LoaderRegistry {
    let class_features = CollectionLoader::new(
        "classFeature",
        LoaderKind::Dereferenced {
            files: FileSet::Indexed(CLASS_INDEX.to_string()),
            passes: vec![
                DereferencePass::new(
                    "classFeature",
                    HashScheme::ClassFeature,
                    ResolveOptions::default(),
                ),
                DereferencePass::new(
                    "subclassFeature",
                    HashScheme::SubclassFeature,
                    ResolveOptions::default(),
                ),
            ],
            stage_raw: vec!["classFeature".to_string(), "subclassFeature".to_string()],
        },
    );
    let classes = CollectionLoader::new(
        "class",
        LoaderKind::ClassAssembly {
            files: FileSet::Indexed(CLASS_INDEX.to_string()),
        },
    );
    let items = CollectionLoader::new(
        "item",
        LoaderKind::Dereferenced {
            files: FileSet::Many(vec!["items-base.json".to_string(), "items.json".to_string()]),
            passes: vec![
                DereferencePass::new(
                    "item",
                    HashScheme::NameSource,
                    ResolveOptions::new("entries", Some("hasRefs")),
                ),
                DereferencePass::new(
                    "item",
                    HashScheme::NameSource,
                    ResolveOptions::new("_fullEntries", Some("hasRefs")),
                ),
            ],
            stage_raw: Vec::new(),
        },
    )
    .with_prop_allowlist(&[
        "item",
        "itemGroup",
        "itemType",
        "itemEntry",
        "itemProperty",
        "baseitem",
        "itemFluff",
    ])
    .with_phase1_allowlist(&["itemEntry"]);

    let mut registry = LoaderRegistry::new()
        .register(
            CollectionLoader::multi_source("monster", "monster", "bestiary").with_prop_allowlist(&[
                "monster",
                "monsterFluff",
                "legendaryGroup",
                "makebrewCreatureTrait",
            ]),
            &["monster", "bestiary"],
        )
        .register(
            CollectionLoader::multi_source("monsterFluff", "monsterFluff", "bestiary/fluff"),
            &["monsterFluff", "bestiaryfluff"],
        )
        .register(
            CollectionLoader::multi_source("spell", "spell", "spells"),
            &["spell", "spells"],
        )
        .register(
            CollectionLoader::multi_source("spellFluff", "spellFluff", "spells/fluff"),
            &["spellFluff", "spellsfluff"],
        )
        .register(
            CollectionLoader::predefined(Arc::new(
                RaceLoader::new("races.json").with_base_races(true),
            )),
            &["race", "subrace", "races"],
        )
        .register(classes.without_post_cache(), &["raw_class", "raw_subclass"])
        .register(classes, &["class", "subclass", "classes"])
        .register(
            class_features.without_post_cache(),
            &["raw_classFeature", "raw_subclassFeature"],
        )
        .register(
            class_features,
            &["classFeature", "subclassFeature", "classfeatures"],
        )
        .register(items, &["item", "items"])
        .register(
            manifest("adventure", "adventureData", "adventures.json"),
            &["adventure", "adventureData"],
        )
        .register(
            manifest("book", "bookData", "books.json"),
            &["book", "bookData"],
        );

    let single_files: &[(&str, &[&str])] = &[
        ("deities.json", &["deity", "deities"]),
        ("variantrules.json", &["variantrule", "variantrules"]),
        ("tables.json", &["table", "tableGroup", "tables"]),
        ("languages.json", &["language", "languages"]),
        ("recipes.json", &["recipe", "recipes"]),
        ("backgrounds.json", &["background", "backgrounds"]),
        ("psionics.json", &["psionic", "psionics"]),
        ("objects.json", &["object", "objects"]),
        ("actions.json", &["action", "actions"]),
        ("trapshazards.json", &["trap", "hazard", "trapshazards"]),
        ("cultsboons.json", &["cult", "boon", "cultsboons"]),
        (
            "conditionsdiseases.json",
            &["condition", "disease", "status", "conditionsdiseases"],
        ),
        ("vehicles.json", &["vehicle", "vehicleUpgrade", "vehicles"]),
        ("feats.json", &["feat", "raw_feat", "feats"]),
        (
            "optionalfeatures.json",
            &["optionalfeature", "raw_optionalfeature", "optionalfeatures"],
        ),
        ("rewards.json", &["reward", "raw_reward", "rewards"]),
        (
            "charcreationoptions.json",
            &["charoption", "raw_charoption", "charcreationoptions"],
        ),
        ("skills.json", &["skill"]),
        ("senses.json", &["sense"]),
        ("bestiary/legendarygroups.json", &["legendaryGroup"]),
        ("items-base.json", &["itemEntry"]),
        ("fluff-backgrounds.json", &["backgroundFluff", "backgroundsfluff"]),
        ("fluff-feats.json", &["featFluff", "featsfluff"]),
        ("fluff-items.json", &["itemFluff", "itemsfluff"]),
        (
            "fluff-conditionsdiseases.json",
            &["conditionFluff", "diseaseFluff", "statusFluff", "conditionsdiseasesfluff"],
        ),
        ("fluff-races.json", &["raceFluff", "racesfluff"]),
        ("fluff-languages.json", &["languageFluff", "languagesfluff"]),
        ("fluff-vehicles.json", &["vehicleFluff", "vehiclesfluff"]),
        ("fluff-objects.json", &["objectFluff", "objectsfluff"]),
        (
            "fluff-charcreationoptions.json",
            &["charoptionFluff", "charcreationoptionsfluff"],
        ),
        ("fluff-recipes.json", &["recipeFluff", "recipesfluff"]),
    ];
    for (path, aliases) in single_files {
        registry = registry.register(CollectionLoader::single_file(aliases[0], path), aliases);
    }
    registry
}

fn manifest(prop: &str, data_prop: &str, index_path: &str) -> CollectionLoader {
    CollectionLoader::new(
        prop,
        LoaderKind::Manifest(ManifestSpec {
            page: prop.to_string(),
            prop: prop.to_string(),
            data_prop: data_prop.to_string(),
            index_path: index_path.to_string(),
            data_dir: prop.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use grimoire_domain::fluff_collection;

    #[test]
    fn aliases_share_loaders() {
        let registry = loader_registry();
        let a = registry.resolve("classFeature").expect("classFeature");
        let b = registry.resolve("CLASSFEATURES").expect("page alias");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.has_post_cache());
    }

    #[test]
    fn raw_aliases_skip_post_processing() {
        let registry = loader_registry();
        let raw = registry.resolve("raw_class").expect("raw alias");
        let assembled = registry.resolve("class").expect("class");
        assert!(!Arc::ptr_eq(&raw, &assembled));
        assert!(!raw.has_post_cache());
        assert!(assembled.has_post_cache());
    }

    #[test]
    fn items_only_expose_item_entries_in_phase_one() {
        let items = loader_registry().resolve("items").expect("items");
        assert!(items.phase1_allows("itemEntry"));
        assert!(!items.phase1_allows("item"));
        assert!(items.phase2_allows("item"));
        assert!(!items.phase2_allows("spell"));
    }

    #[test]
    fn every_catalog_page_has_a_loader() {
        let registry = loader_registry();
        let catalog = prop_catalog();
        for prop in ["monster", "spell", "class", "subclass", "item", "race", "deity", "feat"] {
            let spec = catalog.spec(prop).expect("registered prop");
            let page = spec.page.expect("page alias");
            assert!(registry.resolve(prop).is_some(), "{prop}");
            assert!(registry.resolve(&page).is_some(), "{page}");
        }
        let fluff = catalog.spec("monsterFluff").expect("fluff prop");
        assert_eq!(fluff.page, Some(fluff_collection("bestiary")));
        assert!(registry.resolve(&fluff_collection("bestiary")).is_some());
    }

    #[test]
    fn reference_kinds_are_registered() {
        let kinds = ref_kinds();
        assert_eq!(kinds.len(), 4);
        let item_entry = kinds.get("refItemEntry").expect("refItemEntry");
        assert_eq!(item_entry.preload.as_deref(), Some("item"));
        assert!(kinds.get("refOptionalfeature").is_some());
    }
}
