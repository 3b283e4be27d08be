//! Cache population, idempotence and partitioning through the full loader.

use std::sync::Arc;

use grimoire_domain::HashScheme;
use serde_json::json;

use super::*;
use crate::infrastructure::fetch::FsContentFetcher;
use crate::infrastructure::ports::MockContentFetcherPort;
use crate::loader::{CollectionLoader, DataLoader, GetOptions, LoaderRegistry, PropCatalog};

fn widgets_payload() -> serde_json::Value {
    json!({"widgets": [
        widget("Gear", json!(["See {#refWidget Spring|PHB}"])),
        widget("Spring", json!(["A coil."]))
    ]})
}

#[tokio::test]
async fn widget_reference_is_inlined() {
    let loader = widget_builder(fixture_fetcher(vec![("widgets.json", widgets_payload())])).build();

    let gear = loader
        .cache_and_get("widget", "PHB", "gear_phb", GetOptions::default())
        .await
        .expect("load")
        .expect("gear exists");

    assert_eq!(gear.name(), Some("Gear"));
    let entries = gear.get("entries").expect("entries");
    assert!(entries.to_string().contains("A coil."));
    assert!(!has_marker(entries));
    assert_eq!(entries[0], "See ");
    assert_eq!(entries[1]["name"], "Spring");
}

#[tokio::test]
async fn concurrent_lookups_share_one_fetch_and_one_pass() {
    let mut fetcher = MockContentFetcherPort::new();
    fetcher
        .expect_fetch_json()
        .withf(|path| path == "widgets.json")
        .times(1)
        .returning(|_| Ok(widgets_payload()));
    let loader = widget_builder(fetcher).build();

    let (a, b) = tokio::join!(
        loader.cache_and_get("widget", "PHB", "gear_phb", GetOptions::default()),
        loader.cache_and_get("widget", "PHB", "gear_phb", GetOptions::default()),
    );
    let a = a.expect("first").expect("found");
    let b = b.expect("second").expect("found");

    assert_eq!(*a, *b);
    let stats = loader.stats();
    assert_eq!(stats.site_fetches, 1);
    assert_eq!(stats.post_cache_runs, 1);
}

#[tokio::test]
async fn aliases_share_one_site_fetch() {
    let mut fetcher = MockContentFetcherPort::new();
    fetcher
        .expect_fetch_json()
        .withf(|path| path == "widgets.json")
        .times(1)
        .returning(|_| Ok(widgets_payload()));
    let loader = widget_builder(fetcher).build();

    loader
        .cache_and_get("widget", "PHB", "gear_phb", GetOptions::default())
        .await
        .expect("load")
        .expect("gear");
    loader
        .cache_and_get("widgets", "PHB", "spring_phb", GetOptions::default())
        .await
        .expect("load")
        .expect("spring");
    let all = loader
        .cache_and_get_all_first_party("widgets", false)
        .await
        .expect("load")
        .expect("content");

    assert_eq!(all.len(), 2);
    let stats = loader.stats();
    assert_eq!(stats.site_fetches, 1);
    assert_eq!(stats.post_cache_runs, 1);
}

#[tokio::test]
async fn lookups_are_case_insensitive() {
    let fetcher = fixture_fetcher(vec![(
        "bestiary.json",
        json!({"monster": [{"name": "Goblin", "source": "PHB", "cr": "1/4"}]}),
    )]);
    let loader = DataLoader::builder(Arc::new(fetcher))
        .registry(LoaderRegistry::new().register(
            CollectionLoader::single_file("monster", "bestiary.json"),
            &["monster", "bestiary"],
        ))
        .catalog(PropCatalog::new().register("monster", HashScheme::NameSource, Some("bestiary")))
        .build();

    let upper = loader
        .cache_and_get("Monster", "PHB", "Goblin_phb", GetOptions::default())
        .await
        .expect("load")
        .expect("found");
    let lower = loader
        .cache_and_get("monster", "phb", "goblin_phb", GetOptions::default())
        .await
        .expect("load")
        .expect("found");
    let page = loader
        .get_from_cache("BESTIARY", "Phb", "goblin_PHB", GetOptions::default())
        .expect("read")
        .expect("page alias");

    assert!(Arc::ptr_eq(&upper, &lower));
    assert!(Arc::ptr_eq(&upper, &page));
}

#[tokio::test]
async fn all_first_party_loads_both_phases() {
    let loader = widget_builder(fixture_fetcher(vec![("widgets.json", widgets_payload())])).build();

    let all = loader
        .cache_and_get_all_first_party("widgets", false)
        .await
        .expect("load")
        .expect("has content");

    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|w| !has_marker(&w.to_value())));
    assert_eq!(
        loader
            .cache_and_get_all_first_party("hover", false)
            .await
            .expect("no content"),
        None
    );
}

#[tokio::test]
async fn loads_from_a_data_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("widgets.json"),
        serde_json::to_vec(&widgets_payload()).expect("json"),
    )
    .expect("write fixture");

    let loader = widget_builder(FsContentFetcher::new(dir.path())).build();

    let gear = loader
        .cache_and_get("widgets", "phb", "gear_phb", GetOptions::default().required())
        .await
        .expect("load")
        .expect("required");
    assert!(!has_marker(gear.get("entries").expect("entries")));

    let missing = loader
        .cache_and_get("widgets", "phb", "cog_phb", GetOptions::default())
        .await
        .expect("load");
    assert!(missing.is_none());
}
