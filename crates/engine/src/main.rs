//! Grimoire - load one entity and print it as JSON.
//!
//! ```text
//! grimoire <collection> <source> <hash>
//! grimoire <collection> --all
//! ```

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grimoire_engine::infrastructure::{
    exclusion::ExclusionList,
    fetch::{FsContentFetcher, HttpContentFetcher},
    homebrew::InMemoryHomebrewStore,
    ports::{ContentFetcherPort, ExclusionPort},
    settings::LoaderSettings,
};
use grimoire_engine::loader::{defaults, DataLoader, GetOptions, SourceCatalog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grimoire_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let settings = LoaderSettings::from_env();
    let loader = build_loader(&settings).await?;

    let output = match args.as_slice() {
        [collection, flag] if flag == "--all" => {
            let entities = loader
                .cache_and_get_all_first_party(collection, false)
                .await?
                .unwrap_or_default();
            tracing::info!(collection = %collection, count = entities.len(), "Loaded collection");
            serde_json::Value::Array(entities.iter().map(|e| e.to_value()).collect())
        }
        [collection, source, hash] => {
            let entity = loader
                .cache_and_get(collection, source, hash, GetOptions::default().required())
                .await?
                .with_context(|| format!("no entity {collection}/{source}/{hash}"))?;
            entity.to_value()
        }
        _ => anyhow::bail!("usage: grimoire <collection> <source> <hash> | <collection> --all"),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    tracing::debug!(stats = ?loader.stats(), "Loader stats");
    Ok(())
}

async fn build_loader(settings: &LoaderSettings) -> anyhow::Result<DataLoader> {
    let fetcher: Arc<dyn ContentFetcherPort> = match &settings.data_url {
        Some(url) => {
            tracing::info!(url = %url, "Loading content over HTTP");
            Arc::new(HttpContentFetcher::new(url))
        }
        None => {
            tracing::info!(path = %settings.data_path.display(), "Loading content from disk");
            Arc::new(FsContentFetcher::new(&settings.data_path))
        }
    };

    let mut builder = defaults::builder(fetcher.clone())
        .max_dereference_passes(settings.max_dereference_passes);

    if let Some(sources) = &settings.first_party_sources {
        builder = builder.sources(SourceCatalog::new(sources));
    }

    if let Some(index) = &settings.homebrew_index {
        let homebrew = InMemoryHomebrewStore::new(fetcher.clone()).with_index_path(index);
        builder = builder.homebrew(Arc::new(homebrew));
    }

    if let Some(path) = &settings.exclusions {
        let payload = fetcher
            .fetch_json(path)
            .await
            .with_context(|| format!("reading exclusion list {path}"))?;
        let exclusions = ExclusionList::from_json(path, payload)?;
        tracing::info!(rules = exclusions.len(), "Loaded exclusion list");
        let exclusions: Arc<dyn ExclusionPort> = Arc::new(exclusions);
        builder = builder.exclusions(exclusions);
    }

    Ok(builder.build())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
