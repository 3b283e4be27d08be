//! External collaborator port traits (content fetch, homebrew, exclusion, notification).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use grimoire_domain::RawBatch;
use serde_json::Value;

use super::error::{FetchError, HomebrewError};
use super::types::DereferenceFailures;

// =============================================================================
// Raw Content
// =============================================================================

/// Fetch a raw JSON payload by data-relative path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentFetcherPort: Send + Sync {
    async fn fetch_json(&self, path: &str) -> Result<Value, FetchError>;
}

// =============================================================================
// Homebrew
// =============================================================================

/// User-supplied override packages layered over first-party content.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HomebrewStorePort: Send + Sync {
    /// Whether a package providing `source_clean` is already registered.
    async fn has_source_known(&self, source_clean: &str) -> bool;

    /// Everything already registered, merged into one batch. Never fetches.
    async fn processed_override_data(&self) -> Result<Arc<RawBatch>, HomebrewError>;

    /// The source -> package URL index of fetchable packages.
    async fn source_index(&self) -> Result<HashMap<String, String>, HomebrewError>;

    /// Fetch and register the package at `url`.
    async fn add_from_url(&self, url: &str) -> Result<(), HomebrewError>;
}

// =============================================================================
// Content Policy
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait ExclusionPort: Send + Sync {
    fn is_excluded(&self, hash: &str, collection: &str, source: &str) -> bool;
}

/// Non-fatal side channel for partial dereference failures.
#[cfg_attr(test, mockall::automock)]
pub trait NotifierPort: Send + Sync {
    fn notify_failed_dereferences(&self, failures: &DereferenceFailures);
}

// =============================================================================
// Bespoke Loaders
// =============================================================================

/// A hand-written loader for collections with irregular assembly logic.
#[async_trait]
pub trait BespokeLoaderPort: Send + Sync {
    fn name(&self) -> &str;

    async fn load_site(&self, fetcher: &dyn ContentFetcherPort) -> Result<RawBatch, FetchError>;

    /// Apply the same assembly to already-registered override data.
    async fn load_override(&self, data: &RawBatch) -> Result<RawBatch, FetchError>;
}
