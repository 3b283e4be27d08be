//! What post-processing needs from the orchestrator.
//!
//! Collection loaders and the dereferencer run inside the orchestrator's
//! phase-2 critical section; they reach back into it only through this trait,
//! threading the phase-2 lock token into anything that may re-enter.

use std::sync::Arc;

use async_trait::async_trait;
use grimoire_domain::Entity;

use super::error::LoaderError;
use super::lock::LockToken;
use crate::infrastructure::ports::DereferenceFailures;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoadContext: Send + Sync {
    /// A cached entity, if the slot holds one. Never triggers a load.
    fn cached(&self, collection: &str, source: &str, hash: &str) -> Option<Arc<Entity>>;

    fn is_excluded(&self, hash: &str, collection: &str, source: &str) -> bool;

    fn notify_failures(&self, failures: &DereferenceFailures);

    /// Force-load every first-party entity of `collection`.
    async fn preload_collection(
        &self,
        collection: &str,
        token: Option<LockToken>,
    ) -> Result<(), LoaderError>;

    /// A nested `cache_and_get` that re-enters the phase-2 lock with `token`.
    async fn cache_and_get_nested(
        &self,
        collection: &str,
        source: &str,
        hash: &str,
        token: Option<LockToken>,
    ) -> Result<Option<Arc<Entity>>, LoaderError>;
}
