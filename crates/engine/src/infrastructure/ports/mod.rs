//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Raw content fetch (could swap filesystem -> HTTP)
//! - Homebrew storage (could swap in-memory -> persistent)
//! - Content exclusion policy and failure notification
//! - Bespoke per-collection loaders

mod error;
mod external;
pub mod types;

pub use external::{
    BespokeLoaderPort, ContentFetcherPort, ExclusionPort, HomebrewStorePort, NotifierPort,
};

pub use types::DereferenceFailures;

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use external::{
    MockContentFetcherPort, MockExclusionPort, MockHomebrewStorePort, MockNotifierPort,
};

// =============================================================================
// Error Types
// =============================================================================
pub use error::{FetchError, HomebrewError};
