//! Grimoire Engine library.
//!
//! Loads tabletop-game content on demand, resolves cross-references between
//! entities and caches the results for the session.
//!
//! ## Structure
//!
//! - `infrastructure/` - Port traits and their adapters (fetch, homebrew, exclusions)
//! - `loader/` - Cache, collection loaders, dereferencing and the `DataLoader`

pub mod infrastructure;
pub mod loader;

/// End-to-end scenarios over the full loader with mocked ports.
#[cfg(test)]
mod e2e_tests;

pub use loader::{DataLoader, GetOptions, LoaderError};
