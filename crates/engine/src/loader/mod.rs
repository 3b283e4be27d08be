//! The loading core: cache, locks, collection loaders, dereferencing and the
//! [`DataLoader`] orchestrator tying them together.

pub mod bespoke;
pub mod cache;
pub mod catalog;
pub mod class_assembly;
pub mod collection_loader;
pub mod context;
pub mod data_loader;
pub mod defaults;
pub mod dereference;
pub mod error;
pub mod lock;
pub mod registry;
pub mod sources;

pub use cache::{CacheResult, CacheSlot, EntityCache};
pub use catalog::{PropCatalog, PropSpec};
pub use collection_loader::{CollectionLoader, DereferencePass, FileSet, LoaderKind, ManifestSpec};
pub use context::LoadContext;
pub use data_loader::{DataLoader, DataLoaderBuilder, GetOptions, LoaderStats};
pub use dereference::{RefKind, RefKindRegistry, ReferenceResolver, ResolveOptions, Substitution};
pub use error::LoaderError;
pub use lock::{LockGuard, LockToken, ReentrantLock};
pub use registry::LoaderRegistry;
pub use sources::SourceCatalog;
