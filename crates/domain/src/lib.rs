//! Grimoire domain: the pure data model of the content loader.
//!
//! Nothing here performs I/O. The engine crate owns fetching, caching and
//! orchestration; this crate owns keys, hashes, uids and the entity shape.

pub mod batch;
pub mod entity;
pub mod error;
pub mod hash;
pub mod keys;
pub mod reference;
pub mod template;
pub mod uid;

pub use batch::RawBatch;
pub use entity::{is_truthy, Entity, COLLECTION_ORIGIN_FIELD};
pub use error::DomainError;
pub use hash::{encode_for_hash, HashScheme, HASH_PART_SEP};
pub use keys::{
    clean_collection, clean_hash, clean_source, fluff_collection, raw_prop, unraw_prop, CleanKey,
    SourceScope, FLUFF_SUFFIX, RAW_PREFIX,
};
pub use reference::{find_ref_tokens, object_type, RefObject, TagToken};
pub use template::{apply_template, apply_template_deep};
pub use uid::{UidFormat, UnpackedUid, DEFAULT_SOURCE};
