//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod exclusion;
pub mod fetch;
pub mod homebrew;
pub mod notifier;
pub mod ports;
pub mod settings;
