//! Loader error taxonomy.

use crate::infrastructure::ports::{FetchError, HomebrewError};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LoaderError {
    /// Configuration error: no loading strategy is registered for the collection.
    #[error("No loading strategy found for collection \"{collection}\"")]
    NoLoader { collection: String },

    /// A required entity does not exist after a full load attempt.
    #[error("Could not find entity for collection \"{collection}\" with source \"{entity_source}\" and hash \"{hash}\"")]
    NotFound {
        collection: String,
        entity_source: String,
        hash: String,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Homebrew(#[from] HomebrewError),

    /// A bespoke loader failed.
    #[error("Bespoke loader \"{loader}\" failed: {message}")]
    Bespoke { loader: String, message: String },

    /// Raw data had an unexpected shape.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl LoaderError {
    pub fn no_loader(collection: impl ToString) -> Self {
        Self::NoLoader {
            collection: collection.to_string(),
        }
    }

    pub fn not_found(collection: &str, source: &str, hash: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            entity_source: source.to_string(),
            hash: hash.to_string(),
        }
    }

    pub fn bespoke(loader: impl ToString, message: impl ToString) -> Self {
        Self::Bespoke {
            loader: loader.to_string(),
            message: message.to_string(),
        }
    }

    pub fn invalid_data(message: impl ToString) -> Self {
        Self::InvalidData(message.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
