//! Error types for port operations.

/// Raw content fetch errors, with the path or URL for actionable messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The file or resource does not exist.
    #[error("Content not found: {path}")]
    NotFound { path: String },

    /// Reading from disk failed.
    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },

    /// The HTTP request failed or returned a non-success status.
    #[error("HTTP error fetching {url}: {message}")]
    Http { url: String, message: String },

    /// The payload was not valid JSON, or not the expected shape.
    #[error("Invalid JSON in {path}: {message}")]
    Parse { path: String, message: String },
}

impl FetchError {
    pub fn not_found(path: impl ToString) -> Self {
        Self::NotFound {
            path: path.to_string(),
        }
    }

    pub fn io(path: impl ToString, message: impl ToString) -> Self {
        Self::Io {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    pub fn http(url: impl ToString, message: impl ToString) -> Self {
        Self::Http {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub fn parse(path: impl ToString, message: impl ToString) -> Self {
        Self::Parse {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Homebrew store errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HomebrewError {
    #[error("Homebrew fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A package or index had an unexpected shape.
    #[error("Invalid homebrew data: {0}")]
    Invalid(String),
}

impl HomebrewError {
    pub fn invalid(message: impl ToString) -> Self {
        Self::Invalid(message.to_string())
    }
}
