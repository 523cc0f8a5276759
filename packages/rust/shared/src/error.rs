//! Error types for stackpages.
//!
//! Library crates use [`StackPagesError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all stackpages operations.
#[derive(Debug, thiserror::Error)]
pub enum StackPagesError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside of per-tool lookups (client construction etc.).
    #[error("network error: {0}")]
    Network(String),

    /// Content index or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A content index query failed. Fatal for page emission.
    #[error("query error: {0}")]
    Query(String),

    /// The host could not resolve a node that must exist (e.g. a markdown node's parent).
    #[error("node not found: {id}")]
    NodeNotFound { id: String },

    /// Two generated pages claim the same route.
    #[error("duplicate page route '{path}'")]
    DuplicateRoute { path: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (duplicate stack paths, invalid field payloads, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StackPagesError>;

impl StackPagesError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a node-not-found error.
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
