//! Error types for pokefetch.
//!
//! Library crates use [`PokefetchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;

/// What a failed remote lookup was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTarget {
    /// A primary record lookup by ID.
    Id(i64),
    /// A secondary sub-resource lookup by reference URI.
    Uri(String),
}

impl fmt::Display for LookupTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Uri(uri) => write!(f, "uri {uri}"),
        }
    }
}

/// Top-level error type for all pokefetch operations.
#[derive(Debug, thiserror::Error)]
pub enum PokefetchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Range precondition violated; no work was attempted.
    #[error("invalid range: from {from} is greater than to {to}")]
    InvalidRange { from: i64, to: i64 },

    /// The remote service returned an error for a lookup.
    #[error("upstream lookup failed for {target}: {message}")]
    UpstreamLookup {
        target: LookupTarget,
        message: String,
    },

    /// The record store could not be read (absent or corrupt).
    #[error("store read failed: {0}")]
    StoreRead(String),

    /// The record store could not be written.
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// The cache/sink rejected an upsert.
    #[error("sink write failed: {0}")]
    SinkWrite(String),

    /// The cache/sink could not be read back.
    #[error("sink read failed: {0}")]
    SinkRead(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A worker task ended abnormally (panicked or was aborted).
    #[error("worker failed: {0}")]
    Worker(String),

    /// The run was cancelled by its caller before it completed.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PokefetchError>;

impl PokefetchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// A failed primary lookup for `id`.
    pub fn upstream_id(id: i64, msg: impl Into<String>) -> Self {
        Self::UpstreamLookup {
            target: LookupTarget::Id(id),
            message: msg.into(),
        }
    }

    /// A failed secondary lookup for `uri`.
    pub fn upstream_uri(uri: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::UpstreamLookup {
            target: LookupTarget::Uri(uri.into()),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from a remote lookup.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamLookup { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PokefetchError::InvalidRange { from: 5, to: 3 };
        assert_eq!(
            err.to_string(),
            "invalid range: from 5 is greater than to 3"
        );

        let err = PokefetchError::upstream_id(7, "HTTP 404 Not Found");
        assert_eq!(
            err.to_string(),
            "upstream lookup failed for id 7: HTTP 404 Not Found"
        );

        let err = PokefetchError::upstream_uri("https://pokeapi.co/api/v2/ability/9/", "timeout");
        assert!(err.to_string().contains("uri https://pokeapi.co/api/v2/ability/9/"));
    }

    #[test]
    fn upstream_classification() {
        assert!(PokefetchError::upstream_id(1, "x").is_upstream());
        assert!(!PokefetchError::StoreRead("missing".into()).is_upstream());
        assert!(!PokefetchError::Cancelled.is_upstream());
    }
}
