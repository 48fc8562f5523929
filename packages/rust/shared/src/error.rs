//! Error types for the Olist feature tools.
//!
//! Library crates use [`OlistError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all loading and derivation operations.
#[derive(Debug, thiserror::Error)]
pub enum OlistError {
    /// Source directory or file missing or unreadable.
    #[error("cannot access {path:?}: {source}")]
    FileAccess {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A table or column required by a derivation is absent.
    #[error("schema mismatch: {table}.{column} not found")]
    SchemaMismatch { table: String, column: String },

    /// Malformed CSV or a value that cannot be coerced to its field type.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error outside of data loading.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OlistError>;

impl OlistError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Report a missing column; a missing table is reported with column `*`.
    pub fn schema_mismatch(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Wrap a `std::io::Error` raised while reading source data.
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
