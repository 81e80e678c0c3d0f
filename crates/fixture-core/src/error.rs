//! Error types shared by the fixture crates.

use crate::schema::SchemaError;
use std::path::{Path, PathBuf};

/// Error raised by a database connection while running a statement.
pub type StatementError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used across the fixture crates.
pub type Result<T, E = FixtureError> = std::result::Result<T, E>;

/// Errors that can occur while loading or synchronizing fixtures.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// Malformed fixture source data.
    #[error("{}: {message}", path.display())]
    Format {
        /// File the bad data came from
        path: PathBuf,
        /// What was wrong, including the offending line or parser message
        message: String,
    },

    /// A fixture, table or entity could not be resolved.
    #[error("{0}")]
    Resolution(String),

    /// A value cannot be rendered for its declared column type.
    #[error("invalid value for column '{column}': {message}")]
    Value {
        /// Column the value was destined for
        column: String,
        /// Why the value was rejected
        message: String,
    },

    /// A statement failed on the database connection.
    #[error("statement failed: {sql}: {source}")]
    Statement {
        /// The SQL that was being executed
        sql: String,
        /// Error reported by the connection
        #[source]
        source: StatementError,
    },

    /// Error reading a fixture file or directory.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File or directory being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Error loading column metadata.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl FixtureError {
    /// Build a [`FixtureError::Format`] for `path`.
    pub fn format(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Build a [`FixtureError::Io`] for `path`.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a [`FixtureError::Statement`] for `sql`.
    pub fn statement(sql: impl Into<String>, source: impl Into<StatementError>) -> Self {
        Self::Statement {
            sql: sql.into(),
            source: source.into(),
        }
    }

    /// Build a [`FixtureError::Value`] for `column`.
    pub fn value(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Value {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a format error.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// Check if this is a resolution error.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }
}
