//! Error types for configuration compilation.

use std::io;
use std::path::PathBuf;

/// Errors raised while compiling a configuration.
///
/// Syntax errors are detected before any builder runs. Value errors come from
/// the build pass; by then earlier sections may already have created
/// directories, which are left in place. Storage errors are whatever a storage
/// engine raised while being constructed, passed through unchanged.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Malformed nesting, unknown section type, misplaced or duplicate section.
    #[error("{message} (line {line})")]
    Syntax { message: String, line: usize },

    /// Malformed option value, missing or unknown option, duplicate database name.
    #[error("{message}")]
    Value { message: String },

    #[error(transparent)]
    Storage(#[from] dbtopo_core_store::Error),

    #[error("could not read configuration {path}: {error}")]
    Io { path: PathBuf, error: io::Error },
}

impl ConfigError {
    pub(crate) fn syntax(message: impl Into<String>, line: usize) -> Self {
        ConfigError::Syntax {
            message: message.into(),
            line,
        }
    }

    pub(crate) fn value(message: impl Into<String>) -> Self {
        ConfigError::Value {
            message: message.into(),
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, ConfigError::Syntax { .. })
    }

    pub fn is_value(&self) -> bool {
        matches!(self, ConfigError::Value { .. })
    }

    /// Whether a storage refused to open because it is read-only.
    pub fn is_read_only(&self) -> bool {
        matches!(self, ConfigError::Storage(e) if e.is_read_only())
    }

    /// Source line of a syntax error.
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Syntax { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Result type alias for compilation.
pub type Result<T> = std::result::Result<T, ConfigError>;
