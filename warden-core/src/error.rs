//! Error types for warden-core.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::validate::ValidationError;

/// Coarse failure taxonomy shared by every warden crate.
///
/// Front ends use it to pick colours and exit behaviour without matching on
/// each crate's concrete error enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Bad server name, port or memory syntax. The operation was never attempted.
    Validation,
    /// Unknown server or backup file.
    NotFound,
    /// Already running, port occupied, running-but-not-forced.
    Conflict,
    /// A required host tool (compression, network probe) is missing.
    ExternalToolUnavailable,
    /// An underlying subprocess or filesystem step failed.
    OperationFailed,
    /// A polling ceiling was exceeded and escalation did not recover.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Validation => "validation",
            FailureKind::NotFound => "not found",
            FailureKind::Conflict => "conflict",
            FailureKind::ExternalToolUnavailable => "tool unavailable",
            FailureKind::OperationFailed => "operation failed",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// All errors that can arise from config store operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but violates the schema.
    #[error("invalid configuration at {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },

    #[error("server '{name}' does not exist in configuration")]
    ServerNotFound { name: String },

    #[error("server '{name}' already exists in configuration")]
    ServerExists { name: String },

    #[error("server type '{name}' not found in configuration")]
    ServerTypeNotFound { name: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ConfigError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ConfigError::ServerNotFound { .. } | ConfigError::ServerTypeNotFound { .. } => {
                FailureKind::NotFound
            }
            ConfigError::ServerExists { .. } => FailureKind::Conflict,
            ConfigError::Validation(_) | ConfigError::Invalid { .. } => FailureKind::Validation,
            ConfigError::Io { .. } | ConfigError::Yaml(_) | ConfigError::Parse { .. } => {
                FailureKind::OperationFailed
            }
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
