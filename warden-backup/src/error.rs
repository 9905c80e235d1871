//! Error types for warden-backup.

use std::path::PathBuf;

use thiserror::Error;

use warden_core::{ConfigError, FailureKind};
use warden_supervisor::SupervisorError;

/// All errors that can arise from backup, restore and catalog operations.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Stopping a running server before restore, or a subprocess probe.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no compression tool available; install zstd, xz or gzip")]
    NoCompressionAvailable,

    #[error("{tool} is not installed")]
    ToolMissing { tool: &'static str },

    #[error("backup file '{file}' not found")]
    BackupNotFound { file: String },

    #[error("unknown backup format: {file}")]
    UnknownFormat { file: String },

    #[error("server {name} is running; stop it first or use --force")]
    ServerRunning { name: String },

    #[error("archiving {archive} failed: {detail}")]
    ArchiveFailed { archive: PathBuf, detail: String },

    #[error("restore failed: {detail}")]
    RestoreFailed { detail: String },
}

impl BackupError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BackupError::Config(inner) => inner.kind(),
            BackupError::Supervisor(inner) => inner.kind(),
            BackupError::NoCompressionAvailable | BackupError::ToolMissing { .. } => {
                FailureKind::ExternalToolUnavailable
            }
            BackupError::BackupNotFound { .. } => FailureKind::NotFound,
            BackupError::UnknownFormat { .. } => FailureKind::Validation,
            BackupError::ServerRunning { .. } => FailureKind::Conflict,
            BackupError::Io { .. }
            | BackupError::ArchiveFailed { .. }
            | BackupError::RestoreFailed { .. } => FailureKind::OperationFailed,
        }
    }
}

/// Convenience constructor for [`BackupError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BackupError {
    BackupError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_taxonomy() {
        assert_eq!(
            BackupError::NoCompressionAvailable.kind(),
            FailureKind::ExternalToolUnavailable
        );
        assert_eq!(
            BackupError::ServerRunning { name: "a".into() }.kind(),
            FailureKind::Conflict
        );
        assert_eq!(
            BackupError::BackupNotFound { file: "x".into() }.kind(),
            FailureKind::NotFound
        );
        let stop = BackupError::from(SupervisorError::NotRunning { name: "a".into() });
        assert_eq!(stop.kind(), FailureKind::Conflict);
    }

    #[test]
    fn running_message_mentions_force() {
        let err = BackupError::ServerRunning {
            name: "survival".into(),
        };
        assert!(err.to_string().contains("--force"));
    }
}
