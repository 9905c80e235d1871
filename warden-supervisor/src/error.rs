use std::path::PathBuf;

use thiserror::Error;

use warden_core::{ConfigError, FailureKind, ValidationError};

/// Error surface for session, process and port probes and the lifecycle controller.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("server {name} is already running")]
    AlreadyRunning { name: String },

    #[error("server {name} is not running")]
    NotRunning { name: String },

    #[error("port {port} is already in use")]
    PortInUse { port: u16 },

    #[error("failed to start server {name}")]
    SessionRefused { name: String },

    #[error("server {name} did not start correctly")]
    CrashedOnStartup { name: String },

    #[error("failed to send command to {name}")]
    SendFailed { name: String },

    #[error("failed to stop server {name}")]
    StopFailed { name: String, after_timeout: bool },

    #[error("{task} task failed: {detail}")]
    Join { task: &'static str, detail: String },
}

impl SupervisorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SupervisorError::Validation(_) => FailureKind::Validation,
            SupervisorError::Config(inner) => inner.kind(),
            SupervisorError::AlreadyRunning { .. }
            | SupervisorError::NotRunning { .. }
            | SupervisorError::PortInUse { .. } => FailureKind::Conflict,
            SupervisorError::StopFailed {
                after_timeout: true,
                ..
            } => FailureKind::Timeout,
            SupervisorError::Io { .. }
            | SupervisorError::SessionRefused { .. }
            | SupervisorError::CrashedOnStartup { .. }
            | SupervisorError::SendFailed { .. }
            | SupervisorError::StopFailed { .. }
            | SupervisorError::Join { .. } => FailureKind::OperationFailed,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SupervisorError {
    SupervisorError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_failure_kind_depends_on_timeout() {
        let timed_out = SupervisorError::StopFailed {
            name: "lobby".into(),
            after_timeout: true,
        };
        let forced = SupervisorError::StopFailed {
            name: "lobby".into(),
            after_timeout: false,
        };
        assert_eq!(timed_out.kind(), FailureKind::Timeout);
        assert_eq!(forced.kind(), FailureKind::OperationFailed);
        assert_eq!(forced.to_string(), "failed to stop server lobby");
    }

    #[test]
    fn config_errors_keep_their_kind() {
        let err = SupervisorError::from(ConfigError::ServerNotFound {
            name: "ghost".into(),
        });
        assert_eq!(err.kind(), FailureKind::NotFound);
        assert!(err.to_string().contains("does not exist"));
    }
}
