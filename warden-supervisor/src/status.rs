//! Derived per-poll runtime status. Never persisted.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => f.write_str("running"),
            RunState::Stopped => f.write_str("stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRuntimeStatus {
    pub name: String,
    pub server_type: String,
    pub proxy: bool,
    pub port: Option<u16>,
    pub status: RunState,
    /// Managed process: first child of the session pid, else the session pid.
    pub pid: Option<u32>,
    pub uptime: Option<String>,
    pub memory_mb: Option<u64>,
    /// Only probed when a port is configured.
    pub port_in_use: Option<bool>,
}

impl ServerRuntimeStatus {
    pub fn is_running(&self) -> bool {
        self.status == RunState::Running
    }

    /// Stopped, yet something else holds the configured port.
    pub fn port_conflict(&self) -> bool {
        !self.is_running() && self.port_in_use == Some(true)
    }
}

/// How a successful stop was achieved. Escalation after a graceful timeout
/// is reported separately from an explicitly forced stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    Graceful,
    Forced,
    EscalatedAfterTimeout,
}

impl StopOutcome {
    /// Success that the operator should still notice.
    pub fn is_warning(&self) -> bool {
        matches!(self, StopOutcome::EscalatedAfterTimeout)
    }

    pub fn describe(&self, name: &str) -> String {
        match self {
            StopOutcome::Graceful => format!("Server {name} stopped gracefully"),
            StopOutcome::Forced => format!("Server {name} was force stopped"),
            StopOutcome::EscalatedAfterTimeout => format!(
                "Server {name} did not stop gracefully in time and was force stopped"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_messages_are_distinct() {
        let graceful = StopOutcome::Graceful.describe("lobby");
        let forced = StopOutcome::Forced.describe("lobby");
        let escalated = StopOutcome::EscalatedAfterTimeout.describe("lobby");
        assert_ne!(forced, escalated);
        assert_ne!(graceful, forced);
        assert!(escalated.contains("did not stop gracefully"));
        assert!(StopOutcome::EscalatedAfterTimeout.is_warning());
        assert!(!StopOutcome::Forced.is_warning());
    }

    #[test]
    fn status_serializes_lowercase() {
        let status = ServerRuntimeStatus {
            name: "lobby".into(),
            server_type: "proxy-params".into(),
            proxy: true,
            port: Some(25577),
            status: RunState::Stopped,
            pid: None,
            uptime: None,
            memory_mb: None,
            port_in_use: Some(true),
        };
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["status"], "stopped");
        assert!(status.port_conflict());
    }
}
