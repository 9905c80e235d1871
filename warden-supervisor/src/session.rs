//! Detached terminal sessions hosting the managed server process.
//!
//! A session is only ever referenced by name. Nothing here caches state:
//! sessions can be killed from outside at any moment, so every call
//! re-queries the multiplexer.

use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::command::{run_tool, shell_quote};
use crate::error::{io_err, SupervisorError};

/// Operations on named detached sessions.
///
/// Every method fails soft: a missing multiplexer binary or a non-zero exit
/// yields `false` / `None` / an empty list. `Err` is reserved for unexpected
/// I/O failures.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, SupervisorError>;

    /// Start `command` inside a new detached session rooted at `working_dir`.
    async fn create(
        &self,
        name: &str,
        working_dir: &Path,
        command: &[String],
    ) -> Result<bool, SupervisorError>;

    /// Type `text` followed by Enter into the session's console.
    async fn send_line(&self, name: &str, text: &str) -> Result<bool, SupervisorError>;

    /// Pid of the session's own process (a shell wrapper, not the server).
    async fn pid(&self, name: &str) -> Result<Option<u32>, SupervisorError>;

    async fn kill(&self, name: &str) -> Result<bool, SupervisorError>;

    /// Hand the controlling terminal to the session until the user detaches.
    async fn attach(&self, name: &str) -> Result<bool, SupervisorError>;

    async fn list_all(&self) -> Result<Vec<String>, SupervisorError>;

    /// Drop bookkeeping for dead sessions. Call after every kill.
    async fn reap_stale(&self) -> Result<(), SupervisorError>;
}

/// One row of `screen -list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub pid: u32,
    pub name: String,
}

/// Parse `screen -list` output into `(pid, name)` rows.
///
/// ```text
/// There are screens on:
///         12345.lobby     (Detached)
///         12346.survival  (16/10/26 09:00:00)     (Attached)
/// 2 Sockets in /run/screen/S-mc.
/// ```
pub fn parse_session_list(stdout: &str) -> Vec<SessionEntry> {
    static ROW: OnceLock<Regex> = OnceLock::new();
    let row = ROW.get_or_init(|| Regex::new(r"^\s*(\d+)\.(\S+)").expect("static regex"));

    stdout
        .lines()
        .filter_map(|line| {
            let caps = row.captures(line)?;
            let pid = caps[1].parse().ok()?;
            Some(SessionEntry {
                pid,
                name: caps[2].to_string(),
            })
        })
        .collect()
}

/// GNU `screen` backend.
#[derive(Debug, Clone, Default)]
pub struct ScreenSessions;

impl ScreenSessions {
    pub fn new() -> Self {
        Self
    }

    async fn entries(&self) -> Result<Vec<SessionEntry>, SupervisorError> {
        // `screen -list` exit status differs between versions even when
        // sessions exist, so only the listing itself is trusted.
        let out = run_tool("screen", &["-list"]).await?;
        if !out.found {
            return Ok(Vec::new());
        }
        Ok(parse_session_list(&out.stdout))
    }

    async fn entry(&self, name: &str) -> Result<Option<SessionEntry>, SupervisorError> {
        Ok(self.entries().await?.into_iter().find(|e| e.name == name))
    }
}

#[async_trait]
impl SessionProbe for ScreenSessions {
    async fn exists(&self, name: &str) -> Result<bool, SupervisorError> {
        Ok(self.entry(name).await?.is_some())
    }

    async fn create(
        &self,
        name: &str,
        working_dir: &Path,
        command: &[String],
    ) -> Result<bool, SupervisorError> {
        let dir = working_dir.to_string_lossy();
        let script = format!(
            "cd {} && {}",
            shell_quote(&dir),
            command
                .iter()
                .map(|arg| shell_quote(arg))
                .collect::<Vec<_>>()
                .join(" ")
        );
        tracing::debug!(session = name, %script, "creating screen session");
        let out = run_tool(
            "screen",
            &["-dmS", name, "-c", "/dev/null", "bash", "-c", &script],
        )
        .await?;
        Ok(out.success)
    }

    async fn send_line(&self, name: &str, text: &str) -> Result<bool, SupervisorError> {
        // `stuff` types raw input; a carriage return is the Enter key.
        let keys = format!("{text}\r");
        let out = run_tool("screen", &["-S", name, "-X", "stuff", &keys]).await?;
        Ok(out.success)
    }

    async fn pid(&self, name: &str) -> Result<Option<u32>, SupervisorError> {
        Ok(self.entry(name).await?.map(|e| e.pid))
    }

    async fn kill(&self, name: &str) -> Result<bool, SupervisorError> {
        let out = run_tool("screen", &["-S", name, "-X", "quit"]).await?;
        Ok(out.success)
    }

    async fn attach(&self, name: &str) -> Result<bool, SupervisorError> {
        let status = Command::new("screen")
            .args(["-x", name])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;
        match status {
            Ok(status) => Ok(status.success()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_err("screen -x", err)),
        }
    }

    async fn list_all(&self) -> Result<Vec<String>, SupervisorError> {
        Ok(self.entries().await?.into_iter().map(|e| e.name).collect())
    }

    async fn reap_stale(&self) -> Result<(), SupervisorError> {
        // Exits non-zero when there is nothing to wipe.
        run_tool("screen", &["-wipe"]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "There are screens on:\n\
        \t12345.lobby\t(Detached)\n\
        \t12346.survival\t(16/10/26 09:00:00)\t(Attached)\n\
        \t777.lobby2\t(Dead ???)\n\
        3 Sockets in /run/screen/S-mc.\n";

    #[test]
    fn parses_pid_and_name_rows() {
        let rows = parse_session_list(LISTING);
        assert_eq!(
            rows,
            vec![
                SessionEntry { pid: 12345, name: "lobby".into() },
                SessionEntry { pid: 12346, name: "survival".into() },
                SessionEntry { pid: 777, name: "lobby2".into() },
            ]
        );
    }

    #[test]
    fn no_sockets_listing_is_empty() {
        let out = "No Sockets found in /run/screen/S-mc.\n";
        assert!(parse_session_list(out).is_empty());
    }

    #[test]
    fn names_match_exactly_not_by_prefix() {
        let rows = parse_session_list(LISTING);
        assert!(rows.iter().any(|e| e.name == "lobby"));
        assert!(!rows.iter().any(|e| e.name == "lob"));
        assert!(!rows.iter().any(|e| e.name == "survival2"));
    }
}
