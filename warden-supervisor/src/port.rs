//! TCP port occupancy and `server.properties` port rewriting.

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use warden_core::paths::server_properties_path;

use crate::command::run_tool;
use crate::error::SupervisorError;

const PORT_PROPERTY: &str = "server-port";

#[async_trait]
pub trait PortProber: Send + Sync {
    /// `false` when occupancy cannot be proven, including when no probe
    /// tool is installed. Startup must never be blocked by a missing tool.
    async fn is_in_use(&self, port: u16) -> Result<bool, SupervisorError>;

    /// First free port in `start..start + max_attempts`.
    async fn find_available(
        &self,
        start: u16,
        max_attempts: u16,
    ) -> Result<Option<u16>, SupervisorError> {
        for offset in 0..max_attempts {
            let Some(port) = start.checked_add(offset) else {
                break;
            };
            if !self.is_in_use(port).await? {
                return Ok(Some(port));
            }
        }
        Ok(None)
    }
}

/// Reads the socket table through `netstat -tuln`, falling back to `ss -tuln`.
#[derive(Debug, Clone, Default)]
pub struct SocketTablePorts;

impl SocketTablePorts {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortProber for SocketTablePorts {
    async fn is_in_use(&self, port: u16) -> Result<bool, SupervisorError> {
        for tool in ["netstat", "ss"] {
            let out = run_tool(tool, &["-tuln"]).await?;
            if out.success {
                return Ok(listing_has_local_port(&out.stdout, port));
            }
        }
        tracing::debug!(port, "no socket table tool available; assuming port is free");
        Ok(false)
    }
}

/// True when some row's local address (the first `host:port` column) ends
/// in `:<port>`. Header lines and peer addresses are ignored.
pub fn listing_has_local_port(listing: &str, port: u16) -> bool {
    listing.lines().any(|line| {
        line.split_whitespace()
            .find(|token| token.contains(':'))
            .and_then(|local| local.rsplit_once(':'))
            .and_then(|(_, p)| p.parse::<u16>().ok())
            == Some(port)
    })
}

fn port_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(&format!(r"(?m)^[ \t]*{PORT_PROPERTY}[ \t]*=[ \t]*\d*[ \t]*(?P<eol>\r?)$"))
            .expect("static regex")
    })
}

/// Rewrite (or append) the port line in `<server>/server.properties`.
///
/// Whole-file read/replace/write, not atomic: only call while the server is
/// confirmed stopped. Any failure returns `false`.
pub fn write_configured_port(server_path: &Path, port: u16) -> bool {
    let path = server_properties_path(server_path);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cannot read server properties");
            return false;
        }
    };

    let line = format!("{PORT_PROPERTY}={port}");
    let updated = if port_line().is_match(&content) {
        let replacement = format!("{line}${{eol}}");
        port_line().replace(&content, replacement.as_str()).into_owned()
    } else if content.is_empty() || content.ends_with('\n') {
        format!("{content}{line}\n")
    } else {
        format!("{content}\n{line}\n")
    };

    match std::fs::write(&path, updated) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cannot write server properties");
            false
        }
    }
}

pub fn read_configured_port(server_path: &Path) -> Option<u16> {
    let content = std::fs::read_to_string(server_properties_path(server_path)).ok()?;
    content.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if key.trim() != PORT_PROPERTY {
            return None;
        }
        value.trim().parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakePorts;
    use std::fs;
    use tempfile::TempDir;

    const NETSTAT: &str = "Active Internet connections (only servers)\n\
        Proto Recv-Q Send-Q Local Address           Foreign Address         State\n\
        tcp        0      0 0.0.0.0:25565           0.0.0.0:*               LISTEN\n\
        tcp6       0      0 :::25577                :::*                    LISTEN\n\
        udp        0      0 127.0.0.53:53           0.0.0.0:*\n";

    const SS: &str = "Netid State  Recv-Q Send-Q Local Address:Port  Peer Address:Port\n\
        tcp   LISTEN 0      128    0.0.0.0:25565       0.0.0.0:*\n\
        tcp   ESTAB  0      0      10.0.0.2:41000      10.0.0.9:25570\n";

    #[test]
    fn netstat_local_ports_detected() {
        assert!(listing_has_local_port(NETSTAT, 25565));
        assert!(listing_has_local_port(NETSTAT, 25577));
        assert!(listing_has_local_port(NETSTAT, 53));
        assert!(!listing_has_local_port(NETSTAT, 2556));
    }

    #[test]
    fn ss_peer_ports_are_not_local() {
        assert!(listing_has_local_port(SS, 25565));
        assert!(listing_has_local_port(SS, 41000));
        assert!(!listing_has_local_port(SS, 25570), "peer column must be ignored");
    }

    fn server_dir(props: &str) -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("server.properties"), props).expect("write props");
        dir
    }

    #[test]
    fn rewrites_existing_port_line() {
        let dir = server_dir("motd=hi\nserver-port=25565\nonline-mode=true\n");
        assert!(write_configured_port(dir.path(), 25570));
        let content = fs::read_to_string(dir.path().join("server.properties")).unwrap();
        assert_eq!(content, "motd=hi\nserver-port=25570\nonline-mode=true\n");
        assert_eq!(read_configured_port(dir.path()), Some(25570));
    }

    #[test]
    fn appends_missing_port_line() {
        let dir = server_dir("motd=hi");
        assert!(write_configured_port(dir.path(), 25600));
        let content = fs::read_to_string(dir.path().join("server.properties")).unwrap();
        assert_eq!(content, "motd=hi\nserver-port=25600\n");
    }

    #[test]
    fn similar_keys_are_untouched() {
        let dir = server_dir("query.port=25565\nrcon.port=25575\n");
        assert!(write_configured_port(dir.path(), 25566));
        let content = fs::read_to_string(dir.path().join("server.properties")).unwrap();
        assert!(content.contains("query.port=25565"));
        assert!(content.contains("rcon.port=25575"));
        assert!(content.ends_with("server-port=25566\n"));
    }

    #[test]
    fn spaced_port_line_is_rewritten_in_place() {
        let dir = server_dir("motd=hi\nserver-port = 25565\nonline-mode=true\n");
        assert_eq!(read_configured_port(dir.path()), Some(25565));
        assert!(write_configured_port(dir.path(), 25570));
        let content = fs::read_to_string(dir.path().join("server.properties")).unwrap();
        assert_eq!(content, "motd=hi\nserver-port=25570\nonline-mode=true\n");
    }

    #[test]
    fn missing_properties_file_fails_soft() {
        let dir = TempDir::new().expect("tempdir");
        assert!(!write_configured_port(dir.path(), 25565));
        assert_eq!(read_configured_port(dir.path()), None);
    }

    #[tokio::test]
    async fn find_available_skips_occupied_ports() {
        let ports = FakePorts::new().with_in_use(25565).with_in_use(25566);
        assert_eq!(ports.find_available(25565, 10).await.unwrap(), Some(25567));
        assert_eq!(ports.probes(), 3);
    }

    #[tokio::test]
    async fn find_available_gives_up_after_max_attempts() {
        let ports = FakePorts::new()
            .with_in_use(25565)
            .with_in_use(25566)
            .with_in_use(25567);
        assert_eq!(ports.find_available(25565, 3).await.unwrap(), None);
        assert_eq!(ports.probes(), 3);
    }

    #[tokio::test]
    async fn find_available_does_not_wrap_past_last_port() {
        let ports = FakePorts::new().with_in_use(u16::MAX - 1).with_in_use(u16::MAX);
        assert_eq!(ports.find_available(u16::MAX - 1, 10).await.unwrap(), None);
        assert_eq!(ports.probes(), 2);
    }
}
