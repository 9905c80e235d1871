//! Server lifecycle controller: start / stop / restart / send / status.
//!
//! # State machine
//!
//! ```text
//!            start                      stop (graceful ≤ ceiling)
//! stopped ───────────► running ─────────────────────────────► stopped
//!                         │   timeout or force: TERM → KILL → quit session
//!                         └─────────────────────────────────► stopped
//! ```
//!
//! "Starting" and "stopping" are only the duration of these calls; the
//! session listing is the single source of truth and is re-queried on every
//! step. Concurrent calls against the same server are not coordinated.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::{sleep, Instant};

use warden_core::validate::validate_server_name;
use warden_core::{ConfigStore, LifecycleTimings, ResourceProfile, ServerDefinition};

use crate::error::SupervisorError;
use crate::port::{write_configured_port, PortProber, SocketTablePorts};
use crate::process::{ProcessInspector, Signal, SystemProcesses};
use crate::session::{ScreenSessions, SessionProbe};
use crate::status::{RunState, ServerRuntimeStatus, StopOutcome};

/// Console command that asks the server to shut down cleanly.
pub const STOP_COMMAND: &str = "stop";

pub struct ServerController {
    config: Arc<ConfigStore>,
    sessions: Arc<dyn SessionProbe>,
    processes: Arc<dyn ProcessInspector>,
    ports: Arc<dyn PortProber>,
    timings: LifecycleTimings,
}

impl ServerController {
    /// Timings default to the ones in `config`.
    pub fn new(
        config: Arc<ConfigStore>,
        sessions: Arc<dyn SessionProbe>,
        processes: Arc<dyn ProcessInspector>,
        ports: Arc<dyn PortProber>,
    ) -> Self {
        let timings = config.timings().lifecycle;
        Self {
            config,
            sessions,
            processes,
            ports,
            timings,
        }
    }

    /// Production wiring: GNU screen, live process table, netstat/ss.
    pub fn system(config: Arc<ConfigStore>) -> Self {
        Self::new(
            config,
            Arc::new(ScreenSessions::new()),
            Arc::new(SystemProcesses::new()),
            Arc::new(SocketTablePorts::new()),
        )
    }

    pub fn with_timings(mut self, timings: LifecycleTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn sessions(&self) -> Arc<dyn SessionProbe> {
        Arc::clone(&self.sessions)
    }

    pub async fn is_running(&self, name: &str) -> Result<bool, SupervisorError> {
        self.sessions.exists(name).await
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    pub async fn start(&self, name: &str, attach: bool) -> Result<(), SupervisorError> {
        validate_server_name(name)?;
        let server = self.config.server(name)?;
        if self.sessions.exists(name).await? {
            return Err(SupervisorError::AlreadyRunning {
                name: name.to_string(),
            });
        }

        let profile = self.config.server_type(&server.server_type)?;
        let proxy = profile.is_proxy(&server.server_type);
        if let (false, Some(port)) = (proxy, server.port) {
            if self.ports.is_in_use(port).await? {
                return Err(SupervisorError::PortInUse { port });
            }
            if !write_configured_port(&server.path, port) {
                tracing::warn!(server = name, port, "could not write port into server.properties");
            }
        }

        let command = launch_command(name, server, profile);
        if !self.sessions.create(name, &server.path, &command).await? {
            return Err(SupervisorError::SessionRefused {
                name: name.to_string(),
            });
        }
        tracing::info!(server = name, path = %server.path.display(), "session created");

        sleep(self.timings.startup_settle).await;
        if !self.sessions.exists(name).await? {
            return Err(SupervisorError::CrashedOnStartup {
                name: name.to_string(),
            });
        }
        tracing::info!(server = name, "server started");

        if attach {
            self.sessions.attach(name).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // stop
    // -----------------------------------------------------------------------

    pub async fn stop(&self, name: &str, force: bool) -> Result<StopOutcome, SupervisorError> {
        validate_server_name(name)?;
        if !self.sessions.exists(name).await? {
            return Err(SupervisorError::NotRunning {
                name: name.to_string(),
            });
        }

        if force {
            return self.force_stop(name, false).await;
        }

        self.sessions.send_line(name, STOP_COMMAND).await?;
        if self.wait_for_exit(name).await? {
            self.reap_stale().await;
            tracing::info!(server = name, "stopped gracefully");
            return Ok(StopOutcome::Graceful);
        }

        tracing::warn!(
            server = name,
            timeout_ms = self.timings.graceful_stop_timeout.as_millis() as u64,
            "graceful stop timed out; escalating to signals"
        );
        self.force_stop(name, true).await
    }

    async fn wait_for_exit(&self, name: &str) -> Result<bool, SupervisorError> {
        let deadline = Instant::now().checked_add(self.timings.graceful_stop_timeout);
        loop {
            if !self.sessions.exists(name).await? {
                return Ok(true);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(false);
            }
            sleep(self.timings.stop_poll_interval).await;
        }
    }

    async fn force_stop(
        &self,
        name: &str,
        after_timeout: bool,
    ) -> Result<StopOutcome, SupervisorError> {
        if let Some(pid) = self.managed_pid(name).await? {
            tracing::info!(server = name, pid, "sending SIGTERM");
            self.processes.terminate(pid, Signal::Term).await?;
            sleep(self.timings.term_grace).await;

            if self.processes.is_alive(pid).await? {
                tracing::warn!(server = name, pid, "still alive after SIGTERM; sending SIGKILL");
                self.processes.terminate(pid, Signal::Kill).await?;
                sleep(self.timings.kill_grace).await;
            }
        }

        self.sessions.kill(name).await?;
        self.reap_stale().await;

        if self.sessions.exists(name).await? {
            return Err(SupervisorError::StopFailed {
                name: name.to_string(),
                after_timeout,
            });
        }
        Ok(if after_timeout {
            StopOutcome::EscalatedAfterTimeout
        } else {
            StopOutcome::Forced
        })
    }

    async fn reap_stale(&self) {
        if let Err(err) = self.sessions.reap_stale().await {
            tracing::warn!(error = %err, "failed to reap stale sessions");
        }
    }

    /// Session pid → first child (the JVM), falling back to the session pid.
    async fn managed_pid(&self, name: &str) -> Result<Option<u32>, SupervisorError> {
        let Some(session_pid) = self.sessions.pid(name).await? else {
            return Ok(None);
        };
        let children = self.processes.child_pids(session_pid).await?;
        Ok(Some(children.first().copied().unwrap_or(session_pid)))
    }

    // -----------------------------------------------------------------------
    // restart / send / attach
    // -----------------------------------------------------------------------

    /// Returns how the server was stopped, or `None` if it was not running.
    pub async fn restart(&self, name: &str) -> Result<Option<StopOutcome>, SupervisorError> {
        let stopped = match self.stop(name, false).await {
            Ok(outcome) => Some(outcome),
            Err(SupervisorError::NotRunning { .. }) => None,
            Err(err) => return Err(err),
        };
        sleep(self.timings.restart_settle).await;
        self.start(name, false).await?;
        Ok(stopped)
    }

    pub async fn send_command(&self, name: &str, text: &str) -> Result<(), SupervisorError> {
        validate_server_name(name)?;
        if !self.sessions.exists(name).await? {
            return Err(SupervisorError::NotRunning {
                name: name.to_string(),
            });
        }
        if !self.sessions.send_line(name, text).await? {
            return Err(SupervisorError::SendFailed {
                name: name.to_string(),
            });
        }
        tracing::debug!(server = name, command = text, "command sent");
        Ok(())
    }

    pub async fn attach_console(&self, name: &str) -> Result<(), SupervisorError> {
        validate_server_name(name)?;
        if !self.sessions.exists(name).await? {
            return Err(SupervisorError::NotRunning {
                name: name.to_string(),
            });
        }
        self.sessions.attach(name).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // status
    // -----------------------------------------------------------------------

    pub async fn status(&self, name: &str) -> Result<ServerRuntimeStatus, SupervisorError> {
        let server = self.config.server(name)?;
        let profile = self.config.server_type(&server.server_type)?;
        let running = self.sessions.exists(name).await?;

        let mut status = ServerRuntimeStatus {
            name: name.to_string(),
            server_type: server.server_type.clone(),
            proxy: profile.is_proxy(&server.server_type),
            port: server.port,
            status: if running {
                RunState::Running
            } else {
                RunState::Stopped
            },
            pid: None,
            uptime: None,
            memory_mb: None,
            port_in_use: None,
        };

        if running {
            if let Some(pid) = self.managed_pid(name).await? {
                status.pid = Some(pid);
                status.uptime = self.processes.uptime(pid).await?;
                status.memory_mb = self.processes.resident_memory_mb(pid).await?;
            }
        }
        if let Some(port) = server.port {
            status.port_in_use = Some(self.ports.is_in_use(port).await?);
        }
        Ok(status)
    }

    /// Probe every configured server concurrently. One entry per server, in
    /// config order; a failing server never aborts the batch.
    pub async fn status_all(&self) -> Vec<(String, Result<ServerRuntimeStatus, SupervisorError>)> {
        let names = self.config.server_names();
        join_all(names.into_iter().map(|name| async move {
            let result = self.status(&name).await;
            if let Err(err) = &result {
                tracing::warn!(server = %name, error = %err, "status probe failed");
            }
            (name, result)
        }))
        .await
    }
}

/// `java [-Dproc_name=<name>] -Xmx.. -Xms.. <flags..> -jar <jar> [nogui]`.
///
/// Proxies get neither the process tag nor `nogui`.
pub fn launch_command(
    name: &str,
    server: &ServerDefinition,
    profile: &ResourceProfile,
) -> Vec<String> {
    let proxy = profile.is_proxy(&server.server_type);
    let mut command = vec!["java".to_string()];
    if !proxy {
        command.push(format!("-Dproc_name={name}"));
    }
    command.push(format!("-Xmx{}", profile.memory));
    command.push(format!("-Xms{}", profile.min_memory));
    command.extend(profile.jvm_flags.iter().cloned());
    command.push("-jar".to_string());
    command.push(profile.jar_for(&server.server_type).to_string());
    if !proxy {
        command.push("nogui".to_string());
    }
    command
}
