//! Process-table inspection and signalling by pid.
//!
//! The session pid is a shell wrapper; the managed server is its first
//! child. Callers resolve that with [`ProcessInspector::child_pids`] before
//! reading metrics or escalating to signals.

use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::SupervisorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Term,
    Kill,
}

#[async_trait]
pub trait ProcessInspector: Send + Sync {
    async fn is_alive(&self, pid: u32) -> Result<bool, SupervisorError>;

    /// Elapsed time since start, formatted like `ps -o etime`.
    async fn uptime(&self, pid: u32) -> Result<Option<String>, SupervisorError>;

    async fn resident_memory_kb(&self, pid: u32) -> Result<Option<u64>, SupervisorError>;

    /// Returns `false` if the signal could not be delivered.
    async fn terminate(&self, pid: u32, signal: Signal) -> Result<bool, SupervisorError>;

    /// Direct children of `parent`, ascending.
    async fn child_pids(&self, parent: u32) -> Result<Vec<u32>, SupervisorError>;

    async fn resident_memory_mb(&self, pid: u32) -> Result<Option<u64>, SupervisorError> {
        Ok(self.resident_memory_kb(pid).await?.map(kb_to_mb))
    }
}

/// KB → MB, rounding half up.
pub fn kb_to_mb(kb: u64) -> u64 {
    (kb + 512) / 1024
}

/// `[[dd-]hh:]mm:ss`, as printed by `ps -o etime`.
pub fn format_elapsed(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{days}-{hours:02}:{minutes:02}:{secs:02}")
    } else if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Live process table via `sysinfo`, signals via `nix`.
#[derive(Debug, Clone, Default)]
pub struct SystemProcesses;

impl SystemProcesses {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    run_time: u64,
    memory_bytes: u64,
}

async fn snapshot(pid: u32) -> Result<Option<Snapshot>, SupervisorError> {
    blocking("process snapshot", move || {
        let mut system = System::new();
        let target = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
        system.process(target).map(|p| Snapshot {
            run_time: p.run_time(),
            memory_bytes: p.memory(),
        })
    })
    .await
}

async fn blocking<T, F>(task: &'static str, f: F) -> Result<T, SupervisorError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SupervisorError::Join {
            task,
            detail: e.to_string(),
        })
}

#[async_trait]
impl ProcessInspector for SystemProcesses {
    async fn is_alive(&self, pid: u32) -> Result<bool, SupervisorError> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal;
            use nix::unistd::Pid as NixPid;

            let Ok(raw) = i32::try_from(pid) else {
                return Ok(false);
            };
            // Null signal: existence check only.
            match signal::kill(NixPid::from_raw(raw), None) {
                Ok(()) => Ok(true),
                Err(Errno::EPERM) => Ok(true),
                Err(_) => Ok(false),
            }
        }

        #[cfg(not(unix))]
        {
            Ok(snapshot(pid).await?.is_some())
        }
    }

    async fn uptime(&self, pid: u32) -> Result<Option<String>, SupervisorError> {
        Ok(snapshot(pid).await?.map(|s| format_elapsed(s.run_time)))
    }

    async fn resident_memory_kb(&self, pid: u32) -> Result<Option<u64>, SupervisorError> {
        Ok(snapshot(pid).await?.map(|s| s.memory_bytes / 1024))
    }

    async fn terminate(&self, pid: u32, signal: Signal) -> Result<bool, SupervisorError> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{self as nix_signal, Signal as NixSignal};
            use nix::unistd::Pid as NixPid;

            let Ok(raw) = i32::try_from(pid) else {
                return Ok(false);
            };
            let sig = match signal {
                Signal::Term => NixSignal::SIGTERM,
                Signal::Kill => NixSignal::SIGKILL,
            };
            match nix_signal::kill(NixPid::from_raw(raw), sig) {
                Ok(()) => Ok(true),
                Err(err) => {
                    tracing::debug!(pid, ?signal, error = %err, "signal not delivered");
                    Ok(false)
                }
            }
        }

        #[cfg(not(unix))]
        {
            blocking("terminate", move || {
                let mut system = System::new();
                let target = Pid::from_u32(pid);
                system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
                let sig = match signal {
                    Signal::Term => sysinfo::Signal::Term,
                    Signal::Kill => sysinfo::Signal::Kill,
                };
                system
                    .process(target)
                    .and_then(|p| p.kill_with(sig))
                    .unwrap_or(false)
            })
            .await
        }
    }

    async fn child_pids(&self, parent: u32) -> Result<Vec<u32>, SupervisorError> {
        blocking("child pid scan", move || {
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::All, true);
            let parent = Pid::from_u32(parent);
            let mut children: Vec<u32> = system
                .processes()
                .iter()
                .filter(|(_, p)| p.parent() == Some(parent) && p.thread_kind().is_none())
                .map(|(pid, _)| pid.as_u32())
                .collect();
            children.sort_unstable();
            children
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_formats_like_ps() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(65), "01:05");
        assert_eq!(format_elapsed(3_600), "01:00:00");
        assert_eq!(format_elapsed(3 * 86_400 + 4 * 3_600 + 5 * 60 + 6), "3-04:05:06");
    }

    #[test]
    fn memory_rounds_half_up() {
        assert_eq!(kb_to_mb(0), 0);
        assert_eq!(kb_to_mb(511), 0);
        assert_eq!(kb_to_mb(512), 1);
        assert_eq!(kb_to_mb(1_048_576), 1024);
        assert_eq!(kb_to_mb(1_536), 2);
    }

    #[tokio::test]
    async fn own_process_is_alive_with_metrics() {
        let inspector = SystemProcesses::new();
        let me = std::process::id();
        assert!(inspector.is_alive(me).await.expect("alive"));
        assert!(inspector.uptime(me).await.expect("uptime").is_some());
        let kb = inspector.resident_memory_kb(me).await.expect("rss");
        assert!(kb.unwrap_or(0) > 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawned_child_is_listed_then_killed() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn sleep");
        let pid = child.id().expect("pid");
        let inspector = SystemProcesses::new();

        let children = inspector
            .child_pids(std::process::id())
            .await
            .expect("children");
        assert!(children.contains(&pid), "{pid} not in {children:?}");

        assert!(inspector.terminate(pid, Signal::Kill).await.expect("kill"));
        let _ = child.wait().await;
        assert!(!inspector.is_alive(pid).await.expect("dead"));
    }

    #[tokio::test]
    async fn unknown_pid_has_no_metrics() {
        let inspector = SystemProcesses::new();
        assert_eq!(inspector.uptime(u32::MAX - 1).await.expect("uptime"), None);
        assert!(!inspector.is_alive(u32::MAX - 1).await.expect("alive"));
    }
}
