//! In-memory stand-ins for the session, process and port probes.
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for downstream integration tests. Every fake records what it was asked to
//! do so tests can assert on the exact interaction.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::SupervisorError;
use crate::port::PortProber;
use crate::process::{ProcessInspector, Signal};
use crate::session::SessionProbe;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub name: String,
    pub working_dir: PathBuf,
    pub command: Vec<String>,
}

#[derive(Debug, Default)]
struct SessionState {
    running: BTreeMap<String, u32>,
    created: Vec<CreatedSession>,
    sent: Vec<(String, String)>,
    killed: Vec<String>,
    attached: Vec<String>,
    reaps: usize,
    ignore_stop: BTreeSet<String>,
    ignore_kill: BTreeSet<String>,
    crash_on_start: BTreeSet<String>,
    refuse_create: bool,
    refuse_send: bool,
    next_pid: u32,
}

/// Sessions that honour `stop` on the console by exiting immediately.
#[derive(Debug)]
pub struct FakeSessions {
    state: Mutex<SessionState>,
    calls: AtomicUsize,
}

impl Default for FakeSessions {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSessions {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState {
                next_pid: 4000,
                ..SessionState::default()
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_running(self, name: &str, pid: u32) -> Self {
        lock(&self.state).running.insert(name.to_string(), pid);
        self
    }

    /// The console swallows `stop`; only a kill ends the session.
    pub fn ignore_stop(self, name: &str) -> Self {
        lock(&self.state).ignore_stop.insert(name.to_string());
        self
    }

    /// `kill` reports success but the session survives.
    pub fn ignore_kill(self, name: &str) -> Self {
        lock(&self.state).ignore_kill.insert(name.to_string());
        self
    }

    /// `create` succeeds but the session is gone by the time it is checked.
    pub fn crash_on_start(self, name: &str) -> Self {
        lock(&self.state).crash_on_start.insert(name.to_string());
        self
    }

    pub fn refuse_create(self) -> Self {
        lock(&self.state).refuse_create = true;
        self
    }

    pub fn refuse_send(self) -> Self {
        lock(&self.state).refuse_send = true;
        self
    }

    pub fn is_running(&self, name: &str) -> bool {
        lock(&self.state).running.contains_key(name)
    }

    pub fn created(&self) -> Vec<CreatedSession> {
        lock(&self.state).created.clone()
    }

    /// Lines typed into consoles, as `(session, text)`.
    pub fn sent_lines(&self) -> Vec<(String, String)> {
        lock(&self.state).sent.clone()
    }

    pub fn sent_to(&self, name: &str) -> Vec<String> {
        lock(&self.state)
            .sent
            .iter()
            .filter(|(session, _)| session == name)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn kills(&self) -> Vec<String> {
        lock(&self.state).killed.clone()
    }

    pub fn attached(&self) -> Vec<String> {
        lock(&self.state).attached.clone()
    }

    pub fn reaps(&self) -> usize {
        lock(&self.state).reaps
    }

    /// Total trait calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) -> MutexGuard<'_, SessionState> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.state)
    }
}

#[async_trait]
impl SessionProbe for FakeSessions {
    async fn exists(&self, name: &str) -> Result<bool, SupervisorError> {
        Ok(self.touch().running.contains_key(name))
    }

    async fn create(
        &self,
        name: &str,
        working_dir: &Path,
        command: &[String],
    ) -> Result<bool, SupervisorError> {
        let mut state = self.touch();
        if state.refuse_create {
            return Ok(false);
        }
        state.created.push(CreatedSession {
            name: name.to_string(),
            working_dir: working_dir.to_path_buf(),
            command: command.to_vec(),
        });
        if !state.crash_on_start.contains(name) {
            let pid = state.next_pid;
            state.next_pid += 1;
            state.running.insert(name.to_string(), pid);
        }
        Ok(true)
    }

    async fn send_line(&self, name: &str, text: &str) -> Result<bool, SupervisorError> {
        let mut state = self.touch();
        if state.refuse_send || !state.running.contains_key(name) {
            return Ok(false);
        }
        state.sent.push((name.to_string(), text.to_string()));
        if text == "stop" && !state.ignore_stop.contains(name) {
            state.running.remove(name);
        }
        Ok(true)
    }

    async fn pid(&self, name: &str) -> Result<Option<u32>, SupervisorError> {
        Ok(self.touch().running.get(name).copied())
    }

    async fn kill(&self, name: &str) -> Result<bool, SupervisorError> {
        let mut state = self.touch();
        state.killed.push(name.to_string());
        if !state.ignore_kill.contains(name) {
            state.running.remove(name);
        }
        Ok(true)
    }

    async fn attach(&self, name: &str) -> Result<bool, SupervisorError> {
        let mut state = self.touch();
        state.attached.push(name.to_string());
        Ok(state.running.contains_key(name))
    }

    async fn list_all(&self) -> Result<Vec<String>, SupervisorError> {
        Ok(self.touch().running.keys().cloned().collect())
    }

    async fn reap_stale(&self) -> Result<(), SupervisorError> {
        self.touch().reaps += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ProcessState {
    alive: BTreeSet<u32>,
    children: BTreeMap<u32, Vec<u32>>,
    ignore_term: BTreeSet<u32>,
    memory_kb: BTreeMap<u32, u64>,
    signals: Vec<(u32, Signal)>,
}

#[derive(Debug, Default)]
pub struct FakeProcesses {
    state: Mutex<ProcessState>,
}

impl FakeProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(self, pid: u32, memory_kb: u64) -> Self {
        {
            let mut state = lock(&self.state);
            state.alive.insert(pid);
            state.memory_kb.insert(pid, memory_kb);
        }
        self
    }

    pub fn with_child(self, parent: u32, child: u32) -> Self {
        {
            let mut state = lock(&self.state);
            state.alive.insert(child);
            state.children.entry(parent).or_default().push(child);
        }
        self
    }

    /// SIGTERM is delivered but ignored.
    pub fn ignore_term(self, pid: u32) -> Self {
        lock(&self.state).ignore_term.insert(pid);
        self
    }

    pub fn signals(&self) -> Vec<(u32, Signal)> {
        lock(&self.state).signals.clone()
    }

    pub fn alive(&self, pid: u32) -> bool {
        lock(&self.state).alive.contains(&pid)
    }
}

#[async_trait]
impl ProcessInspector for FakeProcesses {
    async fn is_alive(&self, pid: u32) -> Result<bool, SupervisorError> {
        Ok(self.alive(pid))
    }

    async fn uptime(&self, pid: u32) -> Result<Option<String>, SupervisorError> {
        Ok(self.alive(pid).then(|| "01:00".to_string()))
    }

    async fn resident_memory_kb(&self, pid: u32) -> Result<Option<u64>, SupervisorError> {
        let state = lock(&self.state);
        if !state.alive.contains(&pid) {
            return Ok(None);
        }
        Ok(state.memory_kb.get(&pid).copied())
    }

    async fn terminate(&self, pid: u32, signal: Signal) -> Result<bool, SupervisorError> {
        let mut state = lock(&self.state);
        state.signals.push((pid, signal));
        if !state.alive.contains(&pid) {
            return Ok(false);
        }
        if signal == Signal::Kill || !state.ignore_term.contains(&pid) {
            state.alive.remove(&pid);
        }
        Ok(true)
    }

    async fn child_pids(&self, parent: u32) -> Result<Vec<u32>, SupervisorError> {
        let state = lock(&self.state);
        let mut children: Vec<u32> = state
            .children
            .get(&parent)
            .map(|c| c.iter().copied().filter(|pid| state.alive.contains(pid)).collect())
            .unwrap_or_default();
        children.sort_unstable();
        Ok(children)
    }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakePorts {
    in_use: Mutex<BTreeSet<u16>>,
    probes: AtomicUsize,
}

impl FakePorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_in_use(self, port: u16) -> Self {
        lock(&self.in_use).insert(port);
        self
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortProber for FakePorts {
    async fn is_in_use(&self, port: u16) -> Result<bool, SupervisorError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.in_use).contains(&port))
    }
}
