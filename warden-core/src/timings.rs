//! Settle delays and polling ceilings.
//!
//! The managed process has no readiness signal, so every value here is a
//! tuned heuristic. They live in the config file (milliseconds on disk) so
//! operators can tune them and tests can shrink them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Longest any single wait may be configured to.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Timings {
    #[serde(default)]
    pub lifecycle: LifecycleTimings,
    #[serde(default)]
    pub backup: BackupTimings,
}

impl Timings {
    /// Name of the first wait above [`MAX_WAIT`], if any.
    pub fn first_over_limit(&self) -> Option<&'static str> {
        let l = &self.lifecycle;
        let b = &self.backup;
        [
            ("lifecycle.startup_settle", l.startup_settle),
            ("lifecycle.graceful_stop_timeout", l.graceful_stop_timeout),
            ("lifecycle.stop_poll_interval", l.stop_poll_interval),
            ("lifecycle.term_grace", l.term_grace),
            ("lifecycle.kill_grace", l.kill_grace),
            ("lifecycle.restart_settle", l.restart_settle),
            ("backup.first_flush_delay", b.first_flush_delay),
            ("backup.second_flush_delay", b.second_flush_delay),
            ("backup.freeze_settle", b.freeze_settle),
            ("backup.restore_stop_settle", b.restore_stop_settle),
        ]
        .into_iter()
        .find(|(_, wait)| *wait > MAX_WAIT)
        .map(|(name, _)| name)
    }
}

/// Waits used by start / stop / restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleTimings {
    /// Wait after creating the session before checking it survived.
    #[serde(with = "millis")]
    pub startup_settle: Duration,
    /// Ceiling for the graceful `stop` console command.
    #[serde(with = "millis")]
    pub graceful_stop_timeout: Duration,
    #[serde(with = "millis")]
    pub stop_poll_interval: Duration,
    /// Wait after SIGTERM before checking liveness.
    #[serde(with = "millis")]
    pub term_grace: Duration,
    /// Wait after SIGKILL before killing the session.
    #[serde(with = "millis")]
    pub kill_grace: Duration,
    #[serde(with = "millis")]
    pub restart_settle: Duration,
}

impl Default for LifecycleTimings {
    fn default() -> Self {
        Self {
            startup_settle: Duration::from_secs(5),
            graceful_stop_timeout: Duration::from_secs(60),
            stop_poll_interval: Duration::from_secs(1),
            term_grace: Duration::from_secs(5),
            kill_grace: Duration::from_secs(2),
            restart_settle: Duration::from_secs(2),
        }
    }
}

/// Waits used by the flush-and-freeze protocol and restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupTimings {
    #[serde(with = "millis")]
    pub first_flush_delay: Duration,
    #[serde(with = "millis")]
    pub second_flush_delay: Duration,
    /// Wait after `save-off` before archiving starts.
    #[serde(with = "millis")]
    pub freeze_settle: Duration,
    /// Wait after force-stopping a server ahead of a restore.
    #[serde(with = "millis")]
    pub restore_stop_settle: Duration,
}

impl Default for BackupTimings {
    fn default() -> Self {
        Self {
            first_flush_delay: Duration::from_secs(5),
            second_flush_delay: Duration::from_secs(3),
            freeze_settle: Duration::from_secs(15),
            restore_stop_settle: Duration::from_secs(3),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
