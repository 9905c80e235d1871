//! Backup / restore orchestration.
//!
//! # Backup protocol (live server)
//!
//! ```text
//! save-all ─ first_flush_delay ─ save-all ─ second_flush_delay ─ save-off ─ freeze_settle
//!     └─► archive ─► save-on   (save-on is sent even when archiving fails)
//! ```
//!
//! The console gives no acknowledgement, so the delays are a heuristic.
//!
//! # Restore protocol
//!
//! 1. Stop the server (only with `force`).
//! 2. Secure the current directory: gzip snapshot into the backup dir, then
//!    delete. If the snapshot cannot be taken the directory is renamed aside.
//! 3. Extract the archive into the server's parent directory.
//! 4. On failure: drop partial output and put the secured copy back.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tokio::time::sleep;

use warden_core::{BackupTimings, ConfigStore, ServerDefinition};
use warden_supervisor::{ServerController, SessionProbe};

use crate::archiver::{Archiver, TarArchiver, DEFAULT_EXCLUDES};
use crate::catalog::{
    backup_filename, format_size, snapshot_filename, timestamp, BackupCatalog, BackupRecord,
};
use crate::compression::{info_from_extension, CompressionInfo, CompressionNegotiator, GZIP};
use crate::error::{io_err, BackupError};

pub const SAVE_ALL: &str = "save-all";
pub const SAVE_OFF: &str = "save-off";
pub const SAVE_ON: &str = "save-on";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub server_path: PathBuf,
    /// Safety snapshot of the directory that was replaced, if there was one.
    pub snapshot: Option<PathBuf>,
}

/// How the pre-restore directory was preserved.
#[derive(Debug)]
enum SafetyCopy {
    Nothing,
    Snapshot(PathBuf),
    SetAside(PathBuf),
}

pub struct BackupOrchestrator {
    config: Arc<ConfigStore>,
    sessions: Arc<dyn SessionProbe>,
    controller: Arc<ServerController>,
    negotiator: CompressionNegotiator,
    archiver: Arc<dyn Archiver>,
    backup_dir: PathBuf,
    timings: BackupTimings,
}

impl BackupOrchestrator {
    /// Uses the controller's session backend, `tar`, `PATH` codec lookup and
    /// the timings from `config`.
    pub fn new(
        config: Arc<ConfigStore>,
        controller: Arc<ServerController>,
        backup_dir: PathBuf,
    ) -> Self {
        let timings = config.timings().backup;
        Self {
            sessions: controller.sessions(),
            config,
            controller,
            negotiator: CompressionNegotiator::new(),
            archiver: Arc::new(TarArchiver::new()),
            backup_dir,
            timings,
        }
    }

    pub fn with_negotiator(mut self, negotiator: CompressionNegotiator) -> Self {
        self.negotiator = negotiator;
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn with_timings(mut self, timings: BackupTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    // -----------------------------------------------------------------------
    // create
    // -----------------------------------------------------------------------

    pub async fn create_backup(&self, name: &str) -> Result<BackupOutcome, BackupError> {
        let server = self.config.server(name)?.clone();
        let info = self.negotiator.detect_best()?;
        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .map_err(|e| io_err(&self.backup_dir, e))?;

        let frozen = if self.sessions.exists(name).await? {
            self.flush_and_freeze(name).await;
            true
        } else {
            false
        };

        let result = self.archive(name, &server, info).await;

        if frozen {
            self.resume_saves(name).await;
        }

        match &result {
            Ok(outcome) => tracing::info!(
                server = name,
                path = %outcome.path.display(),
                size = %outcome.size,
                "backup created"
            ),
            Err(err) => tracing::warn!(server = name, error = %err, "backup failed"),
        }
        result
    }

    async fn flush_and_freeze(&self, name: &str) {
        self.console(name, SAVE_ALL).await;
        sleep(self.timings.first_flush_delay).await;
        self.console(name, SAVE_ALL).await;
        sleep(self.timings.second_flush_delay).await;
        self.console(name, SAVE_OFF).await;
        sleep(self.timings.freeze_settle).await;
    }

    async fn resume_saves(&self, name: &str) {
        match self.sessions.exists(name).await {
            Ok(true) => self.console(name, SAVE_ON).await,
            Ok(false) => tracing::warn!(server = name, "session gone; cannot re-enable auto-save"),
            Err(err) => tracing::warn!(server = name, error = %err, "cannot re-enable auto-save"),
        }
    }

    /// Console injection without acknowledgement; failures are logged only.
    async fn console(&self, name: &str, command: &str) {
        match self.sessions.send_line(name, command).await {
            Ok(true) => tracing::debug!(server = name, command, "console command sent"),
            Ok(false) => tracing::warn!(server = name, command, "console command refused"),
            Err(err) => tracing::warn!(server = name, command, error = %err, "console command failed"),
        }
    }

    async fn archive(
        &self,
        name: &str,
        server: &ServerDefinition,
        info: CompressionInfo,
    ) -> Result<BackupOutcome, BackupError> {
        let path = self
            .backup_dir
            .join(backup_filename(name, Utc::now(), info));

        if let Err(err) = self
            .archiver
            .create(&server.path, &path, info, &DEFAULT_EXCLUDES)
            .await
        {
            remove_file_quietly(&path).await;
            return Err(err);
        }

        let size_bytes = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_err(&path, e))?
            .len();
        Ok(BackupOutcome {
            path,
            size_bytes,
            size: format_size(size_bytes),
        })
    }

    // -----------------------------------------------------------------------
    // restore
    // -----------------------------------------------------------------------

    pub async fn restore_backup(
        &self,
        name: &str,
        file: &str,
        force: bool,
    ) -> Result<RestoreOutcome, BackupError> {
        let server = self.config.server(name)?.clone();
        let archive = self.resolve_archive(file).await?;
        let info = archive
            .file_name()
            .and_then(|f| f.to_str())
            .and_then(info_from_extension)
            .ok_or_else(|| BackupError::UnknownFormat {
                file: file.to_string(),
            })?;

        if self.sessions.exists(name).await? {
            if !force {
                return Err(BackupError::ServerRunning {
                    name: name.to_string(),
                });
            }
            let outcome = self.controller.stop(name, true).await?;
            tracing::info!(server = name, ?outcome, "stopped for restore");
            sleep(self.timings.restore_stop_settle).await;
        }

        let parent = server
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let safety = self.secure_existing(name, &server.path, &parent).await?;

        let extracted = match tokio::fs::create_dir_all(&parent).await {
            Ok(()) => self.archiver.extract(&archive, info, &parent).await,
            Err(err) => Err(io_err(&parent, err)),
        };

        match extracted {
            Ok(()) => {
                let snapshot = match safety {
                    SafetyCopy::Snapshot(path) => Some(path),
                    SafetyCopy::SetAside(aside) => {
                        if let Err(err) = tokio::fs::remove_dir_all(&aside).await {
                            tracing::warn!(path = %aside.display(), error = %err, "could not remove set-aside copy");
                        }
                        None
                    }
                    SafetyCopy::Nothing => None,
                };
                tracing::info!(server = name, archive = %archive.display(), "restore complete");
                Ok(RestoreOutcome {
                    server_path: server.path,
                    snapshot,
                })
            }
            Err(err) => {
                tracing::warn!(server = name, error = %err, "extraction failed; rolling back");
                self.roll_back(&server.path, &parent, &safety).await;
                Err(BackupError::RestoreFailed {
                    detail: err.to_string(),
                })
            }
        }
    }

    /// Literal path first, then relative to the backup directory.
    async fn resolve_archive(&self, file: &str) -> Result<PathBuf, BackupError> {
        for candidate in [PathBuf::from(file), self.backup_dir.join(file)] {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(candidate);
            }
        }
        Err(BackupError::BackupNotFound {
            file: file.to_string(),
        })
    }

    async fn secure_existing(
        &self,
        name: &str,
        server_path: &Path,
        parent: &Path,
    ) -> Result<SafetyCopy, BackupError> {
        if !tokio::fs::try_exists(server_path).await.unwrap_or(false) {
            return Ok(SafetyCopy::Nothing);
        }

        let now = Utc::now();
        let snapshot = self.backup_dir.join(snapshot_filename(name, now));
        let snapshotted = match tokio::fs::create_dir_all(&self.backup_dir).await {
            Ok(()) => self.archiver.create(server_path, &snapshot, GZIP, &[]).await,
            Err(err) => Err(io_err(&self.backup_dir, err)),
        };

        match snapshotted {
            Ok(()) => {
                tracing::info!(server = name, snapshot = %snapshot.display(), "safety snapshot taken");
                if let Err(err) = tokio::fs::remove_dir_all(server_path).await {
                    let err = io_err(server_path, err);
                    self.roll_back(server_path, parent, &SafetyCopy::Snapshot(snapshot))
                        .await;
                    return Err(err);
                }
                Ok(SafetyCopy::Snapshot(snapshot))
            }
            Err(err) => {
                remove_file_quietly(&snapshot).await;
                let aside = set_aside_path(server_path, &timestamp(now));
                tracing::warn!(
                    server = name,
                    error = %err,
                    aside = %aside.display(),
                    "safety snapshot failed; moving directory aside"
                );
                tokio::fs::rename(server_path, &aside)
                    .await
                    .map_err(|e| io_err(server_path, e))?;
                Ok(SafetyCopy::SetAside(aside))
            }
        }
    }

    /// Best effort: every failure here is logged and swallowed so the
    /// caller can report the original error.
    async fn roll_back(&self, server_path: &Path, parent: &Path, safety: &SafetyCopy) {
        if let Err(err) = tokio::fs::remove_dir_all(server_path).await {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %server_path.display(), error = %err, "could not clear partial restore");
            }
        }
        match safety {
            SafetyCopy::Nothing => {}
            SafetyCopy::Snapshot(snapshot) => {
                if let Err(err) = self.archiver.extract(snapshot, GZIP, parent).await {
                    tracing::warn!(snapshot = %snapshot.display(), error = %err, "could not restore safety snapshot");
                }
            }
            SafetyCopy::SetAside(aside) => {
                if let Err(err) = tokio::fs::rename(aside, server_path).await {
                    tracing::warn!(aside = %aside.display(), error = %err, "could not move directory back");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // catalog queries
    // -----------------------------------------------------------------------

    /// Newest first, optionally limited to one owner.
    pub fn list_backups(&self, server: Option<&str>) -> Result<Vec<BackupRecord>, BackupError> {
        let catalog = BackupCatalog::scan(&self.backup_dir)?;
        Ok(catalog.owned_by(server).cloned().collect())
    }

    /// Delete backups created strictly before `now - days`. Returns how many
    /// are gone afterwards, counting files that disappeared on their own.
    ///
    /// A retention period reaching past the representable calendar keeps
    /// everything.
    pub fn cleanup_old_backups(
        &self,
        server: Option<&str>,
        days: u32,
    ) -> Result<usize, BackupError> {
        let Some(cutoff) = TimeDelta::try_days(i64::from(days))
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            tracing::info!(days, "retention period out of range; nothing to clean up");
            return Ok(0);
        };
        let catalog = BackupCatalog::scan(&self.backup_dir)?;

        let mut deleted = 0;
        for record in catalog.older_than(server, cutoff) {
            match std::fs::remove_file(&record.path) {
                Ok(()) => deleted += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => deleted += 1,
                Err(err) => {
                    tracing::warn!(file = %record.filename, error = %err, "could not delete backup");
                }
            }
        }
        tracing::info!(deleted, days, "old backups cleaned up");
        Ok(deleted)
    }
}

fn set_aside_path(server_path: &Path, stamp: &str) -> PathBuf {
    let name = server_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "server".to_string());
    server_path.with_file_name(format!("{name}.before_restore_{stamp}"))
}

async fn remove_file_quietly(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            tracing::debug!(path = %path.display(), error = %err, "could not remove partial archive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_aside_is_a_sibling() {
        let aside = set_aside_path(Path::new("/srv/mc/survival"), "2024-01-01T00-00-00");
        assert_eq!(
            aside,
            PathBuf::from("/srv/mc/survival.before_restore_2024-01-01T00-00-00")
        );
    }
}
