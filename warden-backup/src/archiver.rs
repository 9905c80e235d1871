//! Directory archiving behind a trait, with a `tar` implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use warden_supervisor::command::run_tool_in;

use crate::compression::CompressionInfo;
use crate::error::{io_err, BackupError};

/// Never worth keeping in a backup: rotated logs, the live log and crash dumps.
pub const DEFAULT_EXCLUDES: [&str; 3] = ["*.log", "logs/latest.log", "crash-reports"];

#[async_trait]
pub trait Archiver: Send + Sync {
    /// Pack `source` into `archive`. Entries are stored relative to the
    /// parent of `source`, so the archive's single top-level entry is the
    /// directory's own name.
    async fn create(
        &self,
        source: &Path,
        archive: &Path,
        info: CompressionInfo,
        excludes: &[&str],
    ) -> Result<(), BackupError>;

    /// Unpack `archive` inside `dest`.
    async fn extract(
        &self,
        archive: &Path,
        info: CompressionInfo,
        dest: &Path,
    ) -> Result<(), BackupError>;
}

/// Shells out to `tar <codec flag> -cf / -xf`.
#[derive(Debug, Clone, Default)]
pub struct TarArchiver;

impl TarArchiver {
    pub fn new() -> Self {
        Self
    }

    async fn tar(&self, args: Vec<String>, cwd: &Path, archive: &Path) -> Result<(), BackupError> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        tracing::debug!(cwd = %cwd.display(), args = ?argv, "running tar");
        let out = run_tool_in("tar", &argv, Some(cwd)).await?;
        if !out.found {
            return Err(BackupError::ToolMissing { tool: "tar" });
        }
        if !out.success {
            return Err(BackupError::ArchiveFailed {
                archive: archive.to_path_buf(),
                detail: out.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// tar runs with a different working directory, so archive paths must not
/// be relative to ours.
fn absolute(path: &Path) -> Result<PathBuf, BackupError> {
    std::path::absolute(path).map_err(|e| io_err(path, e))
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn create(
        &self,
        source: &Path,
        archive: &Path,
        info: CompressionInfo,
        excludes: &[&str],
    ) -> Result<(), BackupError> {
        let source = absolute(source)?;
        let archive = absolute(archive)?;
        let (Some(parent), Some(dir_name)) = (source.parent(), source.file_name()) else {
            return Err(BackupError::ArchiveFailed {
                archive,
                detail: format!("{} has no parent directory", source.display()),
            });
        };

        let mut args = vec![info.tar_flag.to_string()];
        args.extend(excludes.iter().map(|pattern| format!("--exclude={pattern}")));
        args.push("-cf".to_string());
        args.push(archive.to_string_lossy().into_owned());
        args.push(dir_name.to_string_lossy().into_owned());
        self.tar(args, parent, &archive).await
    }

    async fn extract(
        &self,
        archive: &Path,
        info: CompressionInfo,
        dest: &Path,
    ) -> Result<(), BackupError> {
        let archive = absolute(archive)?;
        let args = vec![
            info.tar_flag.to_string(),
            "-xf".to_string(),
            archive.to_string_lossy().into_owned(),
        ];
        self.tar(args, dest, &archive).await
    }
}
