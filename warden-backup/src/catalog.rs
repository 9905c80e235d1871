//! Backup naming convention and the directory-scan catalog.
//!
//! The filename is the only metadata store:
//!
//! ```text
//! <server>_backup_<YYYY-MM-DDTHH-MM-SS>.tar.{zst,xz,gz}       regular backups
//! <server>_before_restore_<YYYY-MM-DDTHH-MM-SS>.tar.gz         restore safety snapshots
//! ```
//!
//! Timestamps are UTC. Safety snapshots never show up in the catalog.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use crate::compression::{info_from_extension, Codec, CompressionInfo, GZIP};
use crate::error::{io_err, BackupError};

pub const BACKUP_MARKER: &str = "_backup_";
pub const SNAPSHOT_MARKER: &str = "_before_restore_";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn backup_filename(server: &str, at: DateTime<Utc>, info: CompressionInfo) -> String {
    format!("{server}{BACKUP_MARKER}{}{}", timestamp(at), info.extension)
}

/// Safety snapshots are always gzip so they can be restored on any host.
pub fn snapshot_filename(server: &str, at: DateTime<Utc>) -> String {
    format!("{server}{SNAPSHOT_MARKER}{}{}", timestamp(at), GZIP.extension)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub server: String,
    /// `None` when the timestamp segment is not in [`TIMESTAMP_FORMAT`].
    pub created_at: Option<DateTime<Utc>>,
    pub info: CompressionInfo,
}

/// Split a backup filename into owner, timestamp and codec.
///
/// Returns `None` for anything outside the naming convention, including
/// unknown extensions and safety snapshots.
pub fn parse_backup_filename(filename: &str) -> Option<ParsedName> {
    let info = info_from_extension(filename)?;
    let stem = &filename[..filename.len() - info.extension.len()];
    // Timestamps never contain the marker, so the last one is the separator.
    let (server, stamp) = stem.rsplit_once(BACKUP_MARKER)?;
    if server.is_empty() {
        return None;
    }
    let created_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc());
    Some(ParsedName {
        server: server.to_string(),
        created_at,
        info,
    })
}

/// `B` below a KiB, otherwise two decimals of the largest unit up to `GB`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    let b = bytes as f64;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.2} KB", b / KB as f64)
    } else if bytes < GB {
        format!("{:.2} MB", b / MB as f64)
    } else {
        format!("{:.2} GB", b / GB as f64)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub filename: String,
    pub server: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub size: String,
    pub created_at: DateTime<Utc>,
    pub codec: Codec,
}

/// One scan of the backup directory, newest first.
#[derive(Debug, Clone, Default)]
pub struct BackupCatalog {
    records: Vec<BackupRecord>,
}

impl BackupCatalog {
    /// A missing directory is an empty catalog. Entries that vanish or
    /// cannot be stat'ed mid-scan are skipped.
    pub fn scan(dir: &Path) -> Result<Self, BackupError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(io_err(dir, err)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(dir, e))?;
            let Some(filename) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let Some(parsed) = parse_backup_filename(&filename) else {
                continue;
            };
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(err) => {
                    tracing::debug!(file = %filename, error = %err, "skipping unreadable backup");
                    continue;
                }
            };
            let created_at = match parsed.created_at {
                Some(at) => at,
                None => match metadata.modified() {
                    Ok(mtime) => DateTime::<Utc>::from(mtime),
                    Err(_) => continue,
                },
            };
            records.push(BackupRecord {
                path: entry.path(),
                server: parsed.server,
                size_bytes: metadata.len(),
                size: format_size(metadata.len()),
                created_at,
                codec: parsed.info.codec,
                filename,
            });
        }

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        Ok(Self { records })
    }

    pub fn records(&self) -> &[BackupRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records owned by `server` (exact match), or all of them.
    pub fn owned_by<'a>(
        &'a self,
        server: Option<&'a str>,
    ) -> impl Iterator<Item = &'a BackupRecord> + 'a {
        self.records
            .iter()
            .filter(move |r| server.map_or(true, |s| r.server == s))
    }

    /// Records strictly older than `cutoff`.
    pub fn older_than<'a>(
        &'a self,
        server: Option<&'a str>,
        cutoff: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a BackupRecord> + 'a {
        self.owned_by(server).filter(move |r| r.created_at < cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::{XZ, ZSTD};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn names_follow_convention() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 13, 5, 9).unwrap();
        assert_eq!(
            backup_filename("survival", at, ZSTD),
            "survival_backup_2024-06-01T13-05-09.tar.zst"
        );
        assert_eq!(
            snapshot_filename("survival", at),
            "survival_before_restore_2024-06-01T13-05-09.tar.gz"
        );
    }

    #[test]
    fn parses_owner_time_and_codec() {
        let parsed = parse_backup_filename("my_server_backup_2024-01-01T00-00-00.tar.xz").unwrap();
        assert_eq!(parsed.server, "my_server");
        assert_eq!(parsed.info, XZ);
        assert_eq!(
            parsed.created_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_names_outside_convention() {
        assert!(parse_backup_filename("a_backup_2024-01-01T00-00-00.zip").is_none());
        assert!(parse_backup_filename("a_before_restore_2024-01-01T00-00-00.tar.gz").is_none());
        assert!(parse_backup_filename("_backup_2024-01-01T00-00-00.tar.gz").is_none());
        assert!(parse_backup_filename("notes.txt").is_none());
    }

    #[test]
    fn unparsable_timestamp_still_matches() {
        let parsed = parse_backup_filename("a_backup_legacy.tar.gz").unwrap();
        assert_eq!(parsed.server, "a");
        assert_eq!(parsed.created_at, None);
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        let catalog = BackupCatalog::scan(&dir.path().join("nope")).expect("scan");
        assert!(catalog.is_empty());
    }

    #[test]
    fn ties_break_by_filename_descending() {
        let dir = TempDir::new().expect("tempdir");
        for name in [
            "a_backup_2024-01-01T00-00-00.tar.gz",
            "b_backup_2024-01-01T00-00-00.tar.gz",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let catalog = BackupCatalog::scan(dir.path()).expect("scan");
        let names: Vec<&str> = catalog.records().iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(
            names,
            [
                "b_backup_2024-01-01T00-00-00.tar.gz",
                "a_backup_2024-01-01T00-00-00.tar.gz"
            ]
        );
    }
}
