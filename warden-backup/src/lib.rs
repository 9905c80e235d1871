//! Archive-based backup and restore for managed servers.

pub mod archiver;
pub mod catalog;
pub mod compression;
mod error;
pub mod orchestrator;

pub use archiver::{Archiver, TarArchiver, DEFAULT_EXCLUDES};
pub use catalog::{format_size, parse_backup_filename, BackupCatalog, BackupRecord};
pub use compression::{info_from_extension, Codec, CompressionInfo, CompressionNegotiator};
pub use error::BackupError;
pub use orchestrator::{BackupOrchestrator, BackupOutcome, RestoreOutcome};
