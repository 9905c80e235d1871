//! Filesystem layout and environment overrides.
//!
//! ```text
//! <base>/                      WARDEN_BASE_PATH, else /opt/minecraft if writable, else cwd
//!   config.yaml                WARDEN_CONFIG_PATH overrides
//!   backups/                   WARDEN_BACKUP_PATH overrides
//! <server>/
//!   server.properties
//!   logs/latest.log
//! ```

use std::path::{Path, PathBuf};

pub const BASE_PATH_ENV: &str = "WARDEN_BASE_PATH";
pub const CONFIG_PATH_ENV: &str = "WARDEN_CONFIG_PATH";
pub const BACKUP_PATH_ENV: &str = "WARDEN_BACKUP_PATH";

pub const DEFAULT_BASE_PATH: &str = "/opt/minecraft";
pub const CONFIG_FILE: &str = "config.yaml";
pub const BACKUP_DIR: &str = "backups";
pub const SERVER_PROPERTIES: &str = "server.properties";

pub fn base_path() -> PathBuf {
    if let Some(path) = env_path(BASE_PATH_ENV) {
        return path;
    }
    let default = Path::new(DEFAULT_BASE_PATH);
    if is_writable_dir(default) {
        return default.to_path_buf();
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn config_path() -> PathBuf {
    env_path(CONFIG_PATH_ENV).unwrap_or_else(|| base_path().join(CONFIG_FILE))
}

pub fn backup_path() -> PathBuf {
    env_path(BACKUP_PATH_ENV).unwrap_or_else(|| base_path().join(BACKUP_DIR))
}

pub fn server_logs_path(server_path: &Path) -> PathBuf {
    server_path.join("logs")
}

pub fn latest_log_path(server_path: &Path) -> PathBuf {
    server_logs_path(server_path).join("latest.log")
}

pub fn server_properties_path(server_path: &Path) -> PathBuf {
    server_path.join(SERVER_PROPERTIES)
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn is_writable_dir(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_dir() && !meta.permissions().readonly())
        .unwrap_or(false)
}
