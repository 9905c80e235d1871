//! Wiring shared by every command: configuration plus the production
//! session, process and port backends.

use std::sync::Arc;

use anyhow::{Context, Result};

use warden_backup::BackupOrchestrator;
use warden_core::{paths, ConfigStore};
use warden_supervisor::ServerController;

pub fn load_config() -> Result<ConfigStore> {
    ConfigStore::load().with_context(|| {
        format!(
            "failed to load configuration from {}",
            paths::config_path().display()
        )
    })
}

pub fn controller() -> Result<ServerController> {
    let config = Arc::new(load_config()?);
    Ok(ServerController::system(config))
}

pub fn orchestrator() -> Result<BackupOrchestrator> {
    let config = Arc::new(load_config()?);
    let controller = Arc::new(ServerController::system(Arc::clone(&config)));
    Ok(BackupOrchestrator::new(
        config,
        controller,
        paths::backup_path(),
    ))
}
