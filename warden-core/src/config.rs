//! YAML configuration store.
//!
//! # Storage layout
//!
//! ```text
//! <config_path>            (mode 0600, created with default profiles on first load)
//! <config_path>.tmp        (transient, during save)
//! ```
//!
//! JSON documents load as well, JSON being a subset of YAML.
//!
//! # API pattern
//!
//! - `load_at(path)`: explicit path; used in tests with `TempDir`
//! - `load()`: resolves [`paths::config_path`], delegates to `load_at`
//!
//! Tests must NEVER call `load()`; always use `load_at`.

use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::paths;
use crate::timings::{Timings, MAX_WAIT};
use crate::types::{Config, ResourceProfile, ServerDefinition};
use crate::validate::{validate_memory, validate_server_name};

/// Loaded, validated configuration plus the path it came from.
///
/// Read-only for the supervisor and backup crates; only the CLI edits it.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    // -----------------------------------------------------------------------
    // 1. Load
    // -----------------------------------------------------------------------

    /// Load from `path`, writing a default document first if it is absent.
    ///
    /// Returns `ConfigError::Parse` (with path + line context) on malformed
    /// YAML and `ConfigError::Invalid` on schema violations.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "creating default configuration");
            let store = Self {
                path: path.to_path_buf(),
                config: Config::with_default_profiles(),
            };
            store.save()?;
            return Ok(store);
        }

        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_config(path.to_path_buf(), config)
    }

    /// `load_at` convenience wrapper.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&paths::config_path())
    }

    /// Wrap an in-memory document. Validates it; nothing is written.
    pub fn from_config(path: PathBuf, config: Config) -> Result<Self, ConfigError> {
        validate_schema(&path, &config)?;
        Ok(Self { path, config })
    }

    // -----------------------------------------------------------------------
    // 2. Queries
    // -----------------------------------------------------------------------

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timings(&self) -> &Timings {
        &self.config.timings
    }

    pub fn has_server(&self, name: &str) -> bool {
        self.config.servers.contains_key(name)
    }

    pub fn server(&self, name: &str) -> Result<&ServerDefinition, ConfigError> {
        self.config
            .servers
            .get(name)
            .ok_or_else(|| ConfigError::ServerNotFound {
                name: name.to_string(),
            })
    }

    pub fn server_type(&self, tag: &str) -> Result<&ResourceProfile, ConfigError> {
        self.config
            .server_types
            .get(tag)
            .ok_or_else(|| ConfigError::ServerTypeNotFound {
                name: tag.to_string(),
            })
    }

    /// Server names in sorted order.
    pub fn server_names(&self) -> Vec<String> {
        self.config.servers.keys().cloned().collect()
    }

    // -----------------------------------------------------------------------
    // 3. Edits (in memory; call `save` to persist)
    // -----------------------------------------------------------------------

    pub fn add_server(&mut self, name: &str, server: ServerDefinition) -> Result<(), ConfigError> {
        validate_server_name(name)?;
        if self.has_server(name) {
            return Err(ConfigError::ServerExists {
                name: name.to_string(),
            });
        }
        self.server_type(&server.server_type)?;
        check_port(&self.path, name, &server)?;
        self.config.servers.insert(name.to_string(), server);
        Ok(())
    }

    pub fn remove_server(&mut self, name: &str) -> Result<ServerDefinition, ConfigError> {
        self.config
            .servers
            .remove(name)
            .ok_or_else(|| ConfigError::ServerNotFound {
                name: name.to_string(),
            })
    }

    // -----------------------------------------------------------------------
    // 4. Save (atomic)
    // -----------------------------------------------------------------------

    /// Write flow: serialize → `.tmp` sibling → `chmod 0600` → `rename`.
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let yaml = serde_yaml::to_string(&self.config)?;
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn validate_schema(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    for (name, server) in &config.servers {
        validate_server_name(name).map_err(|e| invalid(e.to_string()))?;
        check_port(path, name, server)?;
    }
    for (tag, profile) in &config.server_types {
        validate_memory(&profile.memory)
            .map_err(|e| invalid(format!("server type '{tag}': {e}")))?;
        validate_memory(&profile.min_memory)
            .map_err(|e| invalid(format!("server type '{tag}': {e}")))?;
    }
    if let Some(field) = config.timings.first_over_limit() {
        return Err(invalid(format!(
            "timing '{field}' exceeds {} ms",
            MAX_WAIT.as_millis()
        )));
    }
    Ok(())
}

fn check_port(path: &Path, name: &str, server: &ServerDefinition) -> Result<(), ConfigError> {
    if server.port == Some(0) {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: format!("server '{name}': port must be between 1 and 65535"),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lobby() -> ServerDefinition {
        ServerDefinition {
            server_type: "spigot-params".into(),
            path: PathBuf::from("/srv/lobby"),
            port: Some(25565),
        }
    }

    #[test]
    fn first_load_creates_default_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        let store = ConfigStore::load_at(&path).expect("load");
        assert!(path.exists());
        assert!(store.server_names().is_empty());
        assert!(store.server_type("spigot-params").is_ok());
        assert!(store.server_type("proxy-params").is_ok());
    }

    #[test]
    fn default_file_is_private() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        ConfigStore::load_at(&path).expect("load");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn add_save_reload_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("config.yaml");
        let mut store = ConfigStore::load_at(&path).expect("load");
        store.add_server("lobby", lobby()).expect("add");
        store.save().expect("save");

        let reloaded = ConfigStore::load_at(&path).expect("reload");
        assert!(reloaded.has_server("lobby"));
        assert_eq!(reloaded.server("lobby").expect("server"), &lobby());
        assert!(!path.with_file_name("config.yaml.tmp").exists());
    }

    #[test]
    fn add_rejects_duplicates_and_unknown_types() {
        let dir = TempDir::new().expect("tempdir");
        let mut store = ConfigStore::load_at(&dir.path().join("c.yaml")).expect("load");
        store.add_server("lobby", lobby()).expect("add");

        let err = store.add_server("lobby", lobby()).unwrap_err();
        assert!(matches!(err, ConfigError::ServerExists { .. }));

        let mut odd = lobby();
        odd.server_type = "forge-params".into();
        let err = store.add_server("modded", odd).unwrap_err();
        assert!(matches!(err, ConfigError::ServerTypeNotFound { .. }));
    }

    #[test]
    fn unknown_server_is_not_found_kind() {
        let store =
            ConfigStore::from_config(PathBuf::from("mem.yaml"), Config::default()).expect("store");
        let err = store.server("ghost").unwrap_err();
        assert_eq!(err.kind(), crate::FailureKind::NotFound);
        assert!(err.to_string().contains("ghost"));
    }
}
