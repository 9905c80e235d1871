//! Config store error-message, atomic-write-safety, and schema integration tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;

use warden_core::{
    types::{Config, ServerDefinition},
    ConfigError, ConfigStore, FailureKind,
};

fn survival() -> ServerDefinition {
    ServerDefinition {
        server_type: "spigot-params".to_string(),
        path: PathBuf::from("/srv/survival"),
        port: Some(25566),
    }
}

// ---------------------------------------------------------------------------
// 1. Load error messages
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = ConfigStore::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "got: {err}");
}

#[test]
fn load_wrong_shape_returns_parse_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("- this is a list, not a mapping\n").expect("write");

    let err = ConfigStore::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[rstest]
#[case(
    "servers:\n  'bad name':\n    type: spigot-params\n    path: /srv/x\nserver_types: {}\n",
    "invalid characters"
)]
#[case(
    "servers:\n  lobby:\n    type: spigot-params\n    path: /srv/x\n    port: 0\nserver_types: {}\n",
    "port must be between"
)]
#[case(
    "servers: {}\nserver_types:\n  tiny:\n    memory: lots\n    min_memory: 1G\n    jvm_flags: []\n",
    "invalid memory size"
)]
#[case(
    "servers: {}\ntimings:\n  lifecycle:\n    graceful_stop_timeout: 18446744073709551615\n",
    "lifecycle.graceful_stop_timeout"
)]
fn schema_violations_are_invalid(#[case] yaml: &str, #[case] needle: &str) {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str(yaml).expect("write");

    let err = ConfigStore::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }), "got: {err}");
    assert_eq!(err.kind(), FailureKind::Validation);
    assert!(err.to_string().contains(needle), "got: {err}");
}

#[test]
fn port_above_u16_fails_to_parse() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.yaml");
    file.write_str("servers:\n  lobby:\n    type: spigot-params\n    path: /srv/x\n    port: 70000\n")
        .expect("write");

    let err = ConfigStore::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn json_document_is_accepted() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("config.json");
    file.write_str(
        r#"{
  "servers": { "lobby": { "type": "proxy-params", "path": "/srv/lobby", "port": 25577 } },
  "server_types": {
    "proxy-params": { "memory": "512M", "min_memory": "256M", "jvm_flags": ["-XX:+UseG1GC"] }
  }
}"#,
    )
    .expect("write");

    let store = ConfigStore::load_at(file.path()).expect("load json");
    assert_eq!(store.server_names(), vec!["lobby".to_string()]);
    assert_eq!(store.server("lobby").expect("lobby").port, Some(25577));
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn mid_write_crash_leaves_original_intact() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("config.yaml");
    let mut store = ConfigStore::load_at(&path).expect("load");
    store.add_server("survival", survival()).expect("add");
    store.save().expect("save");
    let original_bytes = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_file_name("config.yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(original_bytes, fs::read(&path).expect("read after crash"));
    let reloaded = ConfigStore::load_at(&path).expect("reload");
    assert!(reloaded.has_server("survival"));
}

#[test]
fn first_load_materialises_default_document() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("nested/config.yaml");

    ConfigStore::load_at(file.path()).expect("load");

    file.assert(predicate::path::exists());
    file.assert(predicate::str::contains("spigot-params"));
    file.assert(predicate::str::contains("proxy-params"));
}

// ---------------------------------------------------------------------------
// 3. Edits
// ---------------------------------------------------------------------------

#[test]
fn remove_server_persists() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.path().join("config.yaml");
    let mut store = ConfigStore::load_at(&path).expect("load");
    store.add_server("survival", survival()).expect("add");
    store.save().expect("save");

    let removed = store.remove_server("survival").expect("remove");
    assert_eq!(removed, survival());
    store.save().expect("save");

    let reloaded = ConfigStore::load_at(&path).expect("reload");
    assert!(!reloaded.has_server("survival"));
    assert!(matches!(
        reloaded.server("survival").unwrap_err(),
        ConfigError::ServerNotFound { .. }
    ));
}

#[test]
fn names_are_sorted() {
    let mut config = Config::with_default_profiles();
    for name in ["zeta", "alpha", "mid"] {
        config.servers.insert(name.to_string(), survival());
    }
    let store = ConfigStore::from_config(PathBuf::from("mem.yaml"), config).expect("store");
    assert_eq!(store.server_names(), vec!["alpha", "mid", "zeta"]);
}

#[test]
fn add_rejects_invalid_name_before_touching_map() {
    let mut store =
        ConfigStore::from_config(PathBuf::from("mem.yaml"), Config::with_default_profiles())
            .expect("store");
    let err = store.add_server("no spaces", survival()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "got: {err}");
    assert!(store.server_names().is_empty());
}
