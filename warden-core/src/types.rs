//! Domain types for the warden configuration.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::timings::Timings;

/// Type tag that marks a proxy profile even when its `proxy` flag is absent.
pub const PROXY_TYPE_TAG: &str = "proxy-params";

const DEFAULT_SERVER_JAR: &str = "server.jar";
const DEFAULT_PROXY_JAR: &str = "velocity.jar";

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One managed server. The name is the key of [`Config::servers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Tag selecting a [`ResourceProfile`] from [`Config::server_types`].
    #[serde(rename = "type")]
    pub server_type: String,
    /// Absolute path to the server root on disk.
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Memory sizing and JVM tuning flags applied at launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProfile {
    /// Maximum heap, e.g. `2G`.
    pub memory: String,
    /// Initial heap, e.g. `1G`.
    pub min_memory: String,
    #[serde(default)]
    pub jvm_flags: Vec<String>,
    /// Jar to launch, relative to the server root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub proxy: bool,
}

impl ResourceProfile {
    /// Whether servers of `tag` using this profile are proxies (no port
    /// rewrite, no process tag, no `nogui`).
    pub fn is_proxy(&self, tag: &str) -> bool {
        self.proxy || tag == PROXY_TYPE_TAG
    }

    pub fn jar_for(&self, tag: &str) -> &str {
        match &self.jar {
            Some(jar) => jar,
            None if self.is_proxy(tag) => DEFAULT_PROXY_JAR,
            None => DEFAULT_SERVER_JAR,
        }
    }
}

/// Root of the warden configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub servers: BTreeMap<String, ServerDefinition>,
    #[serde(default)]
    pub server_types: BTreeMap<String, ResourceProfile>,
    #[serde(default)]
    pub timings: Timings,
}

impl Config {
    /// Configuration written on first run: no servers, two stock profiles.
    pub fn with_default_profiles() -> Self {
        let mut server_types = BTreeMap::new();
        server_types.insert(
            "spigot-params".to_string(),
            ResourceProfile {
                memory: "2G".into(),
                min_memory: "1G".into(),
                jvm_flags: flags(&[
                    "-XX:+UseG1GC",
                    "-XX:+ParallelRefProcEnabled",
                    "-XX:MaxGCPauseMillis=200",
                    "-XX:+UnlockExperimentalVMOptions",
                    "-XX:+DisableExplicitGC",
                    "-XX:+AlwaysPreTouch",
                    "-XX:G1NewSizePercent=30",
                    "-XX:G1MaxNewSizePercent=40",
                    "-XX:G1HeapRegionSize=8M",
                    "-XX:G1ReservePercent=20",
                    "-XX:G1HeapWastePercent=5",
                    "-XX:G1MixedGCCountTarget=4",
                    "-XX:InitiatingHeapOccupancyPercent=15",
                    "-XX:G1MixedGCLiveThresholdPercent=90",
                    "-XX:G1RSetUpdatingPauseTimePercent=5",
                    "-XX:SurvivorRatio=32",
                    "-XX:+PerfDisableSharedMem",
                    "-XX:MaxTenuringThreshold=1",
                ]),
                jar: None,
                proxy: false,
            },
        );
        server_types.insert(
            PROXY_TYPE_TAG.to_string(),
            ResourceProfile {
                memory: "512M".into(),
                min_memory: "256M".into(),
                jvm_flags: flags(&[
                    "-XX:+UseG1GC",
                    "-XX:G1HeapRegionSize=4M",
                    "-XX:+UnlockExperimentalVMOptions",
                    "-XX:+ParallelRefProcEnabled",
                    "-XX:+AlwaysPreTouch",
                    "-XX:MaxInlineLevel=15",
                ]),
                jar: None,
                proxy: true,
            },
        );
        Self {
            servers: BTreeMap::new(),
            server_types,
            timings: Timings::default(),
        }
    }
}

fn flags(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_detection_by_tag_or_flag() {
        let config = Config::with_default_profiles();
        let spigot = &config.server_types["spigot-params"];
        let proxy = &config.server_types[PROXY_TYPE_TAG];
        assert!(!spigot.is_proxy("spigot-params"));
        assert!(proxy.is_proxy(PROXY_TYPE_TAG));
        assert!(proxy.is_proxy("custom-proxy"), "flag alone marks a proxy");
        assert!(spigot.is_proxy(PROXY_TYPE_TAG), "tag alone marks a proxy");
    }

    #[test]
    fn jar_defaults_follow_proxy_kind() {
        let config = Config::with_default_profiles();
        assert_eq!(config.server_types["spigot-params"].jar_for("spigot-params"), "server.jar");
        assert_eq!(config.server_types[PROXY_TYPE_TAG].jar_for(PROXY_TYPE_TAG), "velocity.jar");

        let mut custom = config.server_types["spigot-params"].clone();
        custom.jar = Some("paper-1.21.jar".into());
        assert_eq!(custom.jar_for("spigot-params"), "paper-1.21.jar");
    }

    #[test]
    fn server_definition_uses_type_key() {
        let yaml = "type: spigot-params\npath: /srv/lobby\nport: 25565\n";
        let def: ServerDefinition = serde_yaml::from_str(yaml).expect("deserialize");
        assert_eq!(def.server_type, "spigot-params");
        assert_eq!(def.port, Some(25565));

        let out = serde_yaml::to_string(&def).expect("serialize");
        assert!(out.contains("type: spigot-params"));
    }
}
