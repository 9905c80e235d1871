//! Warden core library: domain types, validation, paths, config store, errors.
//!
//! Public API surface:
//! - [`types`]: server definitions, resource profiles, config root
//! - [`validate`]: server name / port / memory syntax checks
//! - [`timings`]: named settle delays and polling ceilings
//! - [`paths`]: base, config and backup directory resolution
//! - [`config`]: [`ConfigStore`] load / query / edit / save
//! - [`error`]: [`ConfigError`], [`FailureKind`]

pub mod config;
pub mod error;
pub mod paths;
pub mod timings;
pub mod types;
pub mod validate;

pub use config::ConfigStore;
pub use error::{ConfigError, FailureKind};
pub use timings::{BackupTimings, LifecycleTimings, Timings};
pub use types::{Config, ResourceProfile, ServerDefinition, PROXY_TYPE_TAG};
pub use validate::ValidationError;
