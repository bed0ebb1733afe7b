//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading (project, local overrides, explicit `--config` file)
//! - Environment variable overrides
//! - Configuration validation

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
