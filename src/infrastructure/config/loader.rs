use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project configuration file, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "zviewer.yaml";
/// Optional developer overrides, never committed.
pub const LOCAL_CONFIG_FILE: &str = "zviewer.local.yaml";
/// Prefix of environment overrides; `__` separates nesting levels.
pub const ENV_PREFIX: &str = "ZVIEWER_";

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid port for {0}: must not be 0")]
    InvalidPort(&'static str),

    #[error("Port {port} is assigned to both {first} and {second}")]
    DuplicatePort {
        port: u16,
        first: &'static str,
        second: &'static str,
    },

    #[error("JWT secret cannot be empty")]
    EmptySecret,

    #[error("Invalid shutdown grace period: must be at least 1 second")]
    InvalidShutdownGrace,

    #[error("Invalid {0}: must be at least 1")]
    InvalidAttempts(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid media storage type: {0}. Must be one of: local, s3")]
    InvalidStorageType(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. zviewer.yaml (project config)
    /// 3. zviewer.local.yaml (developer overrides, optional)
    /// 4. `explicit`, the file passed with `--config`
    /// 5. Environment variables (ZVIEWER_* prefix, highest priority)
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        Self::load_in(Path::new("."), explicit)
    }

    /// Same as [`ConfigLoader::load`], resolving the project files under `dir`.
    pub fn load_in(dir: &Path, explicit: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join(PROJECT_CONFIG_FILE)))
            .merge(Yaml::file(dir.join(LOCAL_CONFIG_FILE)));

        if let Some(path) = explicit {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without project files or environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let ports = [
            ("storage", config.storage.port),
            ("primary-api", config.api.port),
            ("media-service", config.media.port),
            ("comments-service", config.comments.port),
            ("payments-service", config.payments.port),
            ("admin-service", config.admin.port),
        ];
        let mut seen: HashMap<u16, &'static str> = HashMap::new();
        for (name, port) in ports {
            if port == 0 {
                return Err(ConfigError::InvalidPort(name));
            }
            if let Some(first) = seen.insert(port, name) {
                return Err(ConfigError::DuplicatePort {
                    port,
                    first,
                    second: name,
                });
            }
        }

        if config.api.jwt_secret.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        if config.supervisor.shutdown_grace_secs == 0 {
            return Err(ConfigError::InvalidShutdownGrace);
        }

        if config.supervisor.sweep_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "sweep_interval_ms must be positive".to_string(),
            ));
        }

        if config.supervisor.readiness_check_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "readiness_check_interval_ms must be positive".to_string(),
            ));
        }

        let attempts = [
            ("storage.ready_attempts", config.storage.ready_attempts),
            ("container_engine.probe_attempts", config.container_engine.probe_attempts),
            ("container_engine.autostart_attempts", config.container_engine.autostart_attempts),
        ];
        for (name, value) in attempts {
            if value == 0 {
                return Err(ConfigError::InvalidAttempts(name));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let valid_storage_types = ["local", "s3"];
        if !valid_storage_types.contains(&config.media.storage_type.as_str()) {
            return Err(ConfigError::InvalidStorageType(
                config.media.storage_type.clone(),
            ));
        }

        if config.client.device.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "client device cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.media.port = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPort("media-service"))
        );
    }

    #[test]
    fn test_validate_duplicate_port() {
        let mut config = Config::default();
        config.admin.port = config.api.port;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::DuplicatePort {
                port: 8080,
                first: "primary-api",
                second: "admin-service",
            })
        );
    }

    #[test]
    fn test_validate_empty_secret() {
        let mut config = Config::default();
        config.api.jwt_secret = "  ".to_string();
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::EmptySecret));
    }

    #[test]
    fn test_validate_zero_readiness_interval() {
        let mut config = Config::default();
        config.supervisor.readiness_check_interval_ms = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(
                "readiness_check_interval_ms must be positive".to_string()
            ))
        );
    }

    #[test]
    fn test_validate_zero_grace() {
        let mut config = Config::default();
        config.supervisor.shutdown_grace_secs = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidShutdownGrace)
        );
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = Config::default();
        config.storage.ready_attempts = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidAttempts("storage.ready_attempts"))
        );
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_invalid_storage_type() {
        let mut config = Config::default();
        config.media.storage_type = "ftp".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidStorageType(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        fs::write(
            &path,
            "api:\n  port: 9090\nclient:\n  device: chrome\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.client.device, "chrome");
        assert_eq!(config.media.port, 8081);
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "logging:\n  format: xml\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_layer_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "api:\n  port: 9000\n  environment: staging\nstorage:\n  user: project\n",
        )
        .unwrap();
        fs::write(dir.path().join(LOCAL_CONFIG_FILE), "api:\n  port: 9001\n").unwrap();
        let explicit = dir.path().join("explicit.yaml");
        fs::write(&explicit, "storage:\n  user: explicit\n").unwrap();

        temp_env::with_vars(
            [
                ("ZVIEWER_API__ENVIRONMENT", Some("from-env")),
                ("ZVIEWER_SUPERVISOR__SHUTDOWN_GRACE_SECS", Some("9")),
            ],
            || {
                let config = ConfigLoader::load_in(dir.path(), Some(&explicit)).unwrap();
                assert_eq!(config.api.port, 9001);
                assert_eq!(config.api.environment, "from-env");
                assert_eq!(config.storage.user, "explicit");
                assert_eq!(config.supervisor.shutdown_grace_secs, 9);
            },
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = ConfigLoader::load_in(dir.path(), Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_missing_project_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        temp_env::with_vars_unset(["ZVIEWER_API__PORT"], || {
            let config = ConfigLoader::load_in(dir.path(), None).unwrap();
            assert_eq!(config.api.port, 8080);
        });
    }
}
