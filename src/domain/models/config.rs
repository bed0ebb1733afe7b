use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure for the launcher
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Repository layout
    #[serde(default)]
    pub project: ProjectConfig,

    /// Supervisor timings
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Container engine availability gate
    #[serde(default)]
    pub container_engine: ContainerEngineConfig,

    /// Storage backend (PostgreSQL through docker compose)
    #[serde(default)]
    pub storage: StorageConfig,

    /// Primary API process
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub comments: CommentsConfig,

    #[serde(default)]
    pub payments: PaymentsConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    /// End-user client
    #[serde(default)]
    pub client: ClientConfig,
}

/// Directory layout of the repository being launched
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ProjectConfig {
    pub root_dir: PathBuf,
    /// Relative to `root_dir`
    pub server_dir: PathBuf,
    /// Relative to `root_dir`
    pub client_dir: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            server_dir: PathBuf::from("server"),
            client_dir: PathBuf::from("application"),
        }
    }
}

impl ProjectConfig {
    pub fn server_path(&self) -> PathBuf {
        self.root_dir.join(&self.server_dir)
    }

    pub fn client_path(&self) -> PathBuf {
        self.root_dir.join(&self.client_dir)
    }
}

/// Supervisor timings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SupervisorConfig {
    /// Time a process gets to exit after a graceful terminate
    pub shutdown_grace_secs: u64,
    /// Delay between liveness sweeps while the stack is running
    pub sweep_interval_ms: u64,
    /// Delay between checks while waiting for a ready phrase
    pub readiness_check_interval_ms: u64,
    /// Budget for each requirement probe
    pub requirement_timeout_secs: u64,
    /// Ready-phrase budget for the optional microservices
    pub service_ready_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: 5,
            sweep_interval_ms: 1000,
            readiness_check_interval_ms: 200,
            requirement_timeout_secs: 10,
            service_ready_timeout_secs: 120,
        }
    }
}

impl SupervisorConfig {
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub const fn readiness_check_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_check_interval_ms)
    }

    pub const fn requirement_timeout(&self) -> Duration {
        Duration::from_secs(self.requirement_timeout_secs)
    }

    pub const fn service_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.service_ready_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log format: json or pretty
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    pub directory: Option<PathBuf>,

    /// File rotation: daily, hourly or never
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
            rotation: "daily".to_string(),
        }
    }
}

/// Container engine gate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ContainerEngineConfig {
    pub probe_attempts: u32,
    pub probe_interval_secs: u64,
    pub probe_timeout_secs: u64,
    /// Command that starts the engine when it is not running (empty: never auto-start)
    pub autostart_command: Vec<String>,
    /// Attempts allowed for the engine to come up after auto-start
    pub autostart_attempts: u32,
}

impl Default for ContainerEngineConfig {
    fn default() -> Self {
        Self {
            probe_attempts: 5,
            probe_interval_secs: 1,
            probe_timeout_secs: 10,
            autostart_command: Vec::new(),
            autostart_attempts: 60,
        }
    }
}

/// Storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct StorageConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    /// Compose service that runs the database
    pub compose_service: String,
    pub ready_attempts: u32,
    pub ready_interval_secs: u64,
    pub check_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "zviewer".to_string(),
            password: "password".to_string(),
            name: "zviewer".to_string(),
            ssl_mode: "disable".to_string(),
            compose_service: "postgres".to_string(),
            ready_attempts: 30,
            ready_interval_secs: 1,
            check_timeout_secs: 5,
        }
    }
}

impl StorageConfig {
    /// Connection string handed to services that take a single URL.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.name, self.ssl_mode
        )
    }
}

/// Primary API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    /// Shared secret for inter-service trust
    pub jwt_secret: String,
    pub jwt_expiration: String,
    pub jwt_refresh_expiry: String,
    pub ready_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            environment: "development".to_string(),
            jwt_secret: "your-secret-key-change-in-production".to_string(),
            jwt_expiration: "24h".to_string(),
            jwt_refresh_expiry: "168h".to_string(),
            ready_timeout_secs: 120,
        }
    }
}

impl ApiConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Media service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct MediaConfig {
    pub port: u16,
    /// "local" or "s3"
    pub storage_type: String,
    pub local_storage_path: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub max_image_size: u64,
    pub max_video_size: u64,
    pub image_thumbnail_size: u32,
    pub video_thumbnail_size: u32,
    /// Seconds into the video
    pub video_thumbnail_time: u32,
    pub max_concurrent_uploads: u32,
    pub upload_timeout_minutes: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            storage_type: "local".to_string(),
            local_storage_path: "./uploads/media".to_string(),
            s3_bucket: String::new(),
            s3_region: "us-east-1".to_string(),
            max_image_size: 100 * 1024 * 1024,
            max_video_size: 500 * 1024 * 1024,
            image_thumbnail_size: 300,
            video_thumbnail_size: 320,
            video_thumbnail_time: 10,
            max_concurrent_uploads: 10,
            upload_timeout_minutes: 30,
        }
    }
}

/// Comments service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CommentsConfig {
    pub port: u16,
    pub max_comment_length: u32,
    pub max_replies_per_comment: u32,
    pub comment_rate_limit: u32,
    pub rate_limit_window_minutes: u32,
    pub enable_profanity_filter: bool,
    pub enable_moderation: bool,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            port: 8082,
            max_comment_length: 1000,
            max_replies_per_comment: 50,
            comment_rate_limit: 10,
            rate_limit_window_minutes: 1,
            enable_profanity_filter: true,
            enable_moderation: true,
        }
    }
}

/// Payments service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct PaymentsConfig {
    pub port: u16,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_publishable_key: String,
    /// Cents
    pub max_payment_amount: u64,
    /// Cents
    pub min_payment_amount: u64,
    pub payment_rate_limit: u32,
    pub rate_limit_window_minutes: u32,
    pub enable_audit_logging: bool,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            port: 8083,
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_publishable_key: String::new(),
            max_payment_amount: 100_000,
            min_payment_amount: 50,
            payment_rate_limit: 5,
            rate_limit_window_minutes: 1,
            enable_audit_logging: true,
        }
    }
}

/// Admin service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct AdminConfig {
    pub port: u16,
    pub host: String,
    pub jwt_issuer: String,
    pub log_level: String,
    pub log_format: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            port: 8084,
            host: "0.0.0.0".to_string(),
            jwt_issuer: "zviewer-admin".to_string(),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
        }
    }
}

/// End-user client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ClientConfig {
    /// Target passed to `flutter run -d`
    pub device: String,
    pub pub_get_timeout_secs: u64,
    pub ready_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            device: default_device().to_string(),
            pub_get_timeout_secs: 120,
            ready_timeout_secs: 300,
        }
    }
}

const fn default_device() -> &'static str {
    if cfg!(windows) {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}
