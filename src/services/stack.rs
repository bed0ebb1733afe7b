//! The ZViewer stack as an orchestration plan.
//!
//! Turns configuration plus a validated run selection into concrete
//! descriptors: which groups exist, what each process runs, the environment
//! it receives, and how its readiness is decided.

use std::path::Path;
use std::time::Duration;

use crate::domain::errors::SupervisorError;
use crate::domain::models::{
    AutoStart, Config, LaunchSpec, Microservice, OrchestrationPlan, Readiness, ReadinessGate,
    Requirement, RunSelection, ServiceDescriptor,
};

pub const STORAGE: &str = "storage";
pub const PRIMARY_API: &str = "primary-api";
pub const CLIENT: &str = "client";
pub const CONTAINER_ENGINE: &str = "container-engine";

const GROUP_SERVICES: &str = "services";
const GO_ENTRYPOINT: &str = "cmd/api/main.go";
const API_READY_PHRASE: &str = "Server starting";
const CLIENT_READY_PHRASE: &str = "Flutter run key commands";
const CLIENT_HIGHLIGHTS: [&str; 2] = ["Hot reload", "Hot restart"];

/// Executable name for the host platform (`flutter.bat`, `go.exe`, `docker.exe` on Windows).
pub fn platform_command(tool: &str) -> String {
    if cfg!(windows) {
        match tool {
            "flutter" => "flutter.bat".to_string(),
            other => format!("{other}.exe"),
        }
    } else {
        tool.to_string()
    }
}

/// Builds the [`OrchestrationPlan`] for one run.
pub struct StackBuilder<'a> {
    config: &'a Config,
    selection: &'a RunSelection,
}

impl<'a> StackBuilder<'a> {
    /// Builder over a loaded configuration and a validated selection.
    pub const fn new(config: &'a Config, selection: &'a RunSelection) -> Self {
        Self { config, selection }
    }

    /// Build and validate the plan for this selection.
    pub fn build(&self) -> Result<OrchestrationPlan, SupervisorError> {
        let mut plan = OrchestrationPlan::new();

        if self.selection.runs_storage() {
            plan = plan
                .requirement(Requirement::new(platform_command("docker"), "Docker"))
                .gate(self.container_engine_gate())
                .group(STORAGE, vec![self.storage()]);
        }

        if self.selection.runs_server() {
            plan = plan
                .requirement(
                    Requirement::new(platform_command("go"), "Go").with_probe_args(["version"]),
                )
                .group(PRIMARY_API, vec![self.primary_api()]);

            let services = Microservice::ALL
                .into_iter()
                .filter(|s| self.selection.runs_service(*s))
                .map(|s| self.microservice(s))
                .collect();
            plan = plan.group(GROUP_SERVICES, services);
        }

        if self.selection.runs_client() {
            plan = plan
                .requirement(Requirement::new(platform_command("flutter"), "Flutter SDK"))
                .group(CLIENT, vec![self.client()]);
        }

        plan.validate()?;
        Ok(plan)
    }

    fn docker(&self, args: &[&str]) -> LaunchSpec {
        LaunchSpec::new(platform_command("docker"))
            .args(args.iter().copied())
            .current_dir(self.config.project.server_path())
    }

    fn container_engine_gate(&self) -> ReadinessGate {
        let engine = &self.config.container_engine;
        let autostart = engine
            .autostart_command
            .split_first()
            .map(|(program, args)| AutoStart {
                launch: LaunchSpec::new(program.as_str()).args(args.iter().cloned()),
                max_attempts: engine.autostart_attempts,
            });
        ReadinessGate {
            name: CONTAINER_ENGINE.to_string(),
            check: LaunchSpec::new(platform_command("docker")).arg("info"),
            check_timeout: Duration::from_secs(engine.probe_timeout_secs),
            max_attempts: engine.probe_attempts,
            interval: Duration::from_secs(engine.probe_interval_secs),
            autostart,
        }
    }

    fn storage(&self) -> ServiceDescriptor {
        let storage = &self.config.storage;
        let service = storage.compose_service.as_str();
        let check = self.docker(&[
            "compose",
            "exec",
            "-T",
            service,
            "pg_isready",
            "-U",
            storage.user.as_str(),
            "-d",
            storage.name.as_str(),
        ]);

        ServiceDescriptor::new(
            STORAGE,
            self.docker(&["compose", "up", service]),
            Readiness::Probe {
                check,
                check_timeout: Duration::from_secs(storage.check_timeout_secs),
                max_attempts: storage.ready_attempts,
                interval: Duration::from_secs(storage.ready_interval_secs),
            },
        )
        .with_port(storage.port)
    }

    fn go_service(&self, dir: &Path) -> LaunchSpec {
        LaunchSpec::new(platform_command("go"))
            .args(["run", GO_ENTRYPOINT])
            .current_dir(dir)
    }

    fn service_url(&self, port: u16) -> String {
        format!("http://{}:{port}", self.config.api.host)
    }

    fn primary_api(&self) -> ServiceDescriptor {
        let api = &self.config.api;
        let storage = &self.config.storage;
        let db_host = if self.selection.with_storage {
            storage.host.clone()
        } else {
            String::new()
        };

        let launch = self.go_service(&self.config.project.server_path()).envs([
            ("ENVIRONMENT", api.environment.clone()),
            ("SERVER_PORT", api.port.to_string()),
            ("SERVER_HOST", api.host.clone()),
            ("DB_HOST", db_host),
            ("DB_PORT", storage.port.to_string()),
            ("DB_USER", storage.user.clone()),
            ("DB_PASSWORD", storage.password.clone()),
            ("DB_NAME", storage.name.clone()),
            ("DB_SSLMODE", storage.ssl_mode.clone()),
            ("JWT_SECRET", api.jwt_secret.clone()),
            ("JWT_EXPIRATION", api.jwt_expiration.clone()),
            ("JWT_REFRESH_EXPIRY", api.jwt_refresh_expiry.clone()),
            ("MEDIA_SERVICE_URL", self.service_url(self.config.media.port)),
        ]);

        let descriptor = ServiceDescriptor::new(
            PRIMARY_API,
            launch,
            Readiness::LogSignal {
                timeout: Duration::from_secs(api.ready_timeout_secs),
            },
        )
        .with_port(api.port)
        .ready_phrases([API_READY_PHRASE]);

        if self.selection.runs_storage() {
            descriptor.depends_on([STORAGE])
        } else {
            descriptor
        }
    }

    fn microservice(&self, service: Microservice) -> ServiceDescriptor {
        let dir = self
            .config
            .project
            .server_path()
            .join("services")
            .join(service.dir_name());
        let (port, env) = self.microservice_env(service);

        ServiceDescriptor::new(
            service.service_name(),
            self.go_service(&dir).envs(env),
            Readiness::LogSignal {
                timeout: self.config.supervisor.service_ready_timeout(),
            },
        )
        .with_port(port)
        .ready_phrases([service.ready_phrase()])
        .depends_on([PRIMARY_API])
    }

    fn microservice_env(&self, service: Microservice) -> (u16, Vec<(&'static str, String)>) {
        let c = self.config;
        let database_url = c.storage.database_url();
        let secret = c.api.jwt_secret.clone();

        match service {
            Microservice::Media => {
                let m = &c.media;
                (
                    m.port,
                    vec![
                        ("PORT", m.port.to_string()),
                        ("DATABASE_URL", database_url),
                        ("JWT_SECRET", secret),
                        ("STORAGE_TYPE", m.storage_type.clone()),
                        ("LOCAL_STORAGE_PATH", m.local_storage_path.clone()),
                        ("S3_BUCKET", m.s3_bucket.clone()),
                        ("S3_REGION", m.s3_region.clone()),
                        ("MAX_IMAGE_SIZE", m.max_image_size.to_string()),
                        ("MAX_VIDEO_SIZE", m.max_video_size.to_string()),
                        ("IMAGE_THUMBNAIL_SIZE", m.image_thumbnail_size.to_string()),
                        ("VIDEO_THUMBNAIL_SIZE", m.video_thumbnail_size.to_string()),
                        ("VIDEO_THUMBNAIL_TIME", m.video_thumbnail_time.to_string()),
                        ("MAX_CONCURRENT_UPLOADS", m.max_concurrent_uploads.to_string()),
                        ("UPLOAD_TIMEOUT", m.upload_timeout_minutes.to_string()),
                    ],
                )
            }
            Microservice::Comments => {
                let m = &c.comments;
                (
                    m.port,
                    vec![
                        ("PORT", m.port.to_string()),
                        ("DATABASE_URL", database_url),
                        ("JWT_SECRET", secret),
                        ("MAX_COMMENT_LENGTH", m.max_comment_length.to_string()),
                        ("MAX_REPLIES_PER_COMMENT", m.max_replies_per_comment.to_string()),
                        ("COMMENT_RATE_LIMIT", m.comment_rate_limit.to_string()),
                        ("RATE_LIMIT_WINDOW_MINUTES", m.rate_limit_window_minutes.to_string()),
                        ("ENABLE_PROFANITY_FILTER", m.enable_profanity_filter.to_string()),
                        ("ENABLE_MODERATION", m.enable_moderation.to_string()),
                    ],
                )
            }
            Microservice::Payments => {
                let m = &c.payments;
                (
                    m.port,
                    vec![
                        ("PORT", m.port.to_string()),
                        ("DATABASE_URL", database_url),
                        ("JWT_SECRET", secret),
                        ("STRIPE_SECRET_KEY", m.stripe_secret_key.clone()),
                        ("STRIPE_WEBHOOK_SECRET", m.stripe_webhook_secret.clone()),
                        ("STRIPE_PUBLISHABLE_KEY", m.stripe_publishable_key.clone()),
                        ("MAX_PAYMENT_AMOUNT", m.max_payment_amount.to_string()),
                        ("MIN_PAYMENT_AMOUNT", m.min_payment_amount.to_string()),
                        ("PAYMENT_RATE_LIMIT", m.payment_rate_limit.to_string()),
                        ("RATE_LIMIT_WINDOW_MINUTES", m.rate_limit_window_minutes.to_string()),
                        ("ENABLE_AUDIT_LOGGING", m.enable_audit_logging.to_string()),
                    ],
                )
            }
            Microservice::Admin => {
                let m = &c.admin;
                let s = &c.storage;
                (
                    m.port,
                    vec![
                        ("ADMIN_PORT", m.port.to_string()),
                        ("ADMIN_HOST", m.host.clone()),
                        ("DB_HOST", s.host.clone()),
                        ("DB_PORT", s.port.to_string()),
                        ("DB_USER", s.user.clone()),
                        ("DB_PASSWORD", s.password.clone()),
                        ("DB_NAME", s.name.clone()),
                        ("DB_SSLMODE", s.ssl_mode.clone()),
                        ("JWT_SECRET", secret),
                        ("JWT_ISSUER", m.jwt_issuer.clone()),
                        ("USER_SERVICE_URL", c.api.url()),
                        ("MEDIA_SERVICE_URL", self.service_url(c.media.port)),
                        ("COMMENTS_SERVICE_URL", self.service_url(c.comments.port)),
                        ("PAYMENT_SERVICE_URL", self.service_url(c.payments.port)),
                        ("LOG_LEVEL", m.log_level.clone()),
                        ("LOG_FORMAT", m.log_format.clone()),
                    ],
                )
            }
        }
    }

    fn client(&self) -> ServiceDescriptor {
        let client = &self.config.client;
        let dir = self.config.project.client_path();
        let flutter = platform_command("flutter");

        let descriptor = ServiceDescriptor::new(
            CLIENT,
            LaunchSpec::new(&flutter)
                .args(["run", "-d", client.device.as_str()])
                .current_dir(&dir),
            Readiness::LogSignal {
                timeout: Duration::from_secs(client.ready_timeout_secs),
            },
        )
        .setup_step(
            LaunchSpec::new(&flutter).args(["pub", "get"]).current_dir(&dir),
            Duration::from_secs(client.pub_get_timeout_secs),
        )
        .ready_phrases([CLIENT_READY_PHRASE])
        .highlight_phrases(CLIENT_HIGHLIGHTS);

        if self.selection.runs_server() {
            descriptor.depends_on([PRIMARY_API])
        } else {
            descriptor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RunMode;

    fn names(plan: &OrchestrationPlan) -> Vec<Vec<String>> {
        plan.groups()
            .iter()
            .map(|g| g.members.iter().map(|d| d.name.clone()).collect())
            .collect()
    }

    fn labels(plan: &OrchestrationPlan) -> Vec<&str> {
        plan.requirements().iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn test_full_stack_order() {
        let config = Config::default();
        let selection = RunSelection::default();
        let plan = StackBuilder::new(&config, &selection).build().unwrap();

        assert_eq!(
            names(&plan),
            vec![vec!["storage"], vec!["primary-api"], vec!["client"]]
        );
        assert_eq!(labels(&plan), vec!["Docker", "Go", "Flutter SDK"]);
        assert_eq!(plan.gates().len(), 1);
        assert_eq!(plan.gates()[0].name, CONTAINER_ENGINE);
        assert!(plan.gates()[0].autostart.is_none());
    }

    #[test]
    fn test_all_services_form_one_group() {
        let config = Config::default();
        let selection = RunSelection {
            services: Microservice::ALL.to_vec(),
            ..RunSelection::default()
        };
        let plan = StackBuilder::new(&config, &selection).build().unwrap();

        assert_eq!(
            names(&plan)[2],
            vec!["media-service", "comments-service", "payments-service", "admin-service"]
        );
        for descriptor in &plan.groups()[2].members {
            assert_eq!(descriptor.depends_on, vec![PRIMARY_API.to_string()]);
        }
    }

    #[test]
    fn test_no_db_blanks_database_host() {
        let config = Config::default();
        let selection = RunSelection {
            mode: RunMode::ServerOnly,
            with_storage: false,
            services: Vec::new(),
        };
        let plan = StackBuilder::new(&config, &selection).build().unwrap();

        assert_eq!(names(&plan), vec![vec!["primary-api"]]);
        assert_eq!(labels(&plan), vec!["Go"]);
        assert!(plan.gates().is_empty());

        let api = &plan.groups()[0].members[0];
        assert_eq!(api.launch.env.get("DB_HOST").map(String::as_str), Some(""));
        assert!(api.depends_on.is_empty());
        assert_eq!(api.log.ready_phrases, vec![API_READY_PHRASE.to_string()]);
    }

    #[test]
    fn test_client_only_has_no_dependencies() {
        let config = Config::default();
        let selection = RunSelection {
            mode: RunMode::ClientOnly,
            ..RunSelection::default()
        };
        let plan = StackBuilder::new(&config, &selection).build().unwrap();

        assert_eq!(names(&plan), vec![vec!["client"]]);
        let client = &plan.groups()[0].members[0];
        assert!(client.depends_on.is_empty());
        assert_eq!(client.setup.len(), 1);
        assert_eq!(client.setup[0].launch.args, vec!["pub", "get"]);
        assert_eq!(client.setup[0].timeout, Duration::from_secs(120));
        assert!(client.log.highlight_phrases.contains(&"Hot reload".to_string()));
    }

    #[test]
    fn test_storage_probe_uses_pg_isready() {
        let config = Config::default();
        let selection = RunSelection::default();
        let plan = StackBuilder::new(&config, &selection).build().unwrap();

        let storage = &plan.groups()[0].members[0];
        match &storage.readiness {
            Readiness::Probe {
                check,
                max_attempts,
                interval,
                ..
            } => {
                assert!(check.command_line().ends_with(
                    "compose exec -T postgres pg_isready -U zviewer -d zviewer"
                ));
                assert_eq!(*max_attempts, 30);
                assert_eq!(*interval, Duration::from_secs(1));
            }
            other => panic!("unexpected readiness {other:?}"),
        }
        assert_eq!(storage.port, Some(5432));
    }

    #[test]
    fn test_media_env() {
        let config = Config::default();
        let selection = RunSelection {
            mode: RunMode::ServerOnly,
            with_storage: true,
            services: vec![Microservice::Media],
        };
        let plan = StackBuilder::new(&config, &selection).build().unwrap();

        let media = &plan.groups()[2].members[0];
        let env = &media.launch.env;
        assert_eq!(env.get("PORT").map(String::as_str), Some("8081"));
        assert_eq!(env.get("STORAGE_TYPE").map(String::as_str), Some("local"));
        assert_eq!(env.get("UPLOAD_TIMEOUT").map(String::as_str), Some("30"));
        assert!(env["DATABASE_URL"].starts_with("postgres://"));
        assert!(media
            .launch
            .working_dir
            .as_ref()
            .unwrap()
            .ends_with("server/services/media"));
    }

    #[test]
    fn test_autostart_from_config() {
        let mut config = Config::default();
        config.container_engine.autostart_command = vec!["open".into(), "-a".into(), "Docker".into()];
        let selection = RunSelection::default();
        let plan = StackBuilder::new(&config, &selection).build().unwrap();

        let autostart = plan.gates()[0].autostart.as_ref().unwrap();
        assert_eq!(autostart.launch.command_line(), "open -a Docker");
        assert_eq!(autostart.max_attempts, 60);
    }
}
