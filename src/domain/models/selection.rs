//! Which parts of the stack a run brings up.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Storage, primary API, selected services and the client
    #[default]
    Full,
    ClientOnly,
    ServerOnly,
}

/// Optional backend microservices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Microservice {
    Media,
    Comments,
    Payments,
    Admin,
}

impl Microservice {
    pub const ALL: [Self; 4] = [Self::Media, Self::Comments, Self::Payments, Self::Admin];

    /// Directory name under `server/services`.
    pub const fn dir_name(&self) -> &'static str {
        match self {
            Self::Media => "media",
            Self::Comments => "comments",
            Self::Payments => "payments",
            Self::Admin => "admin",
        }
    }

    /// Identity used in the process registry.
    pub const fn service_name(&self) -> &'static str {
        match self {
            Self::Media => "media-service",
            Self::Comments => "comments-service",
            Self::Payments => "payments-service",
            Self::Admin => "admin-service",
        }
    }

    /// Phrase the service logs once its HTTP listener is up.
    pub const fn ready_phrase(&self) -> &'static str {
        match self {
            Self::Media => "Media service started",
            Self::Comments => "Comments service started",
            Self::Payments => "Payments service started",
            Self::Admin => "Admin service starting",
        }
    }
}

impl fmt::Display for Microservice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

/// Validated selection of what to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSelection {
    pub mode: RunMode,
    pub with_storage: bool,
    pub services: Vec<Microservice>,
}

impl Default for RunSelection {
    fn default() -> Self {
        Self {
            mode: RunMode::Full,
            with_storage: true,
            services: Vec::new(),
        }
    }
}

impl RunSelection {
    pub const fn runs_server(&self) -> bool {
        !matches!(self.mode, RunMode::ClientOnly)
    }

    pub const fn runs_client(&self) -> bool {
        !matches!(self.mode, RunMode::ServerOnly)
    }

    pub const fn runs_storage(&self) -> bool {
        self.with_storage && self.runs_server()
    }

    pub fn runs_service(&self, service: Microservice) -> bool {
        self.runs_server() && self.services.contains(&service)
    }
}
