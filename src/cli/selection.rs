//! Turning flags into a validated [`RunSelection`].

use thiserror::Error;

use crate::domain::models::{Microservice, RunMode, RunSelection};

use super::Cli;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("--client-only and --server-only cannot be used together")]
    ConflictingModes,

    #[error("only one of --media, --comments, --payments, --admin may be given (got {})", .0.join(", "))]
    MultipleServices(Vec<String>),

    #[error("--{0} cannot be combined with --all")]
    ServiceWithAll(String),

    #[error("--client-only starts no backend services, so --{0} cannot be used with it")]
    ServiceWithClientOnly(String),
}

impl Cli {
    fn single_service_flags(&self) -> Vec<(Microservice, &'static str)> {
        [
            (self.media, Microservice::Media, "media"),
            (self.comments, Microservice::Comments, "comments"),
            (self.payments, Microservice::Payments, "payments"),
            (self.admin, Microservice::Admin, "admin"),
        ]
        .into_iter()
        .filter(|(set, _, _)| *set)
        .map(|(_, service, flag)| (service, flag))
        .collect()
    }

    /// Validate flag combinations before anything is launched.
    pub fn selection(&self) -> Result<RunSelection, CliError> {
        let mode = match (self.client_only, self.server_only) {
            (true, true) => return Err(CliError::ConflictingModes),
            (true, false) => RunMode::ClientOnly,
            (false, true) => RunMode::ServerOnly,
            (false, false) => RunMode::Full,
        };

        let singles = self.single_service_flags();
        if singles.len() > 1 {
            return Err(CliError::MultipleServices(
                singles.iter().map(|(_, flag)| format!("--{flag}")).collect(),
            ));
        }

        if mode == RunMode::ClientOnly {
            if let Some((_, flag)) = singles.first() {
                return Err(CliError::ServiceWithClientOnly((*flag).to_string()));
            }
            if self.all {
                return Err(CliError::ServiceWithClientOnly("all".to_string()));
            }
        }

        let services = match (self.all, singles.first()) {
            (true, Some((_, flag))) => return Err(CliError::ServiceWithAll((*flag).to_string())),
            (true, None) => Microservice::ALL.to_vec(),
            (false, Some((service, _))) => vec![*service],
            (false, None) => Vec::new(),
        };

        Ok(RunSelection {
            mode,
            with_storage: !self.no_db,
            services,
        })
    }
}
