//! Static definitions of launchable units.

use std::time::Duration;

use super::process::LaunchSpec;

/// How the supervisor decides a service is ready. Exactly one mechanism per service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Run `check` until it exits successfully.
    Probe {
        check: LaunchSpec,
        /// Budget for one invocation of `check`.
        check_timeout: Duration,
        max_attempts: u32,
        interval: Duration,
    },
    /// Wait for the first ready phrase in the service's output.
    LogSignal { timeout: Duration },
    /// Documented fixed delay; the process only has to still be alive afterwards.
    GracePeriod(Duration),
}

/// A command run to completion before the service itself is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupStep {
    pub launch: LaunchSpec,
    pub timeout: Duration,
}

/// Output phrases that matter for a service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogProfile {
    /// Substrings announcing the service is ready.
    pub ready_phrases: Vec<String>,
    /// Informational substrings worth surfacing (e.g. hot reload notices).
    pub highlight_phrases: Vec<String>,
}

/// Static definition of one launchable service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub port: Option<u16>,
    pub launch: LaunchSpec,
    pub setup: Vec<SetupStep>,
    pub readiness: Readiness,
    pub log: LogProfile,
    pub depends_on: Vec<String>,
}

impl ServiceDescriptor {
    /// Descriptor with no dependencies that becomes ready on any default ready phrase.
    pub fn new(name: impl Into<String>, launch: LaunchSpec, readiness: Readiness) -> Self {
        Self {
            name: name.into(),
            port: None,
            launch,
            setup: Vec::new(),
            readiness,
            log: LogProfile::default(),
            depends_on: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn ready_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log
            .ready_phrases
            .extend(phrases.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn highlight_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log
            .highlight_phrases
            .extend(phrases.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn setup_step(mut self, launch: LaunchSpec, timeout: Duration) -> Self {
        self.setup.push(SetupStep { launch, timeout });
        self
    }
}
