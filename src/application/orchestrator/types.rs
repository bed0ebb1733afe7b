//! Public configuration, phase, and report types for the orchestrator.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::domain::models::SupervisorConfig;

/// Timings the orchestrator runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// How long a process gets to exit after a graceful terminate.
    pub shutdown_grace: Duration,
    /// How long to wait for exit after a forced kill.
    pub kill_wait: Duration,
    /// Pause between liveness sweeps while supervising.
    pub sweep_interval: Duration,
    /// Pause between checks while waiting for a log ready signal.
    pub readiness_check_interval: Duration,
    /// Budget for each requirement probe.
    pub requirement_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&SupervisorConfig::default())
    }
}

impl From<&SupervisorConfig> for OrchestratorConfig {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            shutdown_grace: config.shutdown_grace(),
            kill_wait: Duration::from_secs(2),
            sweep_interval: config.sweep_interval(),
            readiness_check_interval: config.readiness_check_interval(),
            requirement_timeout: config.requirement_timeout(),
        }
    }
}

/// Where the whole run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    CheckingRequirements,
    StartingDependencies,
    Running,
    ShuttingDown,
    Terminated,
}

impl RunPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingRequirements => "checking_requirements",
            Self::StartingDependencies => "starting_dependencies",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Terminated => "terminated",
        }
    }

    /// Shutdown has begun or finished.
    pub const fn is_stopping(&self) -> bool {
        matches!(self, Self::ShuttingDown | Self::Terminated)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why supervision ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The stop token was cancelled.
    StopRequested,
    /// Every supervised process exited with code 0.
    AllExited,
    /// Nothing is alive and at least one process ended unsuccessfully.
    Crashed,
}

/// What shutdown did to each process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Exited within the grace period after terminate.
    pub graceful: Vec<String>,
    /// Needed a forced kill.
    pub killed: Vec<String>,
    /// Had already exited before shutdown reached them.
    pub already_exited: Vec<String>,
}

impl ShutdownReport {
    pub fn is_empty(&self) -> bool {
        self.graceful.is_empty() && self.killed.is_empty() && self.already_exited.is_empty()
    }

    pub fn total(&self) -> usize {
        self.graceful.len() + self.killed.len() + self.already_exited.len()
    }
}
