//! Errors raised while bringing the stack up, supervising it, and tearing it down.

use std::time::Duration;

use thiserror::Error;

use super::models::ProcessState;

/// Exit code reported for every precondition or startup failure.
pub const FAILURE_EXIT_CODE: u8 = 1;

fn join_labels(labels: &[String]) -> String {
    labels.join(", ")
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"))
}

/// Supervisor-level errors.
///
/// The first five variants form the failure taxonomy the run is reported in;
/// the remainder guard registry and plan invariants.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Missing requirements: {}", join_labels(.0))]
    MissingDependency(Vec<String>),

    #[error("Failed to start {service}: {reason}")]
    Spawn { service: String, reason: String },

    #[error("{service} did not become ready within {waited:?}")]
    ReadinessTimeout { service: String, waited: Duration },

    #[error("{service} exited unexpectedly ({})", describe_exit(*.exit_code))]
    ProcessCrash { service: String, exit_code: Option<i32> },

    #[error("{service} ignored graceful termination for {grace:?}")]
    ShutdownTimeout { service: String, grace: Duration },

    #[error("Cannot start {service}: dependency {dependency} is not ready")]
    DependencyNotReady { service: String, dependency: String },

    #[error("Process already registered: {0}")]
    DuplicateProcess(String),

    #[error("Process registry is closed, refused {0}")]
    RegistryClosed(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Invalid state transition for {service} from {from} to {to}")]
    InvalidStateTransition {
        service: String,
        from: ProcessState,
        to: ProcessState,
    },

    #[error("Invalid orchestration plan: {0}")]
    InvalidPlan(String),

    #[error("Startup cancelled by stop request")]
    Cancelled,
}

impl SupervisorError {
    /// Process exit code for a run that ended with this error.
    pub const fn exit_code(&self) -> u8 {
        FAILURE_EXIT_CODE
    }
}

/// Errors raised by a single readiness probe invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// The probe could not run this time; counted as a negative result.
    #[error("probe failed: {0}")]
    Transient(String),

    /// Waiting any longer is pointless (e.g. the probed process has exited).
    #[error("probe aborted: {0}")]
    Fatal(String),
}

/// Outcome of a readiness poll that did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("condition not met after {attempts} attempts ({elapsed:?})")]
    TimedOut { attempts: u32, elapsed: Duration },

    #[error("polling aborted after {attempts} attempts: {reason}")]
    Aborted { attempts: u32, reason: String },

    #[error("polling cancelled")]
    Cancelled,
}

/// Failure to run a short-lived command to completion.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dependency_lists_labels() {
        let err = SupervisorError::MissingDependency(vec!["Go".into(), "Docker".into()]);
        assert_eq!(err.to_string(), "Missing requirements: Go, Docker");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_crash_message_mentions_signal() {
        let err = SupervisorError::ProcessCrash {
            service: "media-service".into(),
            exit_code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));

        let err = SupervisorError::ProcessCrash {
            service: "backend".into(),
            exit_code: Some(2),
        };
        assert!(err.to_string().contains("exit code 2"));
    }
}
