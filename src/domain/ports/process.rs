//! Process launcher port - interface for spawning and controlling OS processes.

use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::errors::{CommandError, SupervisorError};
use crate::domain::models::LaunchSpec;

/// Merged stdout/stderr of a process, one line per message.
///
/// The stream closes once the process has closed both pipes.
pub type OutputStream = mpsc::Receiver<String>;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Terminating signal on Unix.
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub const fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub const fn with_signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Captured result of a command run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit: ProcessExit,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub const fn success(&self) -> bool {
        self.exit.success()
    }
}

/// Control surface of one spawned process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Take the merged output stream. Returns `None` after the first call.
    fn take_output(&mut self) -> Option<OutputStream>;

    /// Non-blocking "has it exited".
    fn try_wait(&mut self) -> std::io::Result<Option<ProcessExit>>;

    /// Ask the process to exit (SIGTERM on Unix).
    fn terminate(&mut self) -> std::io::Result<()>;

    /// Forcefully kill the process without waiting for it.
    fn kill(&mut self) -> std::io::Result<()>;

    /// Wait until the process has exited.
    async fn wait(&mut self) -> std::io::Result<ProcessExit>;
}

/// Spawns supervised processes and runs short-lived commands.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn a long-running process. Failure is a [`SupervisorError::Spawn`] and is not retried.
    async fn spawn(
        &self,
        service: &str,
        spec: &LaunchSpec,
    ) -> Result<Box<dyn ProcessHandle>, SupervisorError>;

    /// Run a command to completion, killing it when `timeout` elapses.
    async fn run(&self, spec: &LaunchSpec, timeout: Duration)
        -> Result<CommandOutput, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_success() {
        assert!(ProcessExit::with_code(0).success());
        assert!(!ProcessExit::with_code(1).success());
        assert!(!ProcessExit::with_signal(15).success());
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_from_status() {
        use std::os::unix::process::ExitStatusExt;

        let exit = ProcessExit::from(ExitStatus::from_raw(0));
        assert_eq!(exit, ProcessExit::with_code(0));

        // Raw wait status 9 means "killed by SIGKILL".
        let exit = ProcessExit::from(ExitStatus::from_raw(9));
        assert_eq!(exit.code, None);
        assert_eq!(exit.signal, Some(9));
    }
}
