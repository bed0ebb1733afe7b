//! Supervised process model.
//!
//! A [`ManagedProcess`] is one external process under supervision. It is owned
//! by the process registry once registered; everything else observes it through
//! [`ProcessSnapshot`]s.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::SupervisorError;
use crate::domain::ports::{ProcessExit, ProcessHandle};

/// Lifecycle state of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Launched, readiness not yet confirmed
    Spawned,
    /// Readiness confirmed
    Ready,
    /// Part of a fully started stack
    Running,
    /// Exited on its own, or never became ready
    Failed,
    /// Graceful termination requested
    Stopping,
    /// Confirmed exited during shutdown
    Stopped,
}

impl ProcessState {
    /// Lowercase name used in logs and JSON output.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spawned => "spawned",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }

    /// Whether the OS process is believed to still be alive.
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Spawned | Self::Ready | Self::Running)
    }

    /// Ready or beyond, and not failed or shutting down.
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }

    /// Confirmed stopped; nothing further can happen to it.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Valid transitions from this state. States only move forward.
    pub const fn valid_transitions(&self) -> &'static [ProcessState] {
        match self {
            Self::Spawned => &[Self::Ready, Self::Failed, Self::Stopping],
            Self::Ready => &[Self::Running, Self::Failed, Self::Stopping],
            Self::Running => &[Self::Failed, Self::Stopping],
            Self::Failed => &[Self::Stopping, Self::Stopped],
            Self::Stopping => &[Self::Stopped],
            Self::Stopped => &[],
        }
    }

    /// Whether moving to `next` keeps the lifecycle moving forward.
    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command line, environment and working directory of a process to launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Variables added on top of the inherited environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Human readable command line, e.g. `go run cmd/api/main.go`.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Point-in-time copy of a managed process, safe to hand out of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub name: String,
    pub pid: Option<u32>,
    pub state: ProcessState,
    pub started_at: DateTime<Utc>,
    pub command: String,
    pub exit_code: Option<i32>,
}

/// One supervised external process.
pub struct ManagedProcess {
    name: String,
    launch: LaunchSpec,
    started_at: DateTime<Utc>,
    state: ProcessState,
    pid: Option<u32>,
    exit: Option<ProcessExit>,
    handle: Box<dyn ProcessHandle>,
    monitor: CancellationToken,
}

impl ManagedProcess {
    /// Wrap a freshly spawned process. `monitor` stops its log monitor.
    pub fn new(
        name: impl Into<String>,
        launch: LaunchSpec,
        handle: Box<dyn ProcessHandle>,
        monitor: CancellationToken,
    ) -> Self {
        let pid = handle.pid();
        Self {
            name: name.into(),
            launch,
            started_at: Utc::now(),
            state: ProcessState::Spawned,
            pid,
            exit: None,
            handle,
            monitor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn state(&self) -> ProcessState {
        self.state
    }

    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub const fn exit(&self) -> Option<ProcessExit> {
        self.exit
    }

    pub fn handle_mut(&mut self) -> &mut dyn ProcessHandle {
        self.handle.as_mut()
    }

    /// Move to `next`, returning the previous state.
    pub fn transition(&mut self, next: ProcessState) -> Result<ProcessState, SupervisorError> {
        if !self.state.can_transition_to(next) {
            return Err(SupervisorError::InvalidStateTransition {
                service: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        let previous = self.state;
        self.state = next;
        Ok(previous)
    }

    pub fn record_exit(&mut self, exit: ProcessExit) {
        self.exit.get_or_insert(exit);
    }

    /// Non-blocking liveness check; records the exit status when it has exited.
    pub fn poll_exit(&mut self) -> std::io::Result<Option<ProcessExit>> {
        if let Some(exit) = self.exit {
            return Ok(Some(exit));
        }
        let exit = self.handle.try_wait()?;
        if let Some(exit) = exit {
            self.record_exit(exit);
        }
        Ok(exit)
    }

    pub fn stop_monitor(&self) {
        self.monitor.cancel();
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            name: self.name.clone(),
            pid: self.pid,
            state: self.state,
            started_at: self.started_at,
            command: self.launch.command_line(),
            exit_code: self.exit.and_then(|e| e.code),
        }
    }
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("name", &self.name)
            .field("pid", &self.pid)
            .field("state", &self.state)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
