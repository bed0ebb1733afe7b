//! Common test utilities for integration tests
//!
//! Provides a scripted in-memory [`ProcessLauncher`] so the orchestrator can
//! be driven end to end without spawning real processes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use zviewer_launcher::application::{Orchestrator, OrchestratorConfig};
use zviewer_launcher::domain::errors::{CommandError, SupervisorError};
use zviewer_launcher::domain::models::{LaunchSpec, ProcessSnapshot};
use zviewer_launcher::domain::ports::{
    CommandOutput, OutputStream, ProcessExit, ProcessHandle, ProcessLauncher,
};
use zviewer_launcher::services::ProcessRegistry;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Orchestrator timings short enough for tests.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        shutdown_grace: Duration::from_millis(200),
        kill_wait: Duration::from_millis(200),
        sweep_interval: Duration::from_millis(20),
        readiness_check_interval: Duration::from_millis(10),
        requirement_timeout: Duration::from_millis(200),
    }
}

/// How a fake process behaves once spawned.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub lines: Vec<String>,
    pub line_delay: Duration,
    /// Exit on its own with this code after the delay.
    pub exit_after: Option<(Duration, i32)>,
    /// Stay alive after SIGTERM; only a kill stops it.
    pub ignore_terminate: bool,
    pub fail_spawn: bool,
}

impl Script {
    pub fn printing<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            line_delay: Duration::from_millis(5),
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn failing_spawn() -> Self {
        Self {
            fail_spawn: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn exiting_after(mut self, delay: Duration, code: i32) -> Self {
        self.exit_after = Some((delay, code));
        self
    }

    #[must_use]
    pub const fn stubborn(mut self) -> Self {
        self.ignore_terminate = true;
        self
    }
}

/// Result of a short-lived command, keyed by program name.
#[derive(Debug, Clone, Copy)]
pub enum RunBehavior {
    Succeed,
    Fail(i32),
    /// The executable does not exist.
    Missing,
    /// Fails until the given call number, then succeeds.
    SucceedFrom(u32),
}

/// What the fake launcher saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Spawned(String),
    Ran(String),
    Terminated(String),
    Killed(String),
}

/// Registry contents observed at the moment a process was spawned.
#[derive(Debug, Clone)]
pub struct SpawnObservation {
    pub service: String,
    pub registry: Vec<ProcessSnapshot>,
}

#[derive(Default)]
pub struct FakeLauncher {
    scripts: Mutex<HashMap<String, Script>>,
    runs: Mutex<HashMap<String, RunBehavior>>,
    run_calls: Mutex<HashMap<String, u32>>,
    events: Arc<Mutex<Vec<Event>>>,
    observations: Mutex<Vec<SpawnObservation>>,
    registry: OnceLock<Arc<ProcessRegistry>>,
    next_pid: AtomicU32,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_pid: AtomicU32::new(1000),
            ..Self::default()
        })
    }

    pub fn script(&self, service: &str, script: Script) {
        self.scripts.lock().unwrap().insert(service.to_string(), script);
    }

    pub fn on_run(&self, program: &str, behavior: RunBehavior) {
        self.runs.lock().unwrap().insert(program.to_string(), behavior);
    }

    /// Record the registry contents on every spawn.
    pub fn observe(&self, registry: Arc<ProcessRegistry>) {
        let _ = self.registry.set(registry);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Spawned(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn terminated(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Terminated(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn run_count(&self, program: &str) -> u32 {
        self.run_calls.lock().unwrap().get(program).copied().unwrap_or(0)
    }

    pub fn observations(&self) -> Vec<SpawnObservation> {
        self.observations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn spawn(
        &self,
        service: &str,
        _spec: &LaunchSpec,
    ) -> Result<Box<dyn ProcessHandle>, SupervisorError> {
        if let Some(registry) = self.registry.get() {
            let snapshot = registry.list().await;
            self.observations.lock().unwrap().push(SpawnObservation {
                service: service.to_string(),
                registry: snapshot,
            });
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default();
        if script.fail_spawn {
            return Err(SupervisorError::Spawn {
                service: service.to_string(),
                reason: "scripted spawn failure".to_string(),
            });
        }

        self.events.lock().unwrap().push(Event::Spawned(service.to_string()));
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle::start(
            service,
            pid,
            script,
            Arc::clone(&self.events),
        )))
    }

    async fn run(&self, spec: &LaunchSpec, _timeout: Duration) -> Result<CommandOutput, CommandError> {
        let call = {
            let mut calls = self.run_calls.lock().unwrap();
            let count = calls.entry(spec.program.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.events.lock().unwrap().push(Event::Ran(spec.command_line()));

        let behavior = self
            .runs
            .lock()
            .unwrap()
            .get(&spec.program)
            .copied()
            .unwrap_or(RunBehavior::Succeed);
        let code = match behavior {
            RunBehavior::Succeed => 0,
            RunBehavior::Fail(code) => code,
            RunBehavior::SucceedFrom(n) if call >= n => 0,
            RunBehavior::SucceedFrom(_) => 1,
            RunBehavior::Missing => {
                return Err(CommandError::Io {
                    command: spec.command_line(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                })
            }
        };
        Ok(CommandOutput {
            exit: ProcessExit::with_code(code),
            stdout: String::new(),
            stderr: if code == 0 { String::new() } else { "scripted failure".to_string() },
        })
    }
}

pub struct FakeHandle {
    service: String,
    pid: u32,
    output: Option<OutputStream>,
    exit_tx: Arc<watch::Sender<Option<ProcessExit>>>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
    ignore_terminate: bool,
    events: Arc<Mutex<Vec<Event>>>,
}

impl FakeHandle {
    fn start(service: &str, pid: u32, script: Script, events: Arc<Mutex<Vec<Event>>>) -> Self {
        let (exit_tx, exit_rx) = watch::channel(None);
        let exit_tx = Arc::new(exit_tx);
        let (line_tx, line_rx) = mpsc::channel(64);

        let mut until_exit = exit_rx.clone();
        let lines = script.lines.clone();
        let delay = script.line_delay;
        tokio::spawn(async move {
            for line in lines {
                tokio::time::sleep(delay).await;
                if line_tx.send(line).await.is_err() {
                    return;
                }
            }
            // Pipes stay open until the process is gone.
            let _ = until_exit.wait_for(Option::is_some).await;
            drop(line_tx);
        });

        if let Some((after, code)) = script.exit_after {
            let tx = Arc::clone(&exit_tx);
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                tx.send_if_modified(|exit| {
                    if exit.is_none() {
                        *exit = Some(ProcessExit::with_code(code));
                        true
                    } else {
                        false
                    }
                });
            });
        }

        Self {
            service: service.to_string(),
            pid,
            output: Some(line_rx),
            exit_tx,
            exit_rx,
            ignore_terminate: script.ignore_terminate,
            events,
        }
    }

    fn exit_with(&self, exit: ProcessExit) {
        self.exit_tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(exit);
                true
            } else {
                false
            }
        });
    }
}

#[async_trait]
impl ProcessHandle for FakeHandle {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn take_output(&mut self) -> Option<OutputStream> {
        self.output.take()
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ProcessExit>> {
        Ok(*self.exit_rx.borrow())
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        self.events.lock().unwrap().push(Event::Terminated(self.service.clone()));
        if !self.ignore_terminate {
            self.exit_with(ProcessExit::with_signal(15));
        }
        Ok(())
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.events.lock().unwrap().push(Event::Killed(self.service.clone()));
        self.exit_with(ProcessExit::with_signal(9));
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<ProcessExit> {
        let exit = *self
            .exit_rx
            .wait_for(Option::is_some)
            .await
            .map_err(std::io::Error::other)?;
        Ok(exit.unwrap_or(ProcessExit::with_signal(9)))
    }
}

/// Orchestrator over `launcher` with fast timings, observing spawns.
pub fn orchestrator(launcher: &Arc<FakeLauncher>) -> (Arc<Orchestrator>, CancellationToken) {
    let token = CancellationToken::new();
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(launcher) as Arc<dyn ProcessLauncher>,
        fast_config(),
        token.clone(),
    ));
    launcher.observe(orchestrator.registry());
    (orchestrator, token)
}
