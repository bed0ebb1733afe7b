//! Orchestrator - sequences startup, supervises the running stack, and tears it down.
//!
//! The orchestrator is split by lifecycle stage:
//!
//! - **types**: Public configuration, phase, and report types
//! - **startup**: Requirement checks, container engine gates, group-by-group launch and readiness
//! - **supervision**: Applying monitor events and sweeping for processes that exited
//! - **shutdown**: Reverse-order graceful terminate with forced-kill escalation
//!
//! Log monitors never mutate the registry. They send [`MonitorEvent`]s over a
//! channel and the orchestrator applies them while it waits, so every state
//! change goes through one coordinator.

pub mod types;
mod shutdown;
mod startup;
mod supervision;

pub use types::{OrchestratorConfig, RunPhase, ShutdownReport, TerminationReason};

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;
use uuid::Uuid;

use crate::domain::models::{ManagedProcess, ProcessSnapshot, ProcessState};
use crate::domain::ports::ProcessLauncher;
use crate::services::{MonitorEvent, ProcessRegistry};

/// The only component with global sequencing authority.
pub struct Orchestrator {
    pub(super) run_id: Uuid,
    pub(super) launcher: Arc<dyn ProcessLauncher>,
    pub(super) registry: Arc<ProcessRegistry>,
    pub(super) config: OrchestratorConfig,
    pub(super) cancel: CancellationToken,
    pub(super) phase: watch::Sender<RunPhase>,

    // Monitor plumbing
    pub(super) events_tx: mpsc::UnboundedSender<MonitorEvent>,
    pub(super) events_rx: Mutex<mpsc::UnboundedReceiver<MonitorEvent>>,
    pub(super) monitors: TaskTracker,

    /// Services whose readiness is decided by a log ready signal.
    pub(super) log_readiness: std::sync::Mutex<HashSet<String>>,
    pub(super) shutdown_lock: Mutex<()>,
}

impl Orchestrator {
    /// `cancel` is the run's stop token; every wait observes it.
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        config: OrchestratorConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (phase, _) = watch::channel(RunPhase::Idle);
        Self {
            run_id: Uuid::new_v4(),
            launcher,
            registry: Arc::new(ProcessRegistry::new()),
            config,
            cancel,
            phase,
            events_tx,
            events_rx: Mutex::new(events_rx),
            monitors: TaskTracker::new(),
            log_readiness: std::sync::Mutex::new(HashSet::new()),
            shutdown_lock: Mutex::new(()),
        }
    }

    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn registry(&self) -> Arc<ProcessRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Snapshots of the registry, in start order.
    pub async fn snapshots(&self) -> Vec<ProcessSnapshot> {
        self.registry.list().await
    }

    pub(super) fn set_phase(&self, next: RunPhase) {
        let previous = self.phase.send_replace(next);
        if previous != next {
            info!(run_id = %self.run_id, from = %previous, to = %next, "run phase changed");
        }
    }

    /// Whether new work must not be started.
    pub(super) fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled() || self.phase().is_stopping()
    }

    /// Run `fut` while applying monitor events as they arrive.
    pub(super) async fn drive<F: Future>(&self, fut: F) -> F::Output {
        let mut events = self.events_rx.lock().await;
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.apply_event(event).await,
                output = &mut fut => return output,
            }
        }
    }
}

/// Move `process` to `next`, logging the change. Invalid moves are logged and skipped.
pub(super) fn advance(process: &mut ManagedProcess, next: ProcessState) -> bool {
    match process.transition(next) {
        Ok(previous) => {
            info!(service = %process.name(), from = %previous, to = %next, pid = ?process.pid(), "state changed");
            true
        }
        Err(err) => {
            tracing::debug!(error = %err, "state change skipped");
            false
        }
    }
}
