//! Steady-state supervision.

use tracing::{debug, error, info, warn};

use crate::domain::errors::SupervisorError;
use crate::domain::models::ProcessState;
use crate::services::MonitorEvent;

use super::{advance, Orchestrator, TerminationReason};

impl Orchestrator {
    /// Apply one monitor event to the registry.
    pub(super) async fn apply_event(&self, event: MonitorEvent) {
        match event {
            MonitorEvent::Ready { service, .. } => {
                let decides_readiness = self
                    .log_readiness
                    .lock()
                    .is_ok_and(|services| services.contains(&service));
                if !decides_readiness {
                    return;
                }
                let mut entries = self.registry.lock().await;
                if let Some(process) = entries.get_mut(&service) {
                    if process.state() == ProcessState::Spawned {
                        advance(process, ProcessState::Ready);
                    }
                }
            }
            MonitorEvent::Closed { service } => {
                debug!(service = %service, "output closed");
            }
            // Error and informational lines were already logged by the monitor.
            MonitorEvent::Error { .. } | MonitorEvent::Message { .. } => {}
        }
    }

    /// Supervise until a stop is requested or nothing is left alive.
    ///
    /// Processes that exit are marked Failed; non-zero exits are reported as
    /// crashes. The remaining ones keep running.
    pub async fn await_termination(&self) -> TerminationReason {
        self.drive(async {
            loop {
                if self.cancel.is_cancelled() {
                    return TerminationReason::StopRequested;
                }
                self.sweep().await;
                if self.registry.live_count().await == 0 {
                    let unclean = self.registry.unclean_exits().await;
                    if unclean.is_empty() {
                        info!("all supervised processes exited cleanly");
                        return TerminationReason::AllExited;
                    }
                    warn!(services = ?unclean, "all supervised processes have exited");
                    return TerminationReason::Crashed;
                }
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return TerminationReason::StopRequested,
                    () = tokio::time::sleep(self.config.sweep_interval) => {}
                }
            }
        })
        .await
    }

    /// One pass over the registry: promote Ready to Running, fail exited processes.
    pub async fn sweep(&self) {
        let mut entries = self.registry.lock().await;
        let names = entries.names().to_vec();

        for name in names {
            let Some(process) = entries.get_mut(&name) else {
                continue;
            };
            if process.state() == ProcessState::Ready {
                advance(process, ProcessState::Running);
            }
            if !process.state().is_live() {
                continue;
            }
            match process.poll_exit() {
                Ok(Some(exit)) if exit.success() => {
                    advance(process, ProcessState::Failed);
                    info!(service = %name, "exited with code 0");
                }
                Ok(Some(exit)) => {
                    advance(process, ProcessState::Failed);
                    let crash = SupervisorError::ProcessCrash {
                        service: name.clone(),
                        exit_code: exit.code,
                    };
                    error!(service = %name, exit_code = ?exit.code, signal = ?exit.signal, "{crash}");
                }
                Ok(None) => {}
                Err(e) => warn!(service = %name, error = %e, "liveness check failed"),
            }
        }
    }
}
