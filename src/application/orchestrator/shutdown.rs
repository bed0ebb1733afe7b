//! Shutdown: reverse start order, graceful terminate, then forced kill.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::errors::SupervisorError;
use crate::domain::models::{ManagedProcess, ProcessState};
use crate::services::RegistryEntries;

use super::{advance, Orchestrator, RunPhase, ShutdownReport};

/// How long monitor tasks get to finish once their tokens are cancelled.
const MONITOR_DRAIN: Duration = Duration::from_secs(1);

enum Retired {
    Graceful,
    Killed,
    AlreadyExited,
}

impl Orchestrator {
    /// Stop every supervised process and empty the registry.
    ///
    /// Safe to call repeatedly and concurrently; a call on an empty registry
    /// does nothing beyond marking the run terminated. One process refusing
    /// to stop never prevents attempts on the others. The registry is closed
    /// first, so a launch racing with shutdown is killed rather than kept.
    pub async fn shutdown(&self) -> ShutdownReport {
        let _serialized = self.shutdown_lock.lock().await;
        let mut report = ShutdownReport::default();
        self.registry.close().await;

        let names = self.registry.names_in_start_order().await;
        if names.is_empty() {
            debug!("shutdown requested with nothing running");
            self.set_phase(RunPhase::Terminated);
            return report;
        }

        self.set_phase(RunPhase::ShuttingDown);
        info!(count = names.len(), "stopping all services");

        let mut visited = HashSet::new();
        let mut pending = names;
        while !pending.is_empty() {
            for name in pending.iter().rev() {
                visited.insert(name.clone());
                let mut entries = self.registry.lock().await;
                match self.retire(&mut entries, name).await {
                    Some(Retired::Graceful) => report.graceful.push(name.clone()),
                    Some(Retired::Killed) => report.killed.push(name.clone()),
                    Some(Retired::AlreadyExited) => report.already_exited.push(name.clone()),
                    None => {}
                }
            }
            pending = self
                .registry
                .names_in_start_order()
                .await
                .into_iter()
                .filter(|name| !visited.contains(name))
                .collect();
        }

        self.monitors.close();
        if tokio::time::timeout(MONITOR_DRAIN, self.monitors.wait()).await.is_err() {
            debug!("log monitors still draining after shutdown");
        }

        let removed = self.registry.clear().await;
        self.set_phase(RunPhase::Terminated);
        info!(
            removed,
            graceful = report.graceful.len(),
            killed = report.killed.len(),
            already_exited = report.already_exited.len(),
            "all services stopped"
        );
        report
    }

    async fn retire(&self, entries: &mut RegistryEntries, name: &str) -> Option<Retired> {
        let process = entries.get_mut(name)?;
        if process.state().is_terminal() {
            return None;
        }

        let retired = match process.poll_exit() {
            Ok(Some(exit)) => {
                debug!(service = %name, exit_code = ?exit.code, "already exited");
                Retired::AlreadyExited
            }
            _ => {
                advance(process, ProcessState::Stopping);
                self.stop_gracefully(process).await
            }
        };

        if process.state().is_live() {
            advance(process, ProcessState::Stopping);
        }
        advance(process, ProcessState::Stopped);
        process.stop_monitor();
        Some(retired)
    }

    /// Terminate, wait out the grace period, then kill.
    async fn stop_gracefully(&self, process: &mut ManagedProcess) -> Retired {
        let name = process.name().to_string();
        let grace = self.config.shutdown_grace;

        if let Err(e) = process.handle_mut().terminate() {
            warn!(service = %name, error = %e, "terminate failed");
        }
        match tokio::time::timeout(grace, process.handle_mut().wait()).await {
            Ok(Ok(exit)) => {
                process.record_exit(exit);
                info!(service = %name, exit_code = ?exit.code, "stopped");
                return Retired::Graceful;
            }
            Ok(Err(e)) => warn!(service = %name, error = %e, "waiting for exit failed"),
            Err(_) => {
                let err = SupervisorError::ShutdownTimeout {
                    service: name.clone(),
                    grace,
                };
                warn!(service = %name, "{err}, killing");
            }
        }

        if let Err(e) = process.handle_mut().kill() {
            warn!(service = %name, error = %e, "kill failed");
        }
        match tokio::time::timeout(self.config.kill_wait, process.handle_mut().wait()).await {
            Ok(Ok(exit)) => process.record_exit(exit),
            Ok(Err(e)) => warn!(service = %name, error = %e, "waiting for exit after kill failed"),
            Err(_) => warn!(service = %name, "still running after kill"),
        }
        info!(service = %name, "killed");
        Retired::Killed
    }
}
