//! Interrupt handling.
//!
//! The process-wide stop token is the only global mutable state in the
//! launcher. It starts uncancelled and is cancelled at most once, by the
//! signal handler (or [`request_stop`]). Everything else receives a clone of
//! it explicitly.

use std::sync::{Arc, OnceLock};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::errors::FAILURE_EXIT_CODE;

use super::orchestrator::{Orchestrator, RunPhase};

static STOP: OnceLock<CancellationToken> = OnceLock::new();

/// The process-wide stop token.
pub fn stop_token() -> CancellationToken {
    STOP.get_or_init(CancellationToken::new).clone()
}

/// Set the stop flag. Later calls are no-ops.
pub fn request_stop() {
    stop_token().cancel();
}

pub fn stop_requested() -> bool {
    STOP.get().is_some_and(CancellationToken::is_cancelled)
}

/// Exit code for a run ended by an operator interrupt observed in `phase`.
///
/// A stack that reached Running was interrupted gracefully; anything earlier
/// means the run never fully succeeded.
pub const fn interrupted_exit_code(phase: RunPhase) -> u8 {
    match phase {
        RunPhase::Running => 0,
        _ => FAILURE_EXIT_CODE,
    }
}

/// Completes on SIGINT, SIGTERM or SIGQUIT (Ctrl-C elsewhere).
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Stops the stack when the host asks the launcher to go away.
pub struct SignalHandler {
    orchestrator: Arc<Orchestrator>,
    token: CancellationToken,
}

impl SignalHandler {
    pub const fn new(orchestrator: Arc<Orchestrator>, token: CancellationToken) -> Self {
        Self { orchestrator, token }
    }

    /// Set the stop flag, shut everything down, and report the exit code.
    pub async fn handle_interrupt(&self) -> u8 {
        let phase = self.orchestrator.phase();
        warn!(phase = %phase, "interrupt received, stopping all services");
        self.token.cancel();

        let report = self.orchestrator.shutdown().await;
        info!(stopped = report.total(), killed = report.killed.len(), "shutdown after interrupt complete");
        interrupted_exit_code(phase)
    }

    /// Wait for a signal in the background.
    ///
    /// The task resolves to the exit code once shutdown has finished, or to
    /// `None` if signals could not be registered.
    pub fn install(self) -> JoinHandle<Option<u8>> {
        tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => Some(self.handle_interrupt().await),
                Err(e) => {
                    error!(error = %e, "failed to register signal handlers");
                    None
                }
            }
        })
    }
}
