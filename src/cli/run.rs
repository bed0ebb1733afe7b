//! The single launcher command: bring the stack up, supervise it, tear it down.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::{
    stop_requested, stop_token, Orchestrator, OrchestratorConfig, SignalHandler,
    TerminationReason,
};
use crate::domain::errors::FAILURE_EXIT_CODE;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::LoggerImpl;
use crate::infrastructure::process::TokioProcessLauncher;
use crate::services::StackBuilder;

use super::output::{output, RunningSummary};
use super::{handle_error, Cli};

pub async fn execute(cli: &Cli) -> ExitCode {
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            handle_error(&err, cli.json);
            ExitCode::from(FAILURE_EXIT_CODE)
        }
    }
}

/// Command-line logging flags win over every configuration layer.
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    if let Some(format) = &cli.log_format {
        config.logging.format.clone_from(format);
    }
}

async fn interrupt_exit_code(signals: JoinHandle<Option<u8>>) -> u8 {
    signals.await.ok().flatten().unwrap_or(FAILURE_EXIT_CODE)
}

async fn run(cli: &Cli) -> Result<u8> {
    let selection = cli.selection()?;

    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    apply_overrides(cli, &mut config);
    let _logger = LoggerImpl::init(&config.logging).context("Failed to initialize logging")?;

    let plan = StackBuilder::new(&config, &selection)
        .build()
        .context("Failed to build the orchestration plan")?;

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(TokioProcessLauncher::new()),
        OrchestratorConfig::from(&config.supervisor),
        stop_token(),
    ));
    let signals = SignalHandler::new(Arc::clone(&orchestrator), stop_token()).install();

    if let Err(err) = orchestrator.start_according_to_plan(&plan).await {
        if stop_requested() {
            return Ok(interrupt_exit_code(signals).await);
        }
        signals.abort();
        return Err(err).context("ZViewer failed to start");
    }

    let snapshots = orchestrator.snapshots().await;
    output(&RunningSummary::new(orchestrator.run_id(), &plan, &snapshots), cli.json);

    let reason = orchestrator.await_termination().await;
    let report = orchestrator.shutdown().await;
    info!(run_id = %orchestrator.run_id(), stopped = report.total(), "launcher finished");

    match reason {
        TerminationReason::StopRequested => Ok(interrupt_exit_code(signals).await),
        TerminationReason::AllExited => {
            signals.abort();
            info!("every service exited cleanly");
            Ok(0)
        }
        TerminationReason::Crashed => {
            signals.abort();
            warn!("every service exited, at least one unsuccessfully");
            anyhow::bail!("Services exited unexpectedly")
        }
    }
}
