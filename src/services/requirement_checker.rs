//! Checks that required external tools can be invoked.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::domain::errors::SupervisorError;
use crate::domain::models::Requirement;
use crate::domain::ports::ProcessLauncher;

/// Probes each requirement by running it with its version flag.
pub struct RequirementChecker {
    launcher: Arc<dyn ProcessLauncher>,
    timeout: Duration,
}

impl RequirementChecker {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, timeout: Duration) -> Self {
        Self { launcher, timeout }
    }

    /// Requirements whose probe failed, timed out, or could not be executed.
    /// All probes run concurrently; the result keeps the input order.
    pub async fn check(&self, requirements: &[Requirement]) -> Vec<Requirement> {
        let probes = requirements.iter().map(|req| async move {
            let spec = req.probe_spec();
            match self.launcher.run(&spec, self.timeout).await {
                Ok(output) if output.success() => {
                    let version = output.stdout.lines().next().unwrap_or_default().trim();
                    debug!(tool = %req.program, version, "requirement available");
                    None
                }
                Ok(output) => {
                    warn!(tool = %req.program, exit = ?output.exit.code, "requirement probe failed");
                    Some(req.clone())
                }
                Err(err) => {
                    warn!(tool = %req.program, error = %err, "requirement probe failed");
                    Some(req.clone())
                }
            }
        });

        join_all(probes).await.into_iter().flatten().collect()
    }

    /// Fail with [`SupervisorError::MissingDependency`] naming every missing tool.
    pub async fn ensure(&self, requirements: &[Requirement]) -> Result<(), SupervisorError> {
        if requirements.is_empty() {
            return Ok(());
        }
        info!(count = requirements.len(), "checking requirements");
        let missing = self.check(requirements).await;
        if missing.is_empty() {
            return Ok(());
        }
        Err(SupervisorError::MissingDependency(
            missing.into_iter().map(|r| r.label).collect(),
        ))
    }
}
