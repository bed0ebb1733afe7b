//! Readiness probe that runs a command and checks its exit status.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::{CommandError, ProbeError};
use crate::domain::models::LaunchSpec;
use crate::domain::ports::{ProcessLauncher, ReadinessProbe};

/// Ready when `check` exits 0 within `timeout`.
///
/// A check that cannot even be executed (binary not found) aborts polling;
/// timeouts and other failures are retried.
pub struct CommandProbe {
    launcher: Arc<dyn ProcessLauncher>,
    check: LaunchSpec,
    timeout: Duration,
}

impl CommandProbe {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, check: LaunchSpec, timeout: Duration) -> Self {
        Self {
            launcher,
            check,
            timeout,
        }
    }
}

#[async_trait]
impl ReadinessProbe for CommandProbe {
    fn describe(&self) -> String {
        self.check.command_line()
    }

    async fn check(&self) -> Result<bool, ProbeError> {
        match self.launcher.run(&self.check, self.timeout).await {
            Ok(output) => Ok(output.success()),
            Err(CommandError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Err(ProbeError::Fatal(source.to_string()))
            }
            Err(err) => Err(ProbeError::Transient(err.to_string())),
        }
    }
}
