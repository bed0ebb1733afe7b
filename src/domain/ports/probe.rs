//! Readiness probe port.

use async_trait::async_trait;

use crate::domain::errors::ProbeError;

/// A boolean condition checked repeatedly by the readiness poller.
///
/// `Ok(false)` and [`ProbeError::Transient`] both mean "not yet";
/// [`ProbeError::Fatal`] stops polling early.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Short description used in logs, e.g. `docker info`.
    fn describe(&self) -> String;

    async fn check(&self) -> Result<bool, ProbeError>;
}
