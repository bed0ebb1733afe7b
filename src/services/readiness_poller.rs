//! Bounded fixed-interval polling.
//!
//! Startup dependencies here are local and short-lived, so the poller sleeps a
//! fixed interval between attempts rather than backing off. It always
//! terminates: success, timeout, early abort, or cancellation.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::domain::errors::{PollError, ProbeError};
use crate::domain::ports::ReadinessProbe;

/// Result of a successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSuccess {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Repeatedly probes a condition until it holds or the attempt budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPoller {
    max_attempts: u32,
    interval: Duration,
    max_consecutive_errors: Option<u32>,
}

impl ReadinessPoller {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            max_consecutive_errors: None,
        }
    }

    /// Give up early once the probe itself has errored `limit` times in a row.
    #[must_use]
    pub const fn abort_after_errors(mut self, limit: u32) -> Self {
        self.max_consecutive_errors = Some(limit);
        self
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Attempts needed to cover `timeout` at `interval`, at least one.
    pub fn attempts_for(timeout: Duration, interval: Duration) -> u32 {
        if interval.is_zero() {
            return 1;
        }
        let attempts = timeout.as_millis().div_ceil(interval.as_millis()).max(1);
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }

    /// Poll `probe` until it reports `true`.
    ///
    /// Transient probe errors count as a negative result; a fatal error aborts
    /// immediately. Sleeps between attempts observe `cancel`.
    pub async fn poll<F, Fut>(
        &self,
        mut probe: F,
        cancel: &CancellationToken,
    ) -> Result<PollSuccess, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, ProbeError>>,
    {
        let started = Instant::now();
        let mut consecutive_errors = 0u32;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PollError::Cancelled),
                outcome = probe() => outcome,
            };

            match outcome {
                Ok(true) => {
                    trace!(attempt, "probe succeeded");
                    return Ok(PollSuccess {
                        attempts: attempt,
                        elapsed: started.elapsed(),
                    });
                }
                Ok(false) => {
                    consecutive_errors = 0;
                    trace!(attempt, max_attempts = self.max_attempts, "condition not met yet");
                }
                Err(ProbeError::Transient(reason)) => {
                    consecutive_errors += 1;
                    debug!(attempt, consecutive_errors, %reason, "probe errored");
                    if self
                        .max_consecutive_errors
                        .is_some_and(|limit| consecutive_errors >= limit)
                    {
                        return Err(PollError::Aborted {
                            attempts: attempt,
                            reason,
                        });
                    }
                }
                Err(ProbeError::Fatal(reason)) => {
                    return Err(PollError::Aborted {
                        attempts: attempt,
                        reason,
                    });
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(PollError::Cancelled),
                    () = tokio::time::sleep(self.interval) => {}
                }
            }
        }

        Err(PollError::TimedOut {
            attempts: self.max_attempts,
            elapsed: started.elapsed(),
        })
    }

    /// Poll a [`ReadinessProbe`] implementation.
    pub async fn poll_probe(
        &self,
        probe: &dyn ReadinessProbe,
        cancel: &CancellationToken,
    ) -> Result<PollSuccess, PollError> {
        debug!(probe = %probe.describe(), max_attempts = self.max_attempts, "polling");
        self.poll(|| probe.check(), cancel).await
    }
}
