//! Per-process output monitor.
//!
//! Each spawned process gets one monitor task. It reads the merged output
//! stream, classifies every line and reports back to the orchestrator over a
//! channel; it never touches process state itself.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::domain::ports::OutputStream;
use crate::services::log_classifier::{LogCategory, LogClassifier};

/// Something a monitor observed in a process's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// First line matching a ready phrase.
    Ready { service: String, line: String },
    /// Line matching an error pattern.
    Error { service: String, line: String },
    /// Any other line.
    Message {
        service: String,
        line: String,
        highlighted: bool,
    },
    /// Output stream ended, or the monitor was cancelled.
    Closed { service: String },
}

impl MonitorEvent {
    pub fn service(&self) -> &str {
        match self {
            Self::Ready { service, .. }
            | Self::Error { service, .. }
            | Self::Message { service, .. }
            | Self::Closed { service } => service,
        }
    }
}

/// Counts from a finished monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub lines: u64,
    pub errors: u64,
    pub saw_ready: bool,
}

pub struct LogMonitor {
    service: String,
    classifier: LogClassifier,
    events: mpsc::UnboundedSender<MonitorEvent>,
    cancel: CancellationToken,
}

impl LogMonitor {
    pub fn new(
        service: impl Into<String>,
        classifier: LogClassifier,
        events: mpsc::UnboundedSender<MonitorEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service: service.into(),
            classifier,
            events,
            cancel,
        }
    }

    /// Consume `output` until it closes or the monitor is cancelled.
    pub async fn run(self, mut output: OutputStream) -> MonitorSummary {
        let mut summary = MonitorSummary::default();

        loop {
            let line = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!(service = %self.service, "log monitor cancelled");
                    break;
                }
                line = output.recv() => line,
            };
            let Some(line) = line else {
                debug!(service = %self.service, lines = summary.lines, "output stream closed");
                break;
            };

            summary.lines += 1;
            let event = self.classify(line, &mut summary);
            if self.events.send(event).is_err() {
                // Orchestrator is gone; nobody is listening any more.
                break;
            }
        }

        let _ = self.events.send(MonitorEvent::Closed {
            service: self.service.clone(),
        });
        summary
    }

    fn classify(&self, line: String, summary: &mut MonitorSummary) -> MonitorEvent {
        let service = self.service.clone();
        match self.classifier.classify(&line) {
            LogCategory::ErrorSignal => {
                summary.errors += 1;
                error!(target: "zviewer_launcher::service_output", service = %service, category = "error", "{line}");
                MonitorEvent::Error { service, line }
            }
            LogCategory::ReadySignal if !summary.saw_ready => {
                summary.saw_ready = true;
                info!(target: "zviewer_launcher::service_output", service = %service, category = "ready", "{line}");
                MonitorEvent::Ready { service, line }
            }
            LogCategory::ReadySignal | LogCategory::Informational => {
                let highlighted = self.classifier.is_highlighted(&line);
                if highlighted {
                    info!(target: "zviewer_launcher::service_output", service = %service, category = "info", "{line}");
                } else {
                    debug!(target: "zviewer_launcher::service_output", service = %service, category = "info", "{line}");
                }
                MonitorEvent::Message {
                    service,
                    line,
                    highlighted,
                }
            }
        }
    }
}
