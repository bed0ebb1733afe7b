//! Building blocks the orchestrator is assembled from.

pub mod command_probe;
pub mod log_classifier;
pub mod log_monitor;
pub mod process_registry;
pub mod readiness_poller;
pub mod requirement_checker;
pub mod stack;

pub use command_probe::CommandProbe;
pub use log_classifier::{LogCategory, LogClassifier};
pub use log_monitor::{LogMonitor, MonitorEvent, MonitorSummary};
pub use process_registry::{ProcessRegistry, RegistryEntries};
pub use readiness_poller::{PollSuccess, ReadinessPoller};
pub use requirement_checker::RequirementChecker;
pub use stack::StackBuilder;
