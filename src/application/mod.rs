//! Application layer: run-wide sequencing and interrupt handling.

pub mod orchestrator;
pub mod signal_handler;

pub use orchestrator::{
    Orchestrator, OrchestratorConfig, RunPhase, ShutdownReport, TerminationReason,
};
pub use signal_handler::{interrupted_exit_code, request_stop, stop_requested, stop_token, SignalHandler};
