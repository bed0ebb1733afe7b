//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces that infrastructure adapters must implement:
//! - ProcessLauncher / ProcessHandle: spawning and controlling OS processes
//! - ReadinessProbe: a repeatable readiness condition
//!
//! The orchestrator only talks to these traits, which keeps it testable with
//! in-memory fakes.

pub mod probe;
pub mod process;

pub use probe::ReadinessProbe;
pub use process::{CommandOutput, OutputStream, ProcessExit, ProcessHandle, ProcessLauncher};
