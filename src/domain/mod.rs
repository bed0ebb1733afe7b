//! Domain layer for the launcher
//!
//! Process and plan models, the error taxonomy, and the ports the
//! infrastructure implements.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CommandError, PollError, ProbeError, SupervisorError};
