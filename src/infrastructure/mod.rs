//! Infrastructure layer module
//!
//! Adapters to the outside world:
//! - Configuration management
//! - Logging infrastructure
//! - OS process spawning and signalling
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod logging;
pub mod process;
