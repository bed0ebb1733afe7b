//! ZViewer launcher - dependency-ordered startup and supervision of the ZViewer stack
//!
//! The launcher brings up PostgreSQL (via docker compose), the Go API, the
//! optional Go microservices and the Flutter client in dependency order,
//! supervises their output and liveness, and tears everything down in
//! reverse order on interrupt.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): Process and plan models, errors, and ports
//! - **Service Layer** (`services`): Readiness polling, log classification and monitoring, the registry, the stack plan
//! - **Application Layer** (`application`): The orchestrator and signal handling
//! - **Infrastructure Layer** (`infrastructure`): Configuration, logging, and the tokio process adapter
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zviewer_launcher::application::{stop_token, Orchestrator, OrchestratorConfig};
//! use zviewer_launcher::infrastructure::process::TokioProcessLauncher;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(
//!         Arc::new(TokioProcessLauncher::new()),
//!         OrchestratorConfig::default(),
//!         stop_token(),
//!     );
//!     orchestrator.start_according_to_plan(&plan).await?;
//!     orchestrator.await_termination().await;
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{Orchestrator, OrchestratorConfig, RunPhase, ShutdownReport, TerminationReason};
pub use domain::errors::{PollError, ProbeError, SupervisorError};
pub use domain::models::{
    Config, LaunchSpec, OrchestrationPlan, ProcessSnapshot, ProcessState, Readiness,
    RunSelection, ServiceDescriptor,
};
pub use domain::ports::{ProcessHandle, ProcessLauncher, ReadinessProbe};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::StackBuilder;
