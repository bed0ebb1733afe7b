pub mod config;
pub mod descriptor;
pub mod plan;
pub mod process;
pub mod selection;

pub use config::{
    AdminConfig, ApiConfig, ClientConfig, CommentsConfig, Config, ContainerEngineConfig,
    LoggingConfig, MediaConfig, PaymentsConfig, ProjectConfig, StorageConfig, SupervisorConfig,
};
pub use descriptor::{LogProfile, Readiness, ServiceDescriptor, SetupStep};
pub use plan::{AutoStart, OrchestrationPlan, PlanGroup, ReadinessGate, Requirement};
pub use process::{LaunchSpec, ManagedProcess, ProcessSnapshot, ProcessState};
pub use selection::{Microservice, RunMode, RunSelection};
