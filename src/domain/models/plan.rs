//! Orchestration plan: ordered groups of service descriptors.
//!
//! Members of a group start together; a group starts only after every
//! earlier group is ready. Dependencies may only point at earlier groups.

use std::collections::HashSet;
use std::time::Duration;

use super::descriptor::ServiceDescriptor;
use super::process::LaunchSpec;
use crate::domain::errors::SupervisorError;

/// An external tool that must be invocable before anything starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub program: String,
    pub label: String,
    /// Arguments of the version/info probe.
    pub probe_args: Vec<String>,
}

impl Requirement {
    /// Requirement probed with `--version`.
    pub fn new(program: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            label: label.into(),
            probe_args: vec!["--version".to_string()],
        }
    }

    #[must_use]
    pub fn with_probe_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.probe_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn probe_spec(&self) -> LaunchSpec {
        LaunchSpec::new(&self.program).args(self.probe_args.iter().cloned())
    }
}

/// Command spawned once when a gate's first poll fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoStart {
    pub launch: LaunchSpec,
    /// Attempts of the second poll, after the auto-start command ran.
    pub max_attempts: u32,
}

/// A host condition polled before the first group starts (e.g. a container engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessGate {
    pub name: String,
    pub check: LaunchSpec,
    pub check_timeout: Duration,
    pub max_attempts: u32,
    pub interval: Duration,
    pub autostart: Option<AutoStart>,
}

/// A named set of descriptors without ordering among themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanGroup {
    pub name: String,
    pub members: Vec<ServiceDescriptor>,
}

/// Ordered startup plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationPlan {
    groups: Vec<PlanGroup>,
    requirements: Vec<Requirement>,
    gates: Vec<ReadinessGate>,
}

impl OrchestrationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group. Empty groups are skipped.
    #[must_use]
    pub fn group(mut self, name: impl Into<String>, members: Vec<ServiceDescriptor>) -> Self {
        if !members.is_empty() {
            self.groups.push(PlanGroup {
                name: name.into(),
                members,
            });
        }
        self
    }

    #[must_use]
    pub fn requirement(mut self, requirement: Requirement) -> Self {
        if !self.requirements.contains(&requirement) {
            self.requirements.push(requirement);
        }
        self
    }

    #[must_use]
    pub fn gate(mut self, gate: ReadinessGate) -> Self {
        self.gates.push(gate);
        self
    }

    pub fn groups(&self) -> &[PlanGroup] {
        &self.groups
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn gates(&self) -> &[ReadinessGate] {
        &self.gates
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.groups.iter().flat_map(|g| g.members.iter())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.descriptors().any(|d| d.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Check that names are unique and every dependency lives in an earlier group.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        let mut earlier: HashSet<&str> = HashSet::new();

        for group in &self.groups {
            let mut current: HashSet<&str> = HashSet::new();

            for member in &group.members {
                if member.name.trim().is_empty() {
                    return Err(SupervisorError::InvalidPlan(format!(
                        "group '{}' contains a service without a name",
                        group.name
                    )));
                }
                if earlier.contains(member.name.as_str()) || !current.insert(&member.name) {
                    return Err(SupervisorError::InvalidPlan(format!(
                        "service '{}' is declared more than once",
                        member.name
                    )));
                }
            }

            for member in &group.members {
                for dep in &member.depends_on {
                    if current.contains(dep.as_str()) {
                        return Err(SupervisorError::InvalidPlan(format!(
                            "'{}' depends on '{}' from the same group '{}'",
                            member.name, dep, group.name
                        )));
                    }
                    if !earlier.contains(dep.as_str()) {
                        return Err(SupervisorError::InvalidPlan(format!(
                            "'{}' depends on '{}', which is not started by an earlier group",
                            member.name, dep
                        )));
                    }
                }
            }

            earlier.extend(current);
        }

        Ok(())
    }
}
