//! Startup: requirements, gates, then each plan group in order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tracing::{error, info, warn};

use crate::domain::errors::{PollError, ProbeError, SupervisorError};
use crate::domain::ports::ReadinessProbe;
use crate::domain::models::{
    ManagedProcess, OrchestrationPlan, PlanGroup, ProcessState, Readiness, ReadinessGate,
    ServiceDescriptor, SetupStep,
};
use crate::services::{
    CommandProbe, LogClassifier, LogMonitor, ReadinessPoller, RequirementChecker,
};

use super::{advance, Orchestrator, RunPhase};

fn readiness_failure(service: &str, err: PollError) -> SupervisorError {
    match err {
        PollError::TimedOut { elapsed, .. } => SupervisorError::ReadinessTimeout {
            service: service.to_string(),
            waited: elapsed,
        },
        PollError::Aborted { reason, .. } => SupervisorError::Spawn {
            service: service.to_string(),
            reason,
        },
        PollError::Cancelled => SupervisorError::Cancelled,
    }
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit code {c}"))
}

impl Orchestrator {
    /// Bring the plan up group by group.
    ///
    /// Any failure (missing tool, spawn error, readiness timeout, stop
    /// request) shuts down everything started so far before the error is
    /// returned. Nothing is retried.
    pub async fn start_according_to_plan(
        &self,
        plan: &OrchestrationPlan,
    ) -> Result<(), SupervisorError> {
        info!(run_id = %self.run_id, groups = plan.groups().len(), "starting stack");

        let result = self.drive(self.run_plan(plan)).await;
        match result {
            Ok(()) => {
                self.set_phase(RunPhase::Running);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "startup failed, stopping everything already started");
                self.shutdown().await;
                Err(err)
            }
        }
    }

    async fn run_plan(&self, plan: &OrchestrationPlan) -> Result<(), SupervisorError> {
        plan.validate()?;

        self.set_phase(RunPhase::CheckingRequirements);
        RequirementChecker::new(Arc::clone(&self.launcher), self.config.requirement_timeout)
            .ensure(plan.requirements())
            .await?;
        self.ensure_not_stopping()?;

        self.set_phase(RunPhase::StartingDependencies);
        for gate in plan.gates() {
            self.pass_gate(gate).await?;
        }

        for group in plan.groups() {
            self.start_group(group).await?;
        }
        Ok(())
    }

    fn ensure_not_stopping(&self) -> Result<(), SupervisorError> {
        if self.is_stopping() {
            return Err(SupervisorError::Cancelled);
        }
        Ok(())
    }

    /// Wait for an external precondition, auto-starting it once if configured.
    async fn pass_gate(&self, gate: &ReadinessGate) -> Result<(), SupervisorError> {
        let probe = CommandProbe::new(Arc::clone(&self.launcher), gate.check.clone(), gate.check_timeout);
        info!(gate = %gate.name, check = %gate.check.command_line(), "checking");

        let first = ReadinessPoller::new(gate.max_attempts, gate.interval)
            .poll_probe(&probe, &self.cancel)
            .await;
        let err = match first {
            Ok(_) => {
                info!(gate = %gate.name, "available");
                return Ok(());
            }
            Err(err) => err,
        };

        let Some(autostart) = &gate.autostart else {
            return Err(readiness_failure(&gate.name, err));
        };

        warn!(gate = %gate.name, command = %autostart.launch.command_line(), "not available, attempting to start it");
        match self.launcher.run(&autostart.launch, gate.check_timeout).await {
            Ok(output) if !output.success() => {
                warn!(gate = %gate.name, stderr = %output.stderr.trim(), "auto-start command failed");
            }
            Ok(_) => {}
            Err(e) => warn!(gate = %gate.name, error = %e, "auto-start command failed"),
        }

        ReadinessPoller::new(autostart.max_attempts, gate.interval)
            .poll_probe(&probe, &self.cancel)
            .await
            .map_err(|err| readiness_failure(&gate.name, err))?;
        info!(gate = %gate.name, "available after auto-start");
        Ok(())
    }

    async fn start_group(&self, group: &PlanGroup) -> Result<(), SupervisorError> {
        self.ensure_not_stopping()?;
        info!(group = %group.name, members = group.members.len(), "starting group");

        for member in &group.members {
            self.ensure_dependencies_ready(member).await?;
        }

        try_join_all(group.members.iter().map(|d| self.launch(d))).await?;
        try_join_all(group.members.iter().map(|d| self.await_ready(d))).await?;

        info!(group = %group.name, "group ready");
        Ok(())
    }

    async fn ensure_dependencies_ready(&self, descriptor: &ServiceDescriptor) -> Result<(), SupervisorError> {
        for dependency in &descriptor.depends_on {
            let ready = self
                .registry
                .state_of(dependency)
                .await
                .is_some_and(|state| state.is_ready());
            if !ready {
                return Err(SupervisorError::DependencyNotReady {
                    service: descriptor.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run setup steps, spawn the process, register it, and attach its log monitor.
    async fn launch(&self, descriptor: &ServiceDescriptor) -> Result<(), SupervisorError> {
        let name = descriptor.name.as_str();
        for step in &descriptor.setup {
            self.run_setup(name, step).await?;
        }
        self.ensure_not_stopping()?;

        let mut handle = self.launcher.spawn(name, &descriptor.launch).await?;

        let monitor_token = self.cancel.child_token();
        let output = handle.take_output();
        let process = ManagedProcess::new(name, descriptor.launch.clone(), handle, monitor_token.clone());

        if matches!(descriptor.readiness, Readiness::LogSignal { .. }) {
            if let Ok(mut log_ready) = self.log_readiness.lock() {
                log_ready.insert(name.to_string());
            }
        }
        let snapshot = self.registry.register(process).await?;
        info!(service = name, pid = ?snapshot.pid, port = ?descriptor.port, "launched");

        if let Some(output) = output {
            let classifier = LogClassifier::for_phrases(
                &descriptor.log.ready_phrases,
                &descriptor.log.highlight_phrases,
            );
            let monitor = LogMonitor::new(name, classifier, self.events_tx.clone(), monitor_token);
            self.monitors.spawn(monitor.run(output));
        }

        // A stop request may have raced with the spawn; let the caller unwind.
        self.ensure_not_stopping()
    }

    async fn run_setup(&self, service: &str, step: &SetupStep) -> Result<(), SupervisorError> {
        let command = step.launch.command_line();
        info!(service, %command, "running setup step");

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(SupervisorError::Cancelled),
            result = self.launcher.run(&step.launch, step.timeout) => result,
        };
        let output = result.map_err(|e| SupervisorError::Spawn {
            service: service.to_string(),
            reason: e.to_string(),
        })?;

        if !output.success() {
            return Err(SupervisorError::Spawn {
                service: service.to_string(),
                reason: format!(
                    "`{command}` failed ({}): {}",
                    describe_exit(output.exit.code),
                    output.stderr.trim()
                ),
            });
        }
        Ok(())
    }

    /// Wait for `descriptor` to become ready using its declared mechanism.
    async fn await_ready(&self, descriptor: &ServiceDescriptor) -> Result<(), SupervisorError> {
        let name = descriptor.name.as_str();
        let outcome = match &descriptor.readiness {
            Readiness::Probe {
                check,
                check_timeout,
                max_attempts,
                interval,
            } => {
                let probe = CommandProbe::new(Arc::clone(&self.launcher), check.clone(), *check_timeout);
                let probe = &probe;
                ReadinessPoller::new(*max_attempts, *interval)
                    .poll(
                        move || async move {
                            self.check_alive(name).await?;
                            probe.check().await
                        },
                        &self.cancel,
                    )
                    .await
                    .map(drop)
            }
            Readiness::LogSignal { timeout } => {
                let interval = self.config.readiness_check_interval;
                ReadinessPoller::new(ReadinessPoller::attempts_for(*timeout, interval), interval)
                    .poll(move || self.ready_by_log(name), &self.cancel)
                    .await
                    .map(drop)
            }
            Readiness::GracePeriod(delay) => self.wait_grace_period(name, *delay).await,
        };

        match outcome {
            Ok(()) => {
                self.mark_ready(name).await;
                Ok(())
            }
            Err(err) => {
                let err = readiness_failure(name, err);
                self.mark_failed(name).await;
                Err(err)
            }
        }
    }

    async fn wait_grace_period(&self, name: &str, delay: Duration) -> Result<(), PollError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(PollError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
        self.check_alive(name)
            .await
            .map_err(|e| PollError::Aborted {
                attempts: 1,
                reason: match e {
                    ProbeError::Transient(reason) | ProbeError::Fatal(reason) => reason,
                },
            })
    }

    /// Fatal probe error once the process has exited.
    async fn check_alive(&self, name: &str) -> Result<(), ProbeError> {
        let mut entries = self.registry.lock().await;
        let Some(process) = entries.get_mut(name) else {
            return Err(ProbeError::Fatal(format!("{name} is not registered")));
        };
        match process.poll_exit() {
            Ok(None) => Ok(()),
            Ok(Some(exit)) => Err(ProbeError::Fatal(format!(
                "process exited before becoming ready ({})",
                describe_exit(exit.code)
            ))),
            Err(e) => Err(ProbeError::Transient(e.to_string())),
        }
    }

    async fn ready_by_log(&self, name: &str) -> Result<bool, ProbeError> {
        if self
            .registry
            .state_of(name)
            .await
            .is_some_and(|state| state.is_ready())
        {
            return Ok(true);
        }
        self.check_alive(name).await.map(|()| false)
    }

    async fn mark_ready(&self, name: &str) {
        let mut entries = self.registry.lock().await;
        if let Some(process) = entries.get_mut(name) {
            if process.state() == ProcessState::Spawned {
                advance(process, ProcessState::Ready);
            }
        }
    }

    async fn mark_failed(&self, name: &str) {
        let mut entries = self.registry.lock().await;
        if let Some(process) = entries.get_mut(name) {
            if process.state().is_live() {
                advance(process, ProcessState::Failed);
            }
        }
    }
}
