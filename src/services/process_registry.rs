//! Registry of supervised processes.
//!
//! All access goes through one async mutex. Entries keep their registration
//! order so shutdown can walk them in reverse. Once closed, the registry
//! refuses new entries.

use std::collections::HashMap;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::domain::errors::SupervisorError;
use crate::domain::models::{ManagedProcess, ProcessSnapshot, ProcessState};

/// Entries guarded by the registry lock.
#[derive(Debug, Default)]
pub struct RegistryEntries {
    processes: HashMap<String, ManagedProcess>,
    order: Vec<String>,
    closed: bool,
}

impl RegistryEntries {
    /// The process registered as `name`.
    pub fn get(&self, name: &str) -> Option<&ManagedProcess> {
        self.processes.get(name)
    }

    /// Mutable access to the process registered as `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ManagedProcess> {
        self.processes.get_mut(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Number of registered processes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Transition under an already-held lock.
    pub fn transition(&mut self, name: &str, next: ProcessState) -> Result<ProcessState, SupervisorError> {
        let process = self
            .processes
            .get_mut(name)
            .ok_or_else(|| SupervisorError::ProcessNotFound(name.to_string()))?;
        let previous = process.transition(next)?;
        info!(service = %name, from = %previous, to = %next, pid = ?process.pid(), "state changed");
        Ok(previous)
    }
}

/// Name-keyed store of every process under supervision.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    inner: Mutex<RegistryEntries>,
}

impl ProcessRegistry {
    /// An empty, open registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the registry lock for compound operations.
    pub async fn lock(&self) -> MutexGuard<'_, RegistryEntries> {
        self.inner.lock().await
    }

    /// Add a process. Fails if its name is already registered.
    ///
    /// A closed registry kills the offered process instead of keeping it, so
    /// nothing spawned after shutdown began outlives the run.
    pub async fn register(&self, mut process: ManagedProcess) -> Result<ProcessSnapshot, SupervisorError> {
        let mut entries = self.inner.lock().await;
        let name = process.name().to_string();
        if entries.closed {
            warn!(service = %name, pid = ?process.pid(), "registry closed, killing late process");
            if let Err(e) = process.handle_mut().kill() {
                warn!(service = %name, error = %e, "kill failed");
            }
            process.stop_monitor();
            return Err(SupervisorError::RegistryClosed(name));
        }
        if entries.processes.contains_key(&name) {
            return Err(SupervisorError::DuplicateProcess(name));
        }
        let snapshot = process.snapshot();
        debug!(service = %name, pid = ?snapshot.pid, "registered");
        entries.order.push(name.clone());
        entries.processes.insert(name, process);
        Ok(snapshot)
    }

    /// Snapshot of one process.
    pub async fn lookup(&self, name: &str) -> Option<ProcessSnapshot> {
        self.inner.lock().await.get(name).map(ManagedProcess::snapshot)
    }

    /// Current state of one process.
    pub async fn state_of(&self, name: &str) -> Option<ProcessState> {
        self.inner.lock().await.get(name).map(ManagedProcess::state)
    }

    /// Snapshots of every entry, in registration order.
    pub async fn list(&self) -> Vec<ProcessSnapshot> {
        let entries = self.inner.lock().await;
        entries
            .order
            .iter()
            .filter_map(|name| entries.processes.get(name))
            .map(ManagedProcess::snapshot)
            .collect()
    }

    /// Take a process out of the registry.
    pub async fn remove(&self, name: &str) -> Option<ManagedProcess> {
        let mut entries = self.inner.lock().await;
        let process = entries.processes.remove(name)?;
        entries.order.retain(|n| n != name);
        debug!(service = %name, "removed from registry");
        Some(process)
    }

    /// Move one process to `next`, returning its previous state.
    pub async fn transition(
        &self,
        name: &str,
        next: ProcessState,
    ) -> Result<ProcessState, SupervisorError> {
        self.inner.lock().await.transition(name, next)
    }

    /// Names in registration order.
    pub async fn names_in_start_order(&self) -> Vec<String> {
        self.inner.lock().await.order.clone()
    }

    /// Number of registered processes.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether nothing is registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Processes still believed to be running.
    pub async fn live_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .processes
            .values()
            .filter(|p| p.state().is_live())
            .count()
    }

    /// Names of processes that ended without a zero exit code.
    pub async fn unclean_exits(&self) -> Vec<String> {
        let entries = self.inner.lock().await;
        entries
            .order
            .iter()
            .filter(|name| {
                entries
                    .processes
                    .get(name.as_str())
                    .is_some_and(|p| !p.exit().is_some_and(|exit| exit.success()))
            })
            .cloned()
            .collect()
    }

    /// Refuse further registrations.
    pub async fn close(&self) {
        self.inner.lock().await.closed = true;
    }

    /// Drop every stopped entry, returning how many were removed.
    ///
    /// Entries not yet confirmed stopped stay registered.
    pub async fn clear(&self) -> usize {
        let mut entries = self.inner.lock().await;
        let RegistryEntries { processes, order, .. } = &mut *entries;
        let before = order.len();
        order.retain(|name| !processes.get(name).is_some_and(|p| p.state().is_terminal()));
        processes.retain(|_, p| !p.state().is_terminal());
        before - order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::domain::models::LaunchSpec;
    use crate::domain::ports::{OutputStream, ProcessExit, ProcessHandle};

    struct IdleHandle(u32);

    #[async_trait]
    impl ProcessHandle for IdleHandle {
        fn pid(&self) -> Option<u32> {
            Some(self.0)
        }
        fn take_output(&mut self) -> Option<OutputStream> {
            None
        }
        fn try_wait(&mut self) -> std::io::Result<Option<ProcessExit>> {
            Ok(None)
        }
        fn terminate(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        fn kill(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        async fn wait(&mut self) -> std::io::Result<ProcessExit> {
            Ok(ProcessExit::with_code(0))
        }
    }

    struct KillRecorder(Arc<std::sync::atomic::AtomicBool>);

    #[async_trait]
    impl ProcessHandle for KillRecorder {
        fn pid(&self) -> Option<u32> {
            Some(99)
        }
        fn take_output(&mut self) -> Option<OutputStream> {
            None
        }
        fn try_wait(&mut self) -> std::io::Result<Option<ProcessExit>> {
            Ok(None)
        }
        fn terminate(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        fn kill(&mut self) -> std::io::Result<()> {
            self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
        async fn wait(&mut self) -> std::io::Result<ProcessExit> {
            Ok(ProcessExit::with_signal(9))
        }
    }

    fn process(name: &str, pid: u32) -> ManagedProcess {
        ManagedProcess::new(
            name,
            LaunchSpec::new("true"),
            Box::new(IdleHandle(pid)),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = ProcessRegistry::new();
        registry.register(process("primary-api", 1)).await.unwrap();

        let err = registry.register(process("primary-api", 2)).await.unwrap_err();
        assert!(matches!(err, SupervisorError::DuplicateProcess(ref n) if n == "primary-api"));

        // The original entry is untouched.
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.lookup("primary-api").await.unwrap().pid, Some(1));
    }

    #[tokio::test]
    async fn test_list_keeps_registration_order() {
        let registry = ProcessRegistry::new();
        for (i, name) in ["storage", "primary-api", "client"].iter().enumerate() {
            registry.register(process(name, i as u32)).await.unwrap();
        }
        let names: Vec<_> = registry.list().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["storage", "primary-api", "client"]);

        registry.remove("primary-api").await.unwrap();
        assert_eq!(registry.names_in_start_order().await, vec!["storage", "client"]);
        assert!(registry.remove("primary-api").await.is_none());
    }

    #[tokio::test]
    async fn test_transitions_are_validated() {
        let registry = ProcessRegistry::new();
        registry.register(process("storage", 1)).await.unwrap();

        assert_eq!(
            registry.transition("storage", ProcessState::Ready).await.unwrap(),
            ProcessState::Spawned
        );
        assert_eq!(registry.live_count().await, 1);

        registry.transition("storage", ProcessState::Stopping).await.unwrap();
        registry.transition("storage", ProcessState::Stopped).await.unwrap();
        assert_eq!(registry.live_count().await, 0);

        let err = registry
            .transition("storage", ProcessState::Running)
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidStateTransition { .. }));

        let err = registry.transition("ghost", ProcessState::Ready).await.unwrap_err();
        assert!(matches!(err, SupervisorError::ProcessNotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_registration_loses_nothing() {
        let registry = Arc::new(ProcessRegistry::new());
        let mut tasks = Vec::new();
        for i in 0..32u32 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.register(process(&format!("svc-{i}"), i)).await.unwrap();
                if i % 2 == 0 {
                    registry.remove(&format!("svc-{i}")).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(registry.len().await, 16);
    }

    #[tokio::test]
    async fn test_closed_registry_kills_late_registration() {
        let registry = ProcessRegistry::new();
        registry.register(process("storage", 1)).await.unwrap();
        registry.close().await;

        let killed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let late = ManagedProcess::new(
            "client",
            LaunchSpec::new("flutter"),
            Box::new(KillRecorder(Arc::clone(&killed))),
            CancellationToken::new(),
        );
        let err = registry.register(late).await.unwrap_err();

        assert!(matches!(err, SupervisorError::RegistryClosed(ref n) if n == "client"));
        assert!(killed.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(registry.names_in_start_order().await, vec!["storage"]);
    }

    #[tokio::test]
    async fn test_clear_keeps_entries_not_yet_stopped() {
        let registry = ProcessRegistry::new();
        registry.register(process("storage", 1)).await.unwrap();
        registry.register(process("primary-api", 2)).await.unwrap();
        registry.transition("storage", ProcessState::Stopping).await.unwrap();
        registry.transition("storage", ProcessState::Stopped).await.unwrap();

        assert_eq!(registry.clear().await, 1);
        assert_eq!(registry.names_in_start_order().await, vec!["primary-api"]);
    }

    #[tokio::test]
    async fn test_unclean_exits_ignore_zero_exit_codes() {
        let registry = ProcessRegistry::new();
        let mut clean = process("client", 1);
        clean.record_exit(ProcessExit::with_code(0));
        let mut crashed = process("media-service", 2);
        crashed.record_exit(ProcessExit::with_code(2));
        registry.register(clean).await.unwrap();
        registry.register(crashed).await.unwrap();

        assert_eq!(registry.unclean_exits().await, vec!["media-service"]);
    }
}
