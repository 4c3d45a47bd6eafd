//! Process table, lifecycle operations, and the asynchronous zombie reaper.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::error::ProcessError;
use crate::process::pid::{Pid, PidAllocator};
use crate::process::priority::{Priority, Scheduler};
use crate::process::process::Process;
use crate::process::resource::{ResourceEnforcer, ResourceLimits};
use crate::process::signal::SignalManager;
use crate::process::state::ProcessState;

/// Capacity of the reaper's work channel. `Terminate` never blocks on it: a
/// full channel is handled by the periodic sweep, per the concurrency model.
const REAP_CHANNEL_CAPACITY: usize = 256;

struct Inner {
    table: HashMap<Pid, Process>,
    scheduler: Scheduler,
    enforcer: ResourceEnforcer,
    signals: SignalManager,
    allocator: PidAllocator,
}

/// Owns the process table and drives creation, scheduling, termination, and
/// reaping. Cloneable: internally an `Arc<RwLock<..>>`, matching the
/// supervisor-handle pattern used elsewhere in this codebase for shared
/// background-task state.
#[derive(Clone)]
pub struct ProcessManager {
    inner: Arc<RwLock<Inner>>,
    reap_tx: mpsc::Sender<Pid>,
}

impl ProcessManager {
    /// Create a manager and spawn its background zombie reaper.
    pub fn new() -> Self {
        let (reap_tx, reap_rx) = mpsc::channel(REAP_CHANNEL_CAPACITY);
        let inner = Arc::new(RwLock::new(Inner {
            table: HashMap::new(),
            scheduler: Scheduler::new(),
            enforcer: ResourceEnforcer::new(),
            signals: SignalManager::new(),
            allocator: PidAllocator::new(),
        }));

        let manager = Self { inner, reap_tx };
        manager.spawn_reaper(reap_rx);
        manager
    }

    fn spawn_reaper(&self, mut reap_rx: mpsc::Receiver<Pid>) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(pid) = reap_rx.recv().await {
                reap_one(&inner, pid).await;
            }
        });
    }

    /// Periodic sweep backstop: reap any zombie missed because the channel
    /// was full when `terminate` tried to enqueue it. Intended to be driven
    /// by an external interval timer.
    pub async fn sweep_zombies(&self) {
        let zombie_pids: Vec<Pid> = {
            let guard = self.inner.read().await;
            guard
                .table
                .values()
                .filter(|p| p.is_zombie())
                .map(|p| p.pid)
                .collect()
        };
        for pid in zombie_pids {
            reap_one(&self.inner, pid).await;
        }
    }

    pub async fn create(
        &self,
        ppid: Pid,
        command: impl Into<String>,
        priority: Priority,
        limits: ResourceLimits,
    ) -> Pid {
        let mut guard = self.inner.write().await;
        let pid = guard.allocator.allocate();
        let mut process = Process::new(pid, ppid, command, priority);
        process.limits = limits;
        guard.enforcer.register(pid, limits);
        if let Some(parent) = guard.table.get_mut(&ppid) {
            parent.children.push(pid);
        }
        guard.table.insert(pid, process);
        debug!(pid, ppid, "process created");
        pid
    }

    pub async fn get(&self, pid: Pid) -> Option<Process> {
        self.inner.read().await.table.get(&pid).cloned()
    }

    pub async fn list_children(&self, pid: Pid) -> Vec<Pid> {
        self.inner
            .read()
            .await
            .table
            .get(&pid)
            .map(|p| p.children.clone())
            .unwrap_or_default()
    }

    async fn transition(&self, pid: Pid, to: ProcessState) -> Result<(), ProcessError> {
        let mut guard = self.inner.write().await;
        let process = guard
            .table
            .get_mut(&pid)
            .ok_or(ProcessError::NotFound(pid))?;
        process.state.transition_to(to)?;
        match to {
            ProcessState::Running if process.started_at.is_none() => {
                process.started_at = Some(Utc::now());
            }
            _ => {}
        }
        let (priority, state) = (process.priority, process.state);
        guard.scheduler.schedule(pid, priority, state);
        Ok(())
    }

    pub async fn start(&self, pid: Pid) -> Result<(), ProcessError> {
        self.transition(pid, ProcessState::Running).await
    }

    pub async fn yield_now(&self, pid: Pid) -> Result<(), ProcessError> {
        self.transition(pid, ProcessState::Ready).await
    }

    pub async fn block(&self, pid: Pid) -> Result<(), ProcessError> {
        self.transition(pid, ProcessState::Waiting).await
    }

    pub async fn wake(&self, pid: Pid) -> Result<(), ProcessError> {
        self.transition(pid, ProcessState::Ready).await
    }

    pub async fn stop(&self, pid: Pid) -> Result<(), ProcessError> {
        self.transition(pid, ProcessState::Stopped).await
    }

    pub async fn cont(&self, pid: Pid) -> Result<(), ProcessError> {
        let current = self
            .inner
            .read()
            .await
            .table
            .get(&pid)
            .map(|p| p.state)
            .ok_or(ProcessError::NotFound(pid))?;
        let _ = current;
        self.transition(pid, ProcessState::Running).await
    }

    /// Terminate a process: transitions it to Zombie, records the exit code,
    /// signals a synthesized child-termination signal to the parent, then
    /// queues it for reaping. A full reap channel is not an error; the
    /// process stays a zombie until the next sweep.
    pub async fn terminate(&self, pid: Pid, exit_code: i32) -> Result<(), ProcessError> {
        {
            let mut guard = self.inner.write().await;
            let process = guard
                .table
                .get_mut(&pid)
                .ok_or(ProcessError::NotFound(pid))?;
            process.state.transition_to(ProcessState::Zombie)?;
            process.exit_code = Some(exit_code);
            process.finished_at = Some(Utc::now());
            guard.scheduler.remove(pid);
            let ppid = process.ppid;
            if ppid != 0 {
                let _ = guard
                    .signals
                    .send(ppid, crate::process::signal::signum::SIGCHLD, pid);
            }
        }
        info!(pid, exit_code, "process terminated");
        if self.reap_tx.try_send(pid).is_err() {
            warn!(pid, "reap channel full, deferring to periodic sweep");
        }
        Ok(())
    }

    pub async fn get_next_runnable(&self) -> Option<Pid> {
        self.inner.write().await.scheduler.get_next_runnable()
    }

    pub async fn send_signal(&self, pid: Pid, signal: i32, sender: Pid) -> Result<(), ProcessError> {
        self.inner.write().await.signals.send(pid, signal, sender)
    }

    pub async fn check_resources(&self, pid: Pid) -> Result<(), ProcessError> {
        self.inner.read().await.enforcer.check_all(pid)
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn reap_one(inner: &Arc<RwLock<Inner>>, pid: Pid) {
    let mut guard = inner.write().await;
    let Some(process) = guard.table.get(&pid) else {
        return;
    };
    if !process.is_zombie() {
        return;
    }
    let ppid = process.ppid;
    guard.table.remove(&pid);
    guard.enforcer.unregister(pid);
    if let Some(parent) = guard.table.get_mut(&ppid) {
        parent.children.retain(|&c| c != pid);
    }
    debug!(pid, "zombie reaped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_lifecycle_matches_scenario_1() {
        let manager = ProcessManager::new();
        let pid = manager
            .create(0, "demo", Priority::Normal, ResourceLimits::default())
            .await;
        assert_eq!(pid, 1);

        let process = manager.get(pid).await.unwrap();
        assert_eq!(process.state, ProcessState::Ready);

        manager.start(pid).await.unwrap();
        assert_eq!(manager.get(pid).await.unwrap().state, ProcessState::Running);

        manager.yield_now(pid).await.unwrap();
        assert_eq!(manager.get(pid).await.unwrap().state, ProcessState::Ready);

        manager.start(pid).await.unwrap();
        manager.terminate(pid, 0).await.unwrap();

        let process = manager.get(pid).await.unwrap();
        assert_eq!(process.state, ProcessState::Zombie);
        assert_eq!(process.exit_code, Some(0));

        // allow the background reaper to run
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(manager.get(pid).await.is_none());
    }

    #[tokio::test]
    async fn terminate_notifies_parent_via_sigchld() {
        let manager = ProcessManager::new();
        let parent = manager
            .create(0, "parent", Priority::Normal, ResourceLimits::default())
            .await;
        let child = manager
            .create(parent, "child", Priority::Normal, ResourceLimits::default())
            .await;
        manager.start(child).await.unwrap();
        manager.terminate(child, 1).await.unwrap();

        let pending = manager.inner.read().await.signals.pending_count(parent);
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn sweep_reaps_missed_zombies() {
        let manager = ProcessManager::new();
        let pid = manager
            .create(0, "demo", Priority::Normal, ResourceLimits::default())
            .await;
        manager.start(pid).await.unwrap();
        manager.terminate(pid, 0).await.unwrap();
        manager.sweep_zombies().await;
        assert!(manager.get(pid).await.is_none());
    }
}
