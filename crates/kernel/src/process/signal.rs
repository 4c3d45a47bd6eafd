//! Signal numbers, delivery, and per-process/global handler tables.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ProcessError;
use crate::process::pid::Pid;

/// Well-known signal numbers (a small subset of POSIX's).
pub mod signum {
    pub const SIGINT: i32 = 2;
    pub const SIGKILL: i32 = 9;
    pub const SIGTERM: i32 = 15;
    pub const SIGCHLD: i32 = 17;
    pub const SIGSTOP: i32 = 19;
    pub const SIGCONT: i32 = 18;
}

fn is_known_signal(sig: i32) -> bool {
    use signum::*;
    matches!(sig, SIGINT | SIGKILL | SIGTERM | SIGCHLD | SIGSTOP | SIGCONT)
}

/// What happens when a signal without a custom handler is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Terminate,
    Ignore,
    Stop,
    Continue,
}

fn default_action_for(sig: i32) -> DefaultAction {
    use signum::*;
    match sig {
        SIGKILL | SIGTERM | SIGINT => DefaultAction::Terminate,
        SIGCHLD => DefaultAction::Ignore,
        SIGSTOP => DefaultAction::Stop,
        SIGCONT => DefaultAction::Continue,
        _ => DefaultAction::Terminate,
    }
}

/// What a process has configured for a given signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Terminate,
    Ignore,
    Stop,
    Continue,
    Custom(HandlerId),
}

/// Opaque handle returned from [`SignalManager::register_handler`]. Handlers are
/// keyed by this ID, never by closure/pointer identity, so they can be
/// unregistered without requiring the original callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// A signal queued for delivery to a specific process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSignal {
    pub signal: i32,
    pub sender: Pid,
}

/// Manages the global blocked set, per-signal handler registrations, per-process
/// action overrides, and per-PID pending queues.
#[derive(Debug, Default)]
pub struct SignalManager {
    blocked: HashSet<i32>,
    handlers: HashMap<i32, Vec<HandlerId>>,
    next_handler_id: AtomicU64,
    process_actions: HashMap<Pid, HashMap<i32, Action>>,
    pending: HashMap<Pid, VecDeque<PendingSignal>>,
}

impl SignalManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(&mut self, signal: i32) {
        self.blocked.insert(signal);
    }

    pub fn unblock(&mut self, signal: i32) {
        self.blocked.remove(&signal);
    }

    pub fn is_blocked(&self, signal: i32) -> bool {
        self.blocked.contains(&signal)
    }

    /// Register a handler for `signal`, returning an opaque ID for later
    /// unregistration.
    pub fn register_handler(&mut self, signal: i32) -> HandlerId {
        let id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.entry(signal).or_default().push(id);
        id
    }

    pub fn unregister_handler(&mut self, signal: i32, id: HandlerId) {
        if let Some(list) = self.handlers.get_mut(&signal) {
            list.retain(|h| *h != id);
        }
    }

    pub fn set_action(&mut self, pid: Pid, signal: i32, action: Action) {
        self.process_actions.entry(pid).or_default().insert(signal, action);
    }

    fn resolve_action(&self, pid: Pid, signal: i32) -> Action {
        if let Some(actions) = self.process_actions.get(&pid) {
            if let Some(action) = actions.get(&signal) {
                return *action;
            }
        }
        match default_action_for(signal) {
            DefaultAction::Terminate => Action::Terminate,
            DefaultAction::Ignore => Action::Ignore,
            DefaultAction::Stop => Action::Stop,
            DefaultAction::Continue => Action::Continue,
        }
    }

    /// Enqueue `signal` for `pid`, unless the signal is globally blocked.
    pub fn send(&mut self, pid: Pid, signal: i32, sender: Pid) -> Result<(), ProcessError> {
        if !is_known_signal(signal) {
            return Err(ProcessError::InvalidSignal(signal));
        }
        if self.is_blocked(signal) {
            return Ok(());
        }
        self.pending
            .entry(pid)
            .or_default()
            .push_back(PendingSignal { signal, sender });
        Ok(())
    }

    /// Drain and resolve every pending signal for `pid`, returning the resolved
    /// action alongside each signal. Handlers registered for the signal are
    /// returned so the caller can invoke them; this module does not hold
    /// callables itself.
    pub fn deliver(&mut self, pid: Pid) -> Vec<(PendingSignal, Action, Vec<HandlerId>)> {
        let queue = self.pending.remove(&pid).unwrap_or_default();
        queue
            .into_iter()
            .map(|pending| {
                let action = self.resolve_action(pid, pending.signal);
                let handlers = self.handlers.get(&pending.signal).cloned().unwrap_or_default();
                (pending, action, handlers)
            })
            .collect()
    }

    pub fn pending_count(&self, pid: Pid) -> usize {
        self.pending.get(&pid).map(|q| q.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signum::*;

    #[test]
    fn blocked_signal_is_not_enqueued() {
        let mut m = SignalManager::new();
        m.block(SIGTERM);
        m.send(1, SIGTERM, 0).unwrap();
        assert_eq!(m.pending_count(1), 0);
    }

    #[test]
    fn unknown_signal_is_rejected() {
        let mut m = SignalManager::new();
        assert!(m.send(1, 999, 0).is_err());
    }

    #[test]
    fn delivery_drains_queue_and_resolves_default_action() {
        let mut m = SignalManager::new();
        m.send(1, SIGTERM, 0).unwrap();
        let delivered = m.deliver(1);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1, Action::Terminate);
        assert_eq!(m.pending_count(1), 0);
    }

    #[test]
    fn custom_action_overrides_default() {
        let mut m = SignalManager::new();
        let id = m.register_handler(SIGTERM);
        m.set_action(1, SIGTERM, Action::Custom(id));
        m.send(1, SIGTERM, 0).unwrap();
        let delivered = m.deliver(1);
        assert_eq!(delivered[0].1, Action::Custom(id));
        assert_eq!(delivered[0].2, vec![id]);
    }

    #[test]
    fn unregister_handler_removes_it_from_delivery() {
        let mut m = SignalManager::new();
        let id = m.register_handler(SIGCHLD);
        m.unregister_handler(SIGCHLD, id);
        m.send(1, SIGCHLD, 0).unwrap();
        let delivered = m.deliver(1);
        assert!(delivered[0].2.is_empty());
    }
}
