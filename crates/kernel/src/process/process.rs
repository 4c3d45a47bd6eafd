//! The process entity: identity, command line, environment, and bookkeeping.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::process::pid::Pid;
use crate::process::priority::Priority;
use crate::process::resource::{ResourceLimits, ResourceUsage};
use crate::process::state::ProcessState;

/// A small-integer file descriptor, as seen by a simulated process.
pub type Fd = i32;

/// A simulated process. Owned by the [`super::manager::ProcessManager`] for its
/// whole lifetime; file handles are opaque strings here (the kernel does not
/// model a real filesystem).
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub ppid: Pid,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    pub priority: Priority,
    pub state: ProcessState,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub usage: ResourceUsage,
    pub limits: ResourceLimits,
    pub fds: HashMap<Fd, String>,
    pub signal_mask: Vec<i32>,
    pub children: Vec<Pid>,
}

impl Process {
    pub fn new(pid: Pid, ppid: Pid, command: impl Into<String>, priority: Priority) -> Self {
        Self {
            pid,
            ppid,
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: "/".to_string(),
            priority,
            state: ProcessState::Ready,
            exit_code: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            usage: ResourceUsage::default(),
            limits: ResourceLimits::default(),
            fds: HashMap::new(),
            signal_mask: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_zombie(&self) -> bool {
        self.state == ProcessState::Zombie
    }
}
