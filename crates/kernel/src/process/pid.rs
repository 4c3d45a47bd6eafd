//! PID type and monotonic allocator.

use std::sync::atomic::{AtomicU32, Ordering};

/// A process identifier. Always greater than zero for a real process; 0 denotes
/// "no parent" (the root of the process tree).
pub type Pid = u32;

/// Monotonically increasing PID allocator. Wraps around after `u32::MAX`, skipping 0.
#[derive(Debug)]
pub struct PidAllocator {
    next: AtomicU32,
}

impl PidAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Allocate the next PID.
    pub fn allocate(&self) -> Pid {
        loop {
            let pid = self.next.fetch_add(1, Ordering::Relaxed);
            if pid != 0 {
                return pid;
            }
            // wrapped past u32::MAX onto 0, which is reserved; retry
        }
    }
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new()
    }
}
