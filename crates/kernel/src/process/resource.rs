//! Per-process resource limits and usage tracking.

use std::collections::HashMap;

use crate::error::{ProcessError, ResourceKind};
use crate::process::pid::Pid;

/// Limits in effect for a process. A value of 0 means "no limit".
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceLimits {
    pub cpu_ms: u64,
    pub memory_bytes: u64,
    pub files: u64,
    pub stack_bytes: u64,
    pub data_segment_bytes: u64,
    pub core_dump_bytes: u64,
    pub rss_bytes: u64,
}

/// Current usage tracked against [`ResourceLimits`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceUsage {
    pub cpu_ms: u64,
    pub memory_bytes: u64,
    pub files: u64,
    pub stack_bytes: u64,
    pub data_segment_bytes: u64,
    pub core_dump_bytes: u64,
    pub rss_bytes: u64,
}

struct Entry {
    limits: ResourceLimits,
    usage: ResourceUsage,
}

fn check_limit(kind: ResourceKind, usage: u64, limit: u64) -> Result<(), ProcessError> {
    if limit != 0 && usage >= limit {
        Err(ProcessError::LimitExceeded { kind, limit, usage })
    } else {
        Ok(())
    }
}

/// Tracks resource limits and usage for every known PID, applying updates
/// atomically and rejecting whichever one would cross its limit.
#[derive(Default)]
pub struct ResourceEnforcer {
    entries: HashMap<Pid, Entry>,
}

impl ResourceEnforcer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pid: Pid, limits: ResourceLimits) {
        self.entries.insert(
            pid,
            Entry {
                limits,
                usage: ResourceUsage::default(),
            },
        );
    }

    pub fn unregister(&mut self, pid: Pid) {
        self.entries.remove(&pid);
    }

    pub fn usage(&self, pid: Pid) -> Option<ResourceUsage> {
        self.entries.get(&pid).map(|e| e.usage)
    }

    pub fn limits(&self, pid: Pid) -> Option<ResourceLimits> {
        self.entries.get(&pid).map(|e| e.limits)
    }

    /// Replace the limits for `pid` without checking them against current
    /// usage (e.g. an operator tightening an already-running process's
    /// limits). A subsequent [`Self::check_all`] will surface the violation.
    pub fn set_limits(&mut self, pid: Pid, limits: ResourceLimits) -> Result<(), ProcessError> {
        self.entry_mut(pid)?.limits = limits;
        Ok(())
    }

    fn entry_mut(&mut self, pid: Pid) -> Result<&mut Entry, ProcessError> {
        self.entries.get_mut(&pid).ok_or(ProcessError::NotFound(pid))
    }

    pub fn add_cpu(&mut self, pid: Pid, delta_ms: u64) -> Result<(), ProcessError> {
        let entry = self.entry_mut(pid)?;
        let new_usage = entry.usage.cpu_ms + delta_ms;
        check_limit(ResourceKind::Cpu, new_usage, entry.limits.cpu_ms)?;
        entry.usage.cpu_ms = new_usage;
        Ok(())
    }

    pub fn update_memory(&mut self, pid: Pid, bytes: u64) -> Result<(), ProcessError> {
        let entry = self.entry_mut(pid)?;
        check_limit(ResourceKind::Memory, bytes, entry.limits.memory_bytes)?;
        entry.usage.memory_bytes = bytes;
        Ok(())
    }

    pub fn add_file(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let entry = self.entry_mut(pid)?;
        let new_usage = entry.usage.files + 1;
        check_limit(ResourceKind::Files, new_usage, entry.limits.files)?;
        entry.usage.files = new_usage;
        Ok(())
    }

    pub fn remove_file(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let entry = self.entry_mut(pid)?;
        entry.usage.files = entry.usage.files.saturating_sub(1);
        Ok(())
    }

    pub fn update_stack(&mut self, pid: Pid, bytes: u64) -> Result<(), ProcessError> {
        let entry = self.entry_mut(pid)?;
        check_limit(ResourceKind::Stack, bytes, entry.limits.stack_bytes)?;
        entry.usage.stack_bytes = bytes;
        Ok(())
    }

    pub fn update_data_segment(&mut self, pid: Pid, bytes: u64) -> Result<(), ProcessError> {
        let entry = self.entry_mut(pid)?;
        check_limit(ResourceKind::DataSegment, bytes, entry.limits.data_segment_bytes)?;
        entry.usage.data_segment_bytes = bytes;
        Ok(())
    }

    pub fn update_core_dump(&mut self, pid: Pid, bytes: u64) -> Result<(), ProcessError> {
        let entry = self.entry_mut(pid)?;
        check_limit(ResourceKind::CoreDump, bytes, entry.limits.core_dump_bytes)?;
        entry.usage.core_dump_bytes = bytes;
        Ok(())
    }

    pub fn update_rss(&mut self, pid: Pid, bytes: u64) -> Result<(), ProcessError> {
        let entry = self.entry_mut(pid)?;
        check_limit(ResourceKind::Rss, bytes, entry.limits.rss_bytes)?;
        entry.usage.rss_bytes = bytes;
        Ok(())
    }

    /// Check all tracked resources in the fixed order CPU, Memory, Files, Stack,
    /// DataSegment, CoreDump, Rss, returning the first violation.
    pub fn check_all(&self, pid: Pid) -> Result<(), ProcessError> {
        let entry = self.entries.get(&pid).ok_or(ProcessError::NotFound(pid))?;
        check_limit(ResourceKind::Cpu, entry.usage.cpu_ms, entry.limits.cpu_ms)?;
        check_limit(
            ResourceKind::Memory,
            entry.usage.memory_bytes,
            entry.limits.memory_bytes,
        )?;
        check_limit(ResourceKind::Files, entry.usage.files, entry.limits.files)?;
        check_limit(
            ResourceKind::Stack,
            entry.usage.stack_bytes,
            entry.limits.stack_bytes,
        )?;
        check_limit(
            ResourceKind::DataSegment,
            entry.usage.data_segment_bytes,
            entry.limits.data_segment_bytes,
        )?;
        check_limit(
            ResourceKind::CoreDump,
            entry.usage.core_dump_bytes,
            entry.limits.core_dump_bytes,
        )?;
        check_limit(ResourceKind::Rss, entry.usage.rss_bytes, entry.limits.rss_bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_means_unlimited() {
        let mut e = ResourceEnforcer::new();
        e.register(1, ResourceLimits::default());
        assert!(e.update_memory(1, u64::MAX / 2).is_ok());
    }

    #[test]
    fn exceeding_limit_is_rejected_and_usage_unchanged() {
        let mut e = ResourceEnforcer::new();
        e.register(
            1,
            ResourceLimits {
                memory_bytes: 1024,
                ..Default::default()
            },
        );
        let err = e.update_memory(1, 2048).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::LimitExceeded {
                kind: ResourceKind::Memory,
                ..
            }
        ));
    }

    #[test]
    fn at_limit_is_a_violation() {
        let mut e = ResourceEnforcer::new();
        e.register(
            1,
            ResourceLimits {
                files: 2,
                ..Default::default()
            },
        );
        e.add_file(1).unwrap();
        assert!(e.add_file(1).is_err());
    }

    #[test]
    fn check_all_reports_cpu_before_memory() {
        let mut e = ResourceEnforcer::new();
        e.register(1, ResourceLimits::default());
        e.add_cpu(1, 100).unwrap();
        e.update_memory(1, 100).unwrap();
        // Tighten both limits below current usage; check_all must report the
        // cpu violation first since it is checked before memory.
        e.set_limits(
            1,
            ResourceLimits {
                cpu_ms: 10,
                memory_bytes: 10,
                ..Default::default()
            },
        )
        .unwrap();
        let err = e.check_all(1).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::LimitExceeded {
                kind: ResourceKind::Cpu,
                ..
            }
        ));
    }

    #[test]
    fn rss_data_segment_and_core_dump_are_enforced() {
        let mut e = ResourceEnforcer::new();
        e.register(
            1,
            ResourceLimits {
                rss_bytes: 4096,
                data_segment_bytes: 4096,
                core_dump_bytes: 4096,
                ..Default::default()
            },
        );
        assert!(e.update_rss(1, 2048).is_ok());
        assert!(e.update_data_segment(1, 2048).is_ok());
        assert!(e.update_core_dump(1, 2048).is_ok());
        let err = e.update_rss(1, 8192).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::LimitExceeded {
                kind: ResourceKind::Rss,
                ..
            }
        ));
        assert_eq!(e.usage(1).unwrap().rss_bytes, 2048);
    }
}
