//! Kernel-wide configuration, independent of how an embedding application loads it.

use serde::{Deserialize, Serialize};

fn default_quantum_ms() -> u64 {
    100
}

fn default_mtu() -> usize {
    1500
}

fn default_scrollback() -> usize {
    1000
}

fn default_socket_queue_depth() -> usize {
    256
}

fn default_cols() -> usize {
    80
}

fn default_rows() -> usize {
    24
}

/// Tunables shared across the process, network, and terminal subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Cooperative scheduler time quantum, advisory only.
    #[serde(default = "default_quantum_ms")]
    pub scheduler_quantum_ms: u64,
    /// Default CPU time limit in milliseconds; 0 means unlimited.
    pub default_cpu_limit_ms: u64,
    /// Default memory limit in bytes; 0 means unlimited.
    pub default_memory_limit_bytes: u64,
    /// Default open-file limit; 0 means unlimited.
    pub default_file_limit: u64,
    /// Default stack limit in bytes; 0 means unlimited.
    pub default_stack_limit_bytes: u64,
    /// Default interface MTU used when fragmenting IPv4 datagrams.
    #[serde(default = "default_mtu")]
    pub default_mtu: usize,
    /// Default terminal scrollback bound, in lines.
    #[serde(default = "default_scrollback")]
    pub default_scrollback_lines: usize,
    /// Default bound on socket send/receive queues, in messages/datagrams.
    #[serde(default = "default_socket_queue_depth")]
    pub default_socket_queue_depth: usize,
    /// Default terminal width in columns.
    #[serde(default = "default_cols")]
    pub default_term_cols: usize,
    /// Default terminal height in rows.
    #[serde(default = "default_rows")]
    pub default_term_rows: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            scheduler_quantum_ms: default_quantum_ms(),
            default_cpu_limit_ms: 0,
            default_memory_limit_bytes: 0,
            default_file_limit: 256,
            default_stack_limit_bytes: 8 * 1024 * 1024,
            default_mtu: default_mtu(),
            default_scrollback_lines: default_scrollback(),
            default_socket_queue_depth: default_socket_queue_depth(),
            default_term_cols: default_cols(),
            default_term_rows: default_rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.default_mtu, 1500);
        assert_eq!(cfg.default_scrollback_lines, 1000);
        assert_eq!(cfg.default_term_cols, 80);
        assert_eq!(cfg.default_term_rows, 24);
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let cfg: KernelConfig = serde_json::from_str(r#"{"default_mtu": 9000}"#).unwrap();
        assert_eq!(cfg.default_mtu, 9000);
        assert_eq!(cfg.default_scrollback_lines, 1000);
    }
}
