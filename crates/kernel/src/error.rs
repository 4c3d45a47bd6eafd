//! Error taxonomy shared by the process, network, and terminal subsystems.

use thiserror::Error;

/// Resource kinds tracked by the enforcer, used to tag [`ProcessError::LimitExceeded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Cpu,
    Memory,
    Files,
    Stack,
    DataSegment,
    CoreDump,
    Rss,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::Files => "files",
            ResourceKind::Stack => "stack",
            ResourceKind::DataSegment => "data segment",
            ResourceKind::CoreDump => "core dump",
            ResourceKind::Rss => "rss",
        };
        f.write_str(s)
    }
}

/// Errors from the process table, scheduler, and resource enforcer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: String, to: String },
    #[error("process {0} not found")]
    NotFound(u32),
    #[error("pid {0} already in use")]
    PidInUse(u32),
    #[error("{kind} limit exceeded: usage {usage} >= limit {limit}")]
    LimitExceeded {
        kind: ResourceKind,
        limit: u64,
        usage: u64,
    },
    #[error("invalid signal number {0}")]
    InvalidSignal(i32),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

/// Errors from the IPC primitives (pipes, queues, shared memory, signals).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpcError {
    #[error("pipe closed")]
    PipeClosed,
    #[error("broken pipe")]
    BrokenPipe,
    #[error("pipe {0:?} not found")]
    PipeNotFound(String),
    #[error("pipe {0:?} already exists")]
    PipeExists(String),
    #[error("invalid pipe name: {0:?}")]
    InvalidPipeName(String),
    #[error("queue full")]
    Full,
    #[error("queue empty")]
    Empty,
    #[error("segment {0:?} not found")]
    SegmentNotFound(String),
    #[error("segment {0:?} already exists")]
    SegmentExists(String),
    #[error("segment full")]
    SegmentFull,
    #[error("already attached")]
    AlreadyAttached,
    #[error("not attached")]
    NotAttached,
    #[error("invalid size {0}")]
    InvalidSize(usize),
    #[error("invalid offset {0}")]
    InvalidOffset(usize),
}

/// Errors from Ethernet/ARP/IPv4/IPv6/ICMP/UDP/TCP framing and the routing table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    #[error("buffer too small: need at least {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    #[error("invalid packet: {0}")]
    InvalidPacket(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("mtu too small: {0}")]
    MtuTooSmall(usize),
    #[error("fragment mismatch: {0}")]
    FragmentMismatch(String),
    #[error("fragment gap or overlap")]
    FragmentGap,
    #[error("no route to host")]
    NoRoute,
    #[error("no arp entry for host")]
    ArpNotFound,
    #[error("host unreachable")]
    UnreachableHost,
    #[error("route to {0} already exists")]
    RouteExists(String),
    #[error("route not found")]
    RouteNotFound,
    #[error("socket {0} not found")]
    SocketNotFound(u64),
    #[error("socket already connected")]
    AlreadyConnected,
    #[error("socket not connected")]
    NotConnected,
    #[error("socket not listening")]
    NotListening,
    #[error("socket already closed")]
    AlreadyClosed,
    #[error("send queue full")]
    Full,
    #[error("no pending connection")]
    NoPendingConnection,
}

/// Errors from the screen buffer, terminal, ANSI parser, and PTY.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TermError {
    #[error("pty closed")]
    Closed,
    #[error("invalid offset {0}")]
    InvalidOffset(usize),
}

/// Top-level error type, convertible from any subsystem error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error(transparent)]
    Term(#[from] TermError),
}
