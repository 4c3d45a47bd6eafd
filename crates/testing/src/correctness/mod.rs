//! End-to-end scenario tests that exercise `sis-kernel` the way a caller
//! would: across process, IPC, network, and terminal boundaries at once,
//! rather than one module in isolation.
