//! Inter-process communication primitives.

pub mod fifo;
pub mod message_queue;
pub mod named_pipe;
pub mod pipe;
pub mod shared_memory;
