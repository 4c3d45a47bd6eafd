//! Priority-ordered message queues, and topic queues built on top of them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use crate::error::IpcError;
use crate::process::pid::Pid;

/// A single queued message. Higher `priority` is delivered first; equal
/// priorities preserve send order.
#[derive(Debug, Clone)]
pub struct Message {
    pub msg_type: u32,
    pub priority: i32,
    pub payload: Vec<u8>,
    pub sender: Pid,
    pub timestamp: DateTime<Utc>,
}

struct State {
    messages: VecDeque<Message>,
    total_bytes: usize,
    closed: bool,
}

/// Bounded by both byte size and message count. `Send` inserts maintaining
/// descending priority order (stable on ties); `Receive` pops the front.
pub struct MessageQueue {
    state: Mutex<State>,
    not_empty: Notify,
    max_bytes: usize,
    max_count: usize,
}

impl MessageQueue {
    pub fn new(max_bytes: usize, max_count: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                messages: VecDeque::new(),
                total_bytes: 0,
                closed: false,
            }),
            not_empty: Notify::new(),
            max_bytes,
            max_count,
        })
    }

    pub async fn send(&self, msg: Message) -> Result<(), IpcError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(IpcError::PipeClosed);
        }
        if state.messages.len() + 1 > self.max_count
            || state.total_bytes + msg.payload.len() > self.max_bytes
        {
            return Err(IpcError::Full);
        }
        let insert_at = state
            .messages
            .iter()
            .position(|m| m.priority < msg.priority)
            .unwrap_or(state.messages.len());
        state.total_bytes += msg.payload.len();
        state.messages.insert(insert_at, msg);
        self.not_empty.notify_waiters();
        Ok(())
    }

    pub async fn receive(&self) -> Result<Message, IpcError> {
        loop {
            let notified = {
                let mut state = self.state.lock().await;
                if let Some(msg) = state.messages.pop_front() {
                    state.total_bytes -= msg.payload.len();
                    return Ok(msg);
                }
                if state.closed {
                    return Err(IpcError::Empty);
                }
                self.not_empty.notified()
            };
            notified.await;
        }
    }

    pub async fn receive_non_blocking(&self) -> Result<Message, IpcError> {
        let mut state = self.state.lock().await;
        match state.messages.pop_front() {
            Some(msg) => {
                state.total_bytes -= msg.payload.len();
                Ok(msg)
            }
            None => Err(IpcError::Empty),
        }
    }

    /// Unblocks any waiting receivers with `Empty`, matching the spec's
    /// close semantics for message queues.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        drop(state);
        self.not_empty.notify_waiters();
    }
}

/// Maps topic names to [`MessageQueue`]s; publishes to unknown topics land
/// in a default queue.
pub struct TopicQueue {
    topics: Mutex<HashMap<String, Arc<MessageQueue>>>,
    default_queue: Arc<MessageQueue>,
    max_bytes: usize,
    max_count: usize,
}

impl TopicQueue {
    pub fn new(max_bytes: usize, max_count: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            default_queue: MessageQueue::new(max_bytes, max_count),
            max_bytes,
            max_count,
        }
    }

    pub async fn publish(&self, topic: &str, msg: Message) -> Result<(), IpcError> {
        let queue = {
            let mut topics = self.topics.lock().await;
            topics
                .entry(topic.to_string())
                .or_insert_with(|| MessageQueue::new(self.max_bytes, self.max_count))
                .clone()
        };
        queue.send(msg).await
    }

    pub async fn publish_default(&self, msg: Message) -> Result<(), IpcError> {
        self.default_queue.send(msg).await
    }

    pub async fn subscribe(&self, topic: &str) -> Arc<MessageQueue> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| MessageQueue::new(self.max_bytes, self.max_count))
            .clone()
    }

    pub fn default_queue(&self) -> Arc<MessageQueue> {
        self.default_queue.clone()
    }
}
