//! FIFO queues: non-blocking enqueue, blocking dequeue.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::error::IpcError;

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// An unbounded-enqueue, blocking-dequeue queue. `Dequeue` blocks while empty
/// and returns `PipeClosed` once the queue has been closed and drained.
pub struct Fifo<T> {
    state: Mutex<State<T>>,
    not_empty: Notify,
}

impl<T> Fifo<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_empty: Notify::new(),
        })
    }

    pub async fn enqueue(&self, item: T) -> Result<(), IpcError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(IpcError::PipeClosed);
        }
        state.queue.push_back(item);
        self.not_empty.notify_waiters();
        Ok(())
    }

    pub async fn dequeue(&self) -> Result<T, IpcError> {
        loop {
            let notified = {
                let mut state = self.state.lock().await;
                if let Some(item) = state.queue.pop_front() {
                    return Ok(item);
                }
                if state.closed {
                    return Err(IpcError::PipeClosed);
                }
                self.not_empty.notified()
            };
            notified.await;
        }
    }

    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.not_empty.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_dequeue_is_fifo_order() {
        let fifo = Fifo::new();
        fifo.enqueue(1).await.unwrap();
        fifo.enqueue(2).await.unwrap();
        assert_eq!(fifo.dequeue().await.unwrap(), 1);
        assert_eq!(fifo.dequeue().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn dequeue_on_closed_empty_queue_errors() {
        let fifo: Arc<Fifo<i32>> = Fifo::new();
        fifo.close().await;
        assert!(matches!(fifo.dequeue().await, Err(IpcError::PipeClosed)));
    }

    #[tokio::test]
    async fn blocked_dequeue_wakes_on_enqueue() {
        let fifo = Fifo::new();
        let fifo2 = fifo.clone();
        let reader = tokio::spawn(async move { fifo2.dequeue().await });
        tokio::task::yield_now().await;
        fifo.enqueue(42).await.unwrap();
        assert_eq!(reader.await.unwrap().unwrap(), 42);
    }
}
