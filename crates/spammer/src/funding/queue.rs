//! FIFO of workers waiting for a refund.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Concurrency-safe FIFO with a wake-up for its consumer.
///
/// Producers push from any task; a single consumer pops or drains. The queue
/// does not deduplicate: producers only push on a state transition, so an
/// entry cannot be pushed twice before it is consumed.
pub struct FundingQueue<T> {
    items: Mutex<VecDeque<T>>,
    pushed: Notify,
}

impl<T> Default for FundingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FundingQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            pushed: Notify::new(),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.pushed.notify_one();
    }

    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Remove and return every entry, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Wait until something is pushed, `timeout` elapses or `cancel` fires.
    ///
    /// Returns immediately when the queue is not empty. A push that happened
    /// while nobody was waiting is not lost.
    pub async fn wait_for_item(&self, timeout: Duration, cancel: &CancellationToken) {
        if !self.is_empty() {
            return;
        }
        tokio::select! {
            _ = self.pushed.notified() => {}
            _ = tokio::time::sleep(timeout) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
