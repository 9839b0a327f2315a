use std::collections::{BinaryHeap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::message::{ByPriority, MessageRef};

/// Storage behind an [`InterruptibleQueue`].
pub trait Buffer: Default + Send {
    type Item;

    fn push(&mut self, item: Self::Item);
    fn pop(&mut self) -> Option<Self::Item>;
    fn len(&self) -> usize;
    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> Buffer for VecDeque<T> {
    type Item = T;

    fn push(&mut self, item: T) {
        self.push_back(item);
    }

    fn pop(&mut self) -> Option<T> {
        self.pop_front()
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn clear(&mut self) {
        VecDeque::clear(self);
    }
}

/// Min-heap of messages by priority.
#[derive(Debug, Default)]
pub struct MessageHeap {
    heap: BinaryHeap<ByPriority>,
}

impl MessageHeap {
    pub fn peek(&self) -> Option<&MessageRef> {
        self.heap.peek().map(|entry| &entry.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MessageRef> {
        self.heap.iter().map(|entry| &entry.0)
    }

    /// Removes the message with the given id from anywhere in the heap.
    ///
    /// This is O(n) and only used to recover from a delete that raced with a requeue.
    pub fn remove(&mut self, message_id: &str) -> bool {
        let before = self.heap.len();
        self.heap.retain(|entry| entry.0.id() != message_id);
        self.heap.len() != before
    }

    /// Pops messages created at or before `threshold`.
    ///
    /// Priority equals creation time for every message that can expire, so only the root is
    /// ever inspected and the heap property holds throughout.
    pub fn remove_expired(&mut self, threshold: f64) -> Vec<MessageRef> {
        let mut expired = Vec::new();
        while let Some(root) = self.heap.peek() {
            if threshold < root.0.created() {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                expired.push(entry.0);
            }
        }
        expired
    }
}

impl Buffer for MessageHeap {
    type Item = MessageRef;

    fn push(&mut self, item: MessageRef) {
        self.heap.push(ByPriority(item));
    }

    fn pop(&mut self) -> Option<MessageRef> {
        self.heap.pop().map(|entry| entry.0)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn clear(&mut self) {
        self.heap.clear();
    }
}

#[derive(Debug, Default)]
struct Inner<B> {
    buffer: B,
    shutdown: bool,
}

/// A buffer consumers can wait on, with a bounded wait and a shutdown that wakes every waiter.
#[derive(Debug, Default)]
pub struct InterruptibleQueue<B> {
    inner: Mutex<Inner<B>>,
    notify: Notify,
}

/// Delivery structure of a standard queue.
pub type VisibilityHeap = InterruptibleQueue<MessageHeap>;

/// Ready message group ids of a FIFO queue.
pub type GroupScheduler = InterruptibleQueue<VecDeque<String>>;

impl<B: Buffer> InterruptibleQueue<B> {
    pub fn new() -> Self {
        InterruptibleQueue {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    pub fn put(&self, item: B::Item) {
        self.inner.lock().buffer.push(item);
        self.notify.notify_waiters();
    }

    /// Takes the next item.
    ///
    /// Without `block` this only looks at what is buffered. With `block` it waits up to
    /// `timeout` for a producer. Returns `None` on timeout, on an empty non-blocking read, and
    /// always once the queue is shut down.
    pub async fn get(&self, block: bool, timeout: Duration) -> Option<B::Item> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register before looking, so a put between the check and the wait is not lost
            notified.as_mut().enable();

            if let Some(ready) = self.try_get() {
                return ready;
            }
            if !block {
                return None;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_get().flatten();
            }
        }
    }

    /// `Some(None)` means shut down, `None` means nothing buffered.
    fn try_get(&self) -> Option<Option<B::Item>> {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            return Some(None);
        }
        inner.buffer.pop().map(Some)
    }

    pub fn shutdown(&self) {
        self.inner.lock().shutdown = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().buffer.is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().buffer.clear();
    }

    /// Runs `f` on the buffer under the structure's lock.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.inner.lock().buffer)
    }
}
