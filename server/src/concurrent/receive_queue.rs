// gore_server/server/src/concurrent/receive_queue.rs
use parking_lot::Mutex;

/// Hand-off queue between I/O tasks and the simulation thread.
///
/// Producers push from any thread; the simulation drains the whole batch
/// once per tick. One coarse lock guards both sides.
#[derive(Debug)]
pub struct ReceiveQueue<T> {
    items: Mutex<Vec<T>>,
}

impl<T> ReceiveQueue<T> {
    pub fn new() -> Self {
        ReceiveQueue { items: Mutex::new(Vec::new()) }
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    /// Takes everything queued so far, oldest first. The queue is left empty.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for ReceiveQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
