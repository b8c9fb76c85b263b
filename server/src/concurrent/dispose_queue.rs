// gore_server/server/src/concurrent/dispose_queue.rs
use crate::core::types::{CharacterId, ItemId, MapId};
use parking_lot::Mutex;
use std::fmt;
use tracing::trace;

/// Something that releases resources exactly once.
pub trait Disposable {
    fn is_disposed(&self) -> bool;

    /// Tears the object down. Returns `false` if it was already disposed,
    /// in which case nothing happens.
    fn dispose(&mut self) -> bool;
}

/// An object waiting for the next dispose-drain.
pub enum DisposeTarget {
    Character { map: MapId, id: CharacterId },
    Item { map: MapId, id: ItemId },
    /// Connected user, keyed by name (case-insensitive).
    User { name: String },
    /// Any owned object that needs deferred teardown.
    Object(Box<dyn Disposable + Send>),
}

impl fmt::Debug for DisposeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisposeTarget::Character { map, id } => write!(f, "Character({} on map {})", id, map),
            DisposeTarget::Item { map, id } => write!(f, "Item({} on map {})", id, map),
            DisposeTarget::User { name } => write!(f, "User({})", name),
            DisposeTarget::Object(obj) => write!(f, "Object(disposed={})", obj.is_disposed()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub disposed: usize,
    /// Targets that were already gone or already disposed.
    pub skipped: usize,
}

/// Process-wide LIFO stack of objects pending disposal.
///
/// Anything may push at any time. Only the tick-start drain pops.
#[derive(Debug, Default)]
pub struct DisposeStack {
    stack: Mutex<Vec<DisposeTarget>>,
}

impl DisposeStack {
    pub fn new() -> Self {
        DisposeStack { stack: Mutex::new(Vec::new()) }
    }

    pub fn push(&self, target: DisposeTarget) {
        trace!("Queued for dispose: {:?}", target);
        self.stack.lock().push(target);
    }

    pub fn len(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.lock().is_empty()
    }

    /// Pops every target, newest first, handing each to `dispose`.
    ///
    /// The lock is not held while `dispose` runs, so the callback may push
    /// more targets; those are drained in the same call.
    /// `dispose` returns whether it actually tore something down.
    pub fn drain<F>(&self, mut dispose: F) -> DrainReport
    where
        F: FnMut(DisposeTarget) -> bool,
    {
        let mut report = DrainReport::default();
        loop {
            let batch = std::mem::take(&mut *self.stack.lock());
            if batch.is_empty() {
                break;
            }
            for target in batch.into_iter().rev() {
                if dispose(target) {
                    report.disposed += 1;
                } else {
                    report.skipped += 1;
                }
            }
        }
        report
    }
}
