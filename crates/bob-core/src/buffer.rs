// ── Bounded detection buffer ──
//
// FIFO store shared by the active producer and the renderer. Every
// mutation bumps a revision counter published through a `watch`
// channel so consumers can react without polling.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::model::Detection;

/// Receiver of detection batches, typically a closure appending to a
/// shared [`DetectionBuffer`].
pub type DetectionSink = Arc<dyn Fn(Vec<Detection>) + Send + Sync>;

/// Default maximum number of retained detections.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Capacity-bounded, insertion-ordered detection store.
///
/// All operations take one short lock, so a snapshot never observes a
/// partially appended batch. Eviction is strictly oldest-first.
pub struct DetectionBuffer {
    items: Mutex<VecDeque<Arc<Detection>>>,
    capacity: usize,
    revision: watch::Sender<u64>,
}

impl DetectionBuffer {
    pub fn new(capacity: usize) -> Self {
        let (revision, _) = watch::channel(0u64);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            revision,
        }
    }

    /// Append `events` in order, evicting from the front past capacity.
    pub fn append_batch(&self, events: Vec<Detection>) {
        if events.is_empty() {
            return;
        }

        {
            let mut items = self.lock();
            // Only the newest `capacity` of the batch can survive.
            let skip = events.len().saturating_sub(self.capacity);
            items.extend(events.into_iter().skip(skip).map(Arc::new));
            let overflow = items.len().saturating_sub(self.capacity);
            items.drain(..overflow);
        }

        self.bump_revision();
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<Detection>> {
        self.lock().iter().cloned().collect()
    }

    /// Drop everything immediately.
    pub fn clear(&self) {
        self.lock().clear();
        self.bump_revision();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A sink that appends into this buffer.
    pub fn sink(self: &Arc<Self>) -> DetectionSink {
        let buffer = Arc::clone(self);
        Arc::new(move |batch| buffer.append_batch(batch))
    }

    /// Subscribe to the revision counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<Detection>>> {
        // A panicking writer cannot leave the deque half-updated in a
        // way that breaks the length bound, so poisoning is ignored.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump_revision(&self) {
        // `send_modify` updates unconditionally, even with zero receivers.
        self.revision.send_modify(|v| *v = v.wrapping_add(1));
    }
}

impl Default for DetectionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
