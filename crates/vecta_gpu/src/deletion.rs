//! Deferred resource release
//!
//! Hosts learn that a path, image or font is gone on whatever thread their
//! object graph dies on. Those threads only append the identity here; the
//! render thread drains the queue once per frame and frees device resources
//! itself.

use std::sync::{Arc, Mutex};

use vecta_core::ResourceId;

/// Shared handle to the pending-release list
#[derive(Clone, Debug, Default)]
pub struct DeletionQueue {
    pending: Arc<Mutex<Vec<ResourceId>>>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an identity for release at the next drain point
    pub fn release(&self, id: ResourceId) {
        // A poisoned lock only means another producer panicked mid-push; the
        // vector itself is still valid.
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.push(id);
    }

    /// Take everything queued so far, releasing the lock before returning
    pub fn drain(&self) -> Vec<ResourceId> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_release_from_many_threads() {
        let queue = DeletionQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let q = queue.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        q.release(ResourceId::next());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(queue.pending_len(), 100);
        let drained = queue.drain();
        assert_eq!(drained.len(), 100);
        assert_eq!(queue.pending_len(), 0);
    }
}
