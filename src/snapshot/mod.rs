use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Registry of pinned sequence numbers.
///
/// Every open snapshot holds one reference on its sequence number here.
/// `oldest()` is the watermark below which no reader can see anything
/// newer; a compacting layer consults it before dropping shadowed versions.
pub struct SnapshotList {
    active: Mutex<BTreeMap<u64, usize>>,
}

impl SnapshotList {
    pub fn new() -> Self {
        SnapshotList {
            active: Mutex::new(BTreeMap::new()),
        }
    }

    /// Pin `sequence` and hand out a handle for it.
    pub fn acquire(self: &Arc<Self>, sequence: u64) -> Snapshot {
        *self.active.lock().entry(sequence).or_default() += 1;
        Snapshot {
            sequence,
            list: Arc::clone(self),
        }
    }

    /// The lowest sequence number still pinned by an open snapshot.
    pub fn oldest(&self) -> Option<u64> {
        self.active.lock().keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }

    fn release(&self, sequence: u64) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                active.remove(&sequence);
            }
        }
    }
}

impl Default for SnapshotList {
    fn default() -> Self {
        Self::new()
    }
}

/// A pinned point-in-time view: records with a sequence number above
/// `sequence()` are invisible to iterators built against this handle.
///
/// The pin is released when the handle drops. Cloning re-acquires, so each
/// clone releases independently.
pub struct Snapshot {
    sequence: u64,
    list: Arc<SnapshotList>,
}

impl Snapshot {
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Clone for Snapshot {
    fn clone(&self) -> Self {
        self.list.acquire(self.sequence)
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.list.release(self.sequence);
    }
}
