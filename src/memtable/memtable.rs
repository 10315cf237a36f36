use std::cmp::Ordering;
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::iterator::{MemTableIterator, ReadOptions, UserIterator};
use crate::merge::MergeOperator;
use crate::snapshot::{Snapshot, SnapshotList};
use crate::util::{Comparator, Slice};

/// What a single internal record means for its user key.
///
/// Records carry the kind as a raw `u8` so that corrupt values survive long
/// enough for the read path to diagnose them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Point tombstone: the key reads as absent.
    Delete = 0,
    /// Full overwrite.
    Set = 1,
    /// Operand folded into older versions by the configured merge operator.
    Merge = 2,
    /// Range tombstone, keyed at the range start with the end key as its
    /// value. Recorded and yielded, never applied at this layer.
    RangeDelete = 3,
}

impl RecordKind {
    pub fn from_u8(kind: u8) -> Option<RecordKind> {
        match kind {
            0 => Some(RecordKind::Delete),
            1 => Some(RecordKind::Set),
            2 => Some(RecordKind::Merge),
            3 => Some(RecordKind::RangeDelete),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A versioned record key: user key plus sequence number plus kind.
///
/// Orders by user key ascending, then sequence descending, so a forward
/// scan meets the newest version of each user key first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey {
    user_key: Slice,
    sequence: u64,
    kind: u8,
}

impl InternalKey {
    pub fn new(user_key: Slice, sequence: u64, kind: u8) -> Self {
        InternalKey {
            user_key,
            sequence,
            kind,
        }
    }

    pub fn user_key(&self) -> &[u8] {
        self.user_key.data()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    /// The key that sorts before every real record of `user_key` and after
    /// every record of smaller user keys. Seeks position with it.
    pub(crate) fn probe(user_key: &[u8]) -> Self {
        InternalKey {
            user_key: Slice::from(user_key),
            sequence: u64::MAX,
            kind: u8::MAX,
        }
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.kind.cmp(&self.kind))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// In-memory versioned table.
///
/// Every write appends a new record under a fresh sequence number; nothing
/// is overwritten in place. Readers pin a snapshot and observe only records
/// at or below its sequence.
pub struct MemTable {
    table: Arc<SkipMap<InternalKey, Slice>>,
    last_sequence: AtomicU64,
    snapshots: Arc<SnapshotList>,
}

impl MemTable {
    pub fn new() -> Self {
        MemTable {
            table: Arc::new(SkipMap::new()),
            last_sequence: AtomicU64::new(0),
            snapshots: Arc::new(SnapshotList::new()),
        }
    }

    fn insert(&self, key: Slice, kind: RecordKind, value: Slice) -> u64 {
        let sequence = self
            .last_sequence
            .fetch_add(1, atomic::Ordering::SeqCst)
            + 1;
        self.table
            .insert(InternalKey::new(key, sequence, kind.as_u8()), value);
        sequence
    }

    pub fn set(&self, key: Slice, value: Slice) {
        self.insert(key, RecordKind::Set, value);
    }

    pub fn merge(&self, key: Slice, value: Slice) {
        self.insert(key, RecordKind::Merge, value);
    }

    pub fn delete(&self, key: Slice) {
        self.insert(key, RecordKind::Delete, Slice::empty());
    }

    /// Records a tombstone covering `[start, end)`. The record travels the
    /// stream like any other; applying it to the keys it covers is the job
    /// of a lower layer.
    pub fn delete_range(&self, start: Slice, end: Slice) {
        self.insert(start, RecordKind::RangeDelete, end);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(atomic::Ordering::SeqCst)
    }

    /// Pin the current state. Writes issued after this call are invisible
    /// to iterators built against the returned handle.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.acquire(self.last_sequence())
    }

    /// The sequence number of the oldest open snapshot, if any.
    pub fn oldest_snapshot(&self) -> Option<u64> {
        self.snapshots.oldest()
    }

    /// Raw cursor over the records visible to `snapshot`.
    pub fn iter(&self, snapshot: &Snapshot) -> MemTableIterator {
        MemTableIterator::new(Arc::clone(&self.table), snapshot.sequence())
    }

    /// An ordered user-level iterator over a fresh snapshot of this table.
    pub fn scan(
        &self,
        opts: ReadOptions,
        cmp: Arc<dyn Comparator>,
        merge: Arc<dyn MergeOperator>,
    ) -> UserIterator<MemTableIterator> {
        let snapshot = self.snapshot();
        let inner = self.iter(&snapshot);
        UserIterator::new(opts, cmp, merge, inner, Some(snapshot))
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_key_orders_user_keys_ascending() {
        let a = InternalKey::new(Slice::from("a"), 9, RecordKind::Set.as_u8());
        let b = InternalKey::new(Slice::from("b"), 1, RecordKind::Set.as_u8());
        assert!(a < b);
    }

    #[test]
    fn test_internal_key_orders_versions_newest_first() {
        let new = InternalKey::new(Slice::from("k"), 7, RecordKind::Set.as_u8());
        let old = InternalKey::new(Slice::from("k"), 3, RecordKind::Set.as_u8());
        assert!(new < old);
    }

    #[test]
    fn test_internal_key_handles_binary_keys() {
        // Embedded NULs must not disturb user-key grouping.
        let short = InternalKey::new(Slice::from(vec![b'a']), 1, 1);
        let long = InternalKey::new(Slice::from(vec![b'a', 0, b'b']), 200, 1);
        assert!(short < long);
        assert!(InternalKey::probe(b"a") < short);
        assert!(InternalKey::probe(b"a\x00b") < long);
        assert!(short < InternalKey::probe(b"a\x00b"));
    }

    #[test]
    fn test_memtable_assigns_increasing_sequences() {
        let mem = MemTable::new();
        mem.set(Slice::from("k1"), Slice::from("v1"));
        mem.set(Slice::from("k2"), Slice::from("v2"));
        mem.delete(Slice::from("k1"));
        assert_eq!(mem.last_sequence(), 3);
        assert_eq!(mem.len(), 3);
    }

    #[test]
    fn test_snapshot_pins_watermark() {
        let mem = MemTable::new();
        mem.set(Slice::from("k"), Slice::from("v"));
        let snapshot = mem.snapshot();
        assert_eq!(snapshot.sequence(), 1);
        assert_eq!(mem.oldest_snapshot(), Some(1));

        mem.set(Slice::from("k"), Slice::from("v2"));
        assert_eq!(mem.last_sequence(), 2);
        assert_eq!(mem.oldest_snapshot(), Some(1));

        drop(snapshot);
        assert_eq!(mem.oldest_snapshot(), None);
    }
}
