use std::ops::Bound;
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;

use crate::iterator::InternalIterator;
use crate::memtable::InternalKey;
use crate::util::{Result, Slice};

/// Cursor over a memtable's records, filtered to one snapshot.
///
/// The skip map outlives any individual position, so the iterator keeps no
/// entry handle; it caches the current record in owned storage and
/// repositions with `lower_bound`/`upper_bound` probes. Records whose
/// sequence exceeds the pinned snapshot are skipped in both directions.
pub struct MemTableIterator {
    table: Arc<SkipMap<InternalKey, Slice>>,
    visible_seq: u64,
    current: Option<(InternalKey, Slice)>,
}

impl MemTableIterator {
    pub(crate) fn new(table: Arc<SkipMap<InternalKey, Slice>>, visible_seq: u64) -> Self {
        MemTableIterator {
            table,
            visible_seq,
            current: None,
        }
    }

    /// Land on the first visible record at or after `bound`.
    fn settle_forward(&mut self, mut bound: Bound<InternalKey>) -> bool {
        loop {
            let found = self
                .table
                .lower_bound(bound_ref(&bound))
                .map(|entry| (entry.key().clone(), entry.value().clone()));
            match found {
                Some((key, value)) => {
                    if key.sequence() <= self.visible_seq {
                        self.current = Some((key, value));
                        return true;
                    }
                    bound = Bound::Excluded(key);
                }
                None => {
                    self.current = None;
                    return false;
                }
            }
        }
    }

    /// Land on the last visible record at or before `bound`.
    fn settle_backward(&mut self, mut bound: Bound<InternalKey>) -> bool {
        loop {
            let found = self
                .table
                .upper_bound(bound_ref(&bound))
                .map(|entry| (entry.key().clone(), entry.value().clone()));
            match found {
                Some((key, value)) => {
                    if key.sequence() <= self.visible_seq {
                        self.current = Some((key, value));
                        return true;
                    }
                    bound = Bound::Excluded(key);
                }
                None => {
                    self.current = None;
                    return false;
                }
            }
        }
    }
}

fn bound_ref(bound: &Bound<InternalKey>) -> Bound<&InternalKey> {
    match bound {
        Bound::Included(key) => Bound::Included(key),
        Bound::Excluded(key) => Bound::Excluded(key),
        Bound::Unbounded => Bound::Unbounded,
    }
}

impl InternalIterator for MemTableIterator {
    fn seek_ge(&mut self, user_key: &[u8]) {
        self.settle_forward(Bound::Included(InternalKey::probe(user_key)));
    }

    fn seek_lt(&mut self, user_key: &[u8]) {
        // The probe sorts before every record of `user_key`, so an exclusive
        // backward bound lands on the previous user key's records.
        self.settle_backward(Bound::Excluded(InternalKey::probe(user_key)));
    }

    fn seek_to_first(&mut self) {
        self.settle_forward(Bound::Unbounded);
    }

    fn seek_to_last(&mut self) {
        self.settle_backward(Bound::Unbounded);
    }

    fn next(&mut self) -> bool {
        match self.current.take() {
            Some((key, _)) => self.settle_forward(Bound::Excluded(key)),
            None => false,
        }
    }

    fn prev(&mut self) -> bool {
        match self.current.take() {
            Some((key, _)) => self.settle_backward(Bound::Excluded(key)),
            None => false,
        }
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &InternalKey {
        let (key, _) = self.current.as_ref().expect("key() on invalid iterator");
        key
    }

    fn value(&self) -> &[u8] {
        let (_, value) = self.current.as_ref().expect("value() on invalid iterator");
        value.data()
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memtable::{MemTable, RecordKind};

    fn sample() -> MemTable {
        let mem = MemTable::new();
        mem.set(Slice::from("apple"), Slice::from("1")); // seq 1
        mem.set(Slice::from("cherry"), Slice::from("2")); // seq 2
        mem.set(Slice::from("apple"), Slice::from("3")); // seq 3
        mem.delete(Slice::from("banana")); // seq 4
        mem
    }

    #[test]
    fn test_forward_yields_newest_version_first() {
        let mem = sample();
        let snapshot = mem.snapshot();
        let mut iter = mem.iter(&snapshot);

        iter.seek_to_first();
        assert!(iter.valid());
        assert_eq!(iter.key().user_key(), b"apple");
        assert_eq!(iter.key().sequence(), 3);

        assert!(iter.next());
        assert_eq!(iter.key().user_key(), b"apple");
        assert_eq!(iter.key().sequence(), 1);

        assert!(iter.next());
        assert_eq!(iter.key().user_key(), b"banana");
        assert_eq!(iter.key().kind(), RecordKind::Delete.as_u8());

        assert!(iter.next());
        assert_eq!(iter.key().user_key(), b"cherry");
        assert!(!iter.next());
        assert!(!iter.valid());
    }

    #[test]
    fn test_backward_walks_versions_oldest_first() {
        let mem = sample();
        let snapshot = mem.snapshot();
        let mut iter = mem.iter(&snapshot);

        iter.seek_lt(b"banana");
        assert!(iter.valid());
        assert_eq!(iter.key().user_key(), b"apple");
        assert_eq!(iter.key().sequence(), 1);

        assert!(iter.prev());
        assert_eq!(iter.key().sequence(), 3);
        assert!(!iter.prev());
    }

    #[test]
    fn test_seek_ge_lands_between_keys() {
        let mem = sample();
        let snapshot = mem.snapshot();
        let mut iter = mem.iter(&snapshot);

        iter.seek_ge(b"b");
        assert!(iter.valid());
        assert_eq!(iter.key().user_key(), b"banana");

        iter.seek_ge(b"zebra");
        assert!(!iter.valid());
    }

    #[test]
    fn test_snapshot_hides_later_writes() {
        let mem = MemTable::new();
        mem.set(Slice::from("k"), Slice::from("old"));
        let snapshot = mem.snapshot();
        mem.set(Slice::from("k"), Slice::from("new"));

        let mut iter = mem.iter(&snapshot);
        iter.seek_to_first();
        assert!(iter.valid());
        assert_eq!(iter.value(), b"old");
        assert!(!iter.next());

        // A fresh snapshot sees both versions, newest first.
        let snapshot2 = mem.snapshot();
        let mut iter2 = mem.iter(&snapshot2);
        iter2.seek_to_first();
        assert_eq!(iter2.value(), b"new");
        assert!(iter2.next());
        assert_eq!(iter2.value(), b"old");
    }

    #[test]
    fn test_exhausted_cursor_tolerates_stepping() {
        let mem = sample();
        let snapshot = mem.snapshot();
        let mut iter = mem.iter(&snapshot);

        assert!(!iter.next());
        assert!(!iter.prev());
        iter.seek_to_last();
        assert!(iter.valid());
        assert_eq!(iter.key().user_key(), b"cherry");
    }
}
