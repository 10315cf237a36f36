//! skimdb: the scan layer of an LSM key/value engine. A versioned in-memory
//! table plus the user-facing ordered iterator that collapses its record
//! stream (sets, merge operands, point and range tombstones) into one live
//! entry per user key, in either direction, against a pinned snapshot.

pub mod iterator;
pub mod memtable;
pub mod merge;
pub mod snapshot;
pub mod util;

pub use iterator::{InternalIterator, MemTableIterator, ReadOptions, UserIterator};
pub use memtable::{InternalKey, MemTable, RecordKind};
pub use merge::{ConcatMerge, CounterMerge, MergeOperator};
pub use snapshot::{Snapshot, SnapshotList};
pub use util::{BytewiseComparator, Code, Comparator, Result, Slice, Status};
