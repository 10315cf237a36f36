/// Iterator module for skimdb
///
/// Two cursor layers over the versioned record store:
///
/// ```text
/// MemTable::scan()
///     ↓
/// UserIterator            one entry per live user key, merges folded
///     ↓
/// InternalIterator        every visible versioned record, newest-first
///                         within each user key
/// ```
///
/// The internal layer knows nothing about tombstones or merge operands; it
/// yields records. The user layer collapses them: the newest `Set` wins,
/// a `Delete` hides everything older, `Merge` records fold into one value,
/// and range tombstones pass through untouched.
use crate::memtable::InternalKey;
use crate::util::{Result, Slice};

/// Cursor over versioned internal records in key order.
///
/// Within one user key, versions arrive newest-first when moving forward
/// (and therefore oldest-first when moving backward across the key).
///
/// `key()` and `value()` are only meaningful while `valid()` returns true,
/// and the storage behind them is only guaranteed until the next
/// repositioning call. `next`/`prev` on an exhausted cursor are tolerated
/// and return false; a subsequent seek or first/last re-establishes a
/// position. I/O and decoding errors from the backing source surface
/// through `close()`.
pub trait InternalIterator {
    /// Position at the first record whose user key is >= `user_key`
    fn seek_ge(&mut self, user_key: &[u8]);

    /// Position at the last record whose user key is < `user_key`
    fn seek_lt(&mut self, user_key: &[u8]);

    /// Position at the first record in the stream
    fn seek_to_first(&mut self);

    /// Position at the last record in the stream
    fn seek_to_last(&mut self);

    /// Move to the next record. Returns whether the cursor is still valid.
    fn next(&mut self) -> bool;

    /// Move to the previous record. Returns whether the cursor is still valid.
    fn prev(&mut self) -> bool;

    fn valid(&self) -> bool;

    fn key(&self) -> &InternalKey;

    fn value(&self) -> &[u8];

    /// Release the cursor and report any error accumulated while stepping.
    fn close(&mut self) -> Result<()>;
}

/// Per-scan configuration.
#[derive(Clone, Default)]
pub struct ReadOptions {
    /// Inclusive lower bound on user keys.
    pub lower_bound: Option<Slice>,
    /// Exclusive upper bound on user keys.
    pub upper_bound: Option<Slice>,
}

mod memtable_iterator;
mod user_iterator;

pub use memtable_iterator::MemTableIterator;
pub use user_iterator::UserIterator;
