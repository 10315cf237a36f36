use std::cmp::Ordering;
use std::sync::Arc;

use log::error;

use crate::iterator::{InternalIterator, ReadOptions};
use crate::memtable::RecordKind;
use crate::merge::MergeOperator;
use crate::snapshot::Snapshot;
use crate::util::{Comparator, Result, Status};

/// Where the inner cursor sits relative to the entry currently exposed.
///
/// `Cur`: on a record of the exposed user key. `Next`: on the first record
/// of the user key after it. `Prev`: on the last-encountered record of the
/// user key before it. Direction changes consult this to decide how many
/// whole-key skips are owed before collapsing again; it cannot be
/// reconstructed by peeking at the inner cursor.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pos {
    Cur,
    Next,
    Prev,
}

/// Which storage currently backs the exposed value.
///
/// At most one of the two owned buffers holds the value at a time; the
/// other is scratch for the next merge fold.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ValueSlot {
    /// Borrowed from the inner cursor's current record.
    Inner,
    /// `value_buf` holds it (forward merge accumulation).
    Buf,
    /// `value_buf2` holds it (reverse accumulation).
    Buf2,
}

/// Ordered iterator over a table's live user keys.
///
/// Collapses the versioned record stream of an [`InternalIterator`] into
/// one entry per user key: the newest `Set` wins, a `Delete` hides
/// everything older, consecutive `Merge` operands fold into a single value,
/// and range tombstones pass through as if absent. Entries arrive in
/// strictly ascending user-key order under `next` and strictly descending
/// order under `prev`, clipped to the configured bounds.
///
/// An iterator must be closed after use, but it is not necessary to read it
/// until exhaustion. A single iterator is not thread-safe; separate
/// iterators over the same table are independent.
///
/// `key()` and `value()` borrow iterator-owned storage and are invalidated
/// by the next repositioning call; callers that need them longer must copy.
///
/// The first error encountered is sticky: every later cursor operation is a
/// no-op reporting an invalid position, and `error()`/`close()` return the
/// recorded error.
pub struct UserIterator<I: InternalIterator> {
    opts: ReadOptions,
    cmp: Arc<dyn Comparator>,
    merge: Arc<dyn MergeOperator>,
    inner: I,
    snapshot: Option<Snapshot>,
    err: Option<Status>,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
    value_buf2: Vec<u8>,
    value_slot: ValueSlot,
    valid: bool,
    pos: Pos,
}

impl<I: InternalIterator> UserIterator<I> {
    pub fn new(
        opts: ReadOptions,
        cmp: Arc<dyn Comparator>,
        merge: Arc<dyn MergeOperator>,
        inner: I,
        snapshot: Option<Snapshot>,
    ) -> Self {
        UserIterator {
            opts,
            cmp,
            merge,
            inner,
            snapshot,
            err: None,
            key_buf: Vec::new(),
            value_buf: Vec::new(),
            value_buf2: Vec::new(),
            value_slot: ValueSlot::Inner,
            valid: false,
            pos: Pos::Cur,
        }
    }

    /// Collapse starting from the inner cursor's current record, which must
    /// be the newest visible version of some user key (or past the end).
    /// Emits the first live user key at or after it that is under the upper
    /// bound.
    fn find_next_entry(&mut self) -> bool {
        self.valid = false;
        self.pos = Pos::Cur;

        while self.inner.valid() {
            if let Some(upper) = &self.opts.upper_bound {
                if self.cmp.compare(self.inner.key().user_key(), upper.data()) != Ordering::Less {
                    break;
                }
            }

            match RecordKind::from_u8(self.inner.key().kind()) {
                Some(RecordKind::Delete) => {
                    // The newest version is a tombstone; the whole key is
                    // dead. Move past its remaining versions.
                    self.next_user_key();
                }

                Some(RecordKind::RangeDelete) => {
                    self.inner.next();
                }

                Some(RecordKind::Set) => {
                    self.key_buf.clear();
                    self.key_buf.extend_from_slice(self.inner.key().user_key());
                    self.value_slot = ValueSlot::Inner;
                    self.valid = true;
                    return true;
                }

                Some(RecordKind::Merge) => return self.merge_next(),

                None => {
                    let kind = self.inner.key().kind();
                    self.fail_kind(kind);
                    return false;
                }
            }
        }

        false
    }

    /// Step the inner cursor forward until the user key changes, using the
    /// cursor's current user key as the reference. On an exhausted cursor
    /// this repositions to the first record instead, so that `next` after
    /// exhaustion restarts the scan.
    fn next_user_key(&mut self) {
        if self.inner.valid() {
            self.key_buf.clear();
            self.key_buf.extend_from_slice(self.inner.key().user_key());
            while self.inner.next() {
                if self.cmp.compare(&self.key_buf, self.inner.key().user_key()) != Ordering::Equal
                {
                    break;
                }
            }
        } else {
            self.inner.seek_to_first();
        }
    }

    /// Collapse backward from the inner cursor's current record.
    ///
    /// Walking backward meets each user key's versions oldest-first, so the
    /// candidate entry is accumulated (newer `Set`s overwrite it, newer
    /// `Delete`s discard it, newer `Merge`s fold into it) and emitted only
    /// once the cursor crosses into the preceding user key or leaves the
    /// lower bound.
    fn find_prev_entry(&mut self) -> bool {
        self.valid = false;
        self.pos = Pos::Cur;

        while self.inner.valid() {
            if let Some(lower) = &self.opts.lower_bound {
                if self.cmp.compare(self.inner.key().user_key(), lower.data()) == Ordering::Less {
                    break;
                }
            }

            if self.valid
                && self.cmp.compare(self.inner.key().user_key(), &self.key_buf) == Ordering::Less
            {
                // Crossed the boundary; the accumulated entry is complete.
                self.pos = Pos::Prev;
                return true;
            }

            match RecordKind::from_u8(self.inner.key().kind()) {
                Some(RecordKind::Delete) => {
                    self.valid = false;
                    self.inner.prev();
                }

                Some(RecordKind::RangeDelete) => {
                    self.inner.prev();
                }

                Some(RecordKind::Set) => {
                    self.save_current();
                    self.valid = true;
                    self.inner.prev();
                }

                Some(RecordKind::Merge) => {
                    if self.valid {
                        self.fold_backward();
                    } else {
                        self.save_current();
                        self.valid = true;
                    }
                    self.inner.prev();
                }

                None => {
                    let kind = self.inner.key().kind();
                    self.fail_kind(kind);
                    return false;
                }
            }
        }

        if self.valid {
            self.pos = Pos::Prev;
            return true;
        }
        false
    }

    /// Step the inner cursor backward until the user key changes, using the
    /// cursor's current user key as the reference; repositions to the last
    /// record when the cursor is exhausted.
    fn prev_user_key(&mut self) {
        if self.inner.valid() {
            self.key_buf.clear();
            self.key_buf.extend_from_slice(self.inner.key().user_key());
            while self.inner.prev() {
                if self.cmp.compare(&self.key_buf, self.inner.key().user_key()) != Ordering::Equal
                {
                    break;
                }
            }
        } else {
            self.inner.seek_to_last();
        }
    }

    /// Forward fold for a user key whose newest record is a `Merge`: absorb
    /// older records until a `Set` (folded in), a `Delete` (consumed, not
    /// folded), the next user key, or the end of the stream.
    fn merge_next(&mut self) -> bool {
        self.key_buf.clear();
        self.key_buf.extend_from_slice(self.inner.key().user_key());
        self.value_buf.clear();
        self.value_buf.extend_from_slice(self.inner.value());
        self.value_slot = ValueSlot::Buf;
        self.valid = true;

        loop {
            if !self.inner.next() {
                self.pos = Pos::Next;
                return true;
            }
            if self.cmp.compare(&self.key_buf, self.inner.key().user_key()) != Ordering::Equal {
                // Parked on the first record of the successor key.
                self.pos = Pos::Next;
                return true;
            }
            match RecordKind::from_u8(self.inner.key().kind()) {
                Some(RecordKind::Delete) => {
                    // The tombstone bounds the fold; everything newer is the
                    // result. Still on the emitted key, so pos stays Cur.
                    return true;
                }

                Some(RecordKind::RangeDelete) => continue,

                Some(RecordKind::Set) => {
                    self.fold_forward();
                    return true;
                }

                Some(RecordKind::Merge) => {
                    self.fold_forward();
                }

                None => {
                    let kind = self.inner.key().kind();
                    self.fail_kind(kind);
                    return false;
                }
            }
        }
    }

    /// Fold the inner cursor's (older) record into the value accumulated in
    /// `value_buf`, writing through the scratch buffer so operands never
    /// alias. The result ends up back in `value_buf`.
    fn fold_forward(&mut self) {
        self.value_buf2.clear();
        self.merge.merge(
            &self.key_buf,
            &self.value_buf,
            self.inner.value(),
            &mut self.value_buf2,
        );
        std::mem::swap(&mut self.value_buf, &mut self.value_buf2);
    }

    /// Fold the inner cursor's (newer) record into the value accumulated in
    /// `value_buf2`. The result ends up back in `value_buf2`.
    fn fold_backward(&mut self) {
        self.value_buf.clear();
        self.merge.merge(
            &self.key_buf,
            self.inner.value(),
            &self.value_buf2,
            &mut self.value_buf,
        );
        std::mem::swap(&mut self.value_buf, &mut self.value_buf2);
    }

    /// Copy the inner cursor's record into the owned key and reverse-value
    /// buffers. Reverse accumulation must survive backward steps, which
    /// invalidate the inner cursor's slices.
    fn save_current(&mut self) {
        self.key_buf.clear();
        self.key_buf.extend_from_slice(self.inner.key().user_key());
        self.value_buf2.clear();
        self.value_buf2.extend_from_slice(self.inner.value());
        self.value_slot = ValueSlot::Buf2;
    }

    fn fail_kind(&mut self, kind: u8) {
        error!("invalid internal record kind: {kind}");
        self.err = Some(Status::corruption(format!(
            "invalid internal record kind: {kind}"
        )));
        self.valid = false;
    }

    /// Move to the first entry whose user key is >= `key` (raised to the
    /// lower bound if one is set).
    pub fn seek_ge(&mut self, key: &[u8]) {
        if self.err.is_some() {
            return;
        }

        let mut key = key;
        if let Some(lower) = &self.opts.lower_bound {
            if self.cmp.compare(key, lower.data()) == Ordering::Less {
                key = lower.data();
            }
        }

        self.inner.seek_ge(key);
        self.find_next_entry();
    }

    /// Move to the last entry whose user key is < `key` (lowered to the
    /// upper bound if one is set).
    pub fn seek_lt(&mut self, key: &[u8]) {
        if self.err.is_some() {
            return;
        }

        let mut key = key;
        if let Some(upper) = &self.opts.upper_bound {
            if self.cmp.compare(key, upper.data()) != Ordering::Less {
                key = upper.data();
            }
        }

        self.inner.seek_lt(key);
        self.find_prev_entry();
    }

    /// Move to the first entry.
    pub fn seek_to_first(&mut self) {
        if self.err.is_some() {
            return;
        }

        if let Some(lower) = &self.opts.lower_bound {
            self.inner.seek_ge(lower.data());
        } else {
            self.inner.seek_to_first();
        }
        self.find_next_entry();
    }

    /// Move to the last entry.
    pub fn seek_to_last(&mut self) {
        if self.err.is_some() {
            return;
        }

        if let Some(upper) = &self.opts.upper_bound {
            self.inner.seek_lt(upper.data());
        } else {
            self.inner.seek_to_last();
        }
        self.find_prev_entry();
    }

    /// Move to the next entry. Returns whether the iterator is positioned
    /// at a valid entry.
    pub fn next(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        match self.pos {
            Pos::Cur => self.next_user_key(),
            Pos::Prev => {
                // The inner cursor is a whole user key behind the exposed
                // entry: skip the key before it, then the entry's own key.
                self.next_user_key();
                self.next_user_key();
            }
            Pos::Next => {}
        }
        self.find_next_entry()
    }

    /// Move to the previous entry. Returns whether the iterator is
    /// positioned at a valid entry.
    pub fn prev(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }
        match self.pos {
            Pos::Cur => self.prev_user_key(),
            Pos::Next => {
                self.prev_user_key();
                self.prev_user_key();
            }
            Pos::Prev => {}
        }
        self.find_prev_entry()
    }

    /// The current entry's user key, or None if the iterator is not
    /// positioned at an entry. Invalidated by the next repositioning call.
    pub fn key(&self) -> Option<&[u8]> {
        if self.valid {
            Some(&self.key_buf)
        } else {
            None
        }
    }

    /// The current entry's collapsed value, or None if the iterator is not
    /// positioned at an entry. Invalidated by the next repositioning call.
    pub fn value(&self) -> Option<&[u8]> {
        if !self.valid {
            return None;
        }
        Some(match self.value_slot {
            ValueSlot::Inner => self.inner.value(),
            ValueSlot::Buf => &self.value_buf,
            ValueSlot::Buf2 => &self.value_buf2,
        })
    }

    /// Whether the iterator is positioned at a valid entry.
    pub fn valid(&self) -> bool {
        self.valid
    }

    /// Any accumulated error.
    pub fn error(&self) -> Option<&Status> {
        self.err.as_ref()
    }

    /// Release the snapshot (on the first call only) and close the inner
    /// cursor, then report the accumulated error. Safe to call more than
    /// once. The inner's close error only replaces an already-recorded one.
    pub fn close(&mut self) -> Result<()> {
        self.snapshot = None;
        if let Err(inner_err) = self.inner.close() {
            if self.err.is_some() {
                self.err = Some(inner_err);
            }
        }
        match &self.err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
