//! Eviction Indices
//!
//! Three auxiliary structures track every stored key for eviction and
//! expiration, always mutated in lock-step with the map that owns the
//! entries:
//!
//! - [`KeyList`] — an arena-backed doubly-linked list with stable handles.
//!   Used directly as the LRU recency list (most-recently-used at the
//!   front) and as each LFU frequency bucket.
//! - [`LfuIndex`] — frequency → [`KeyList`] buckets in a `BTreeMap`, so the
//!   smallest frequency is always the first entry. Within a bucket, keys are
//!   ordered by when they entered it; the back is the eviction candidate.
//! - [`TtlIndex`] — deadlines ordered by `(expires_at, key)` for an
//!   ascending expiration walk.
//!
//! Handles returned by [`KeyList::push_front`] stay valid until the slot is
//! removed; the store records them inside each entry so any key can be
//! unlinked in O(1) without a search.

use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Sentinel slot index meaning "no neighbor".
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Slot {
    /// `None` marks a slot on the free list.
    key: Option<Bytes>,
    prev: usize,
    next: usize,
}

/// A doubly-linked list of keys stored in a slot arena.
///
/// Slots are reused through a free list, so a handle (slot index) handed out
/// by [`push_front`](Self::push_front) remains stable until that exact entry
/// is removed. All operations are O(1).
#[derive(Debug)]
pub struct KeyList {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
}

impl Default for KeyList {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyList {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a key at the front and returns its handle.
    pub fn push_front(&mut self, key: Bytes) -> usize {
        let handle = match self.free.pop() {
            Some(idx) => {
                self.slots[idx].key = Some(key);
                idx
            }
            None => {
                self.slots.push(Slot {
                    key: Some(key),
                    prev: NIL,
                    next: NIL,
                });
                self.slots.len() - 1
            }
        };
        self.link_front(handle);
        self.len += 1;
        handle
    }

    /// Removes the entry behind `handle`, returning its key. Returns `None`
    /// if the handle does not name a live entry.
    pub fn remove(&mut self, handle: usize) -> Option<Bytes> {
        let key = self.slots.get_mut(handle)?.key.take()?;
        self.unlink(handle);
        self.free.push(handle);
        self.len -= 1;
        Some(key)
    }

    /// Splices an existing entry to the front of the list.
    pub fn move_to_front(&mut self, handle: usize) {
        if self.head == handle {
            return;
        }
        self.unlink(handle);
        self.link_front(handle);
    }

    /// The key at the back of the list, if any.
    pub fn back(&self) -> Option<&Bytes> {
        if self.tail == NIL {
            return None;
        }
        self.slots[self.tail].key.as_ref()
    }

    /// Removes and returns the key at the back of the list.
    pub fn pop_back(&mut self) -> Option<Bytes> {
        if self.tail == NIL {
            return None;
        }
        self.remove(self.tail)
    }

    /// Iterates front to back.
    pub fn iter(&self) -> KeyIter<'_> {
        KeyIter {
            list: self,
            cursor: self.head,
        }
    }

    fn link_front(&mut self, handle: usize) {
        self.slots[handle].prev = NIL;
        self.slots[handle].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = handle;
        }
        self.head = handle;
        if self.tail == NIL {
            self.tail = handle;
        }
    }

    fn unlink(&mut self, handle: usize) {
        let Slot { prev, next, .. } = self.slots[handle];
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
    }
}

/// Front-to-back iterator over a [`KeyList`].
pub struct KeyIter<'a> {
    list: &'a KeyList,
    cursor: usize,
}

impl<'a> Iterator for KeyIter<'a> {
    type Item = &'a Bytes;

    fn next(&mut self) -> Option<&'a Bytes> {
        if self.cursor == NIL {
            return None;
        }
        let slot = &self.list.slots[self.cursor];
        self.cursor = slot.next;
        slot.key.as_ref()
    }
}

/// An anchor locating a key inside the LFU index: its frequency bucket and
/// its handle within that bucket's list.
pub type LfuAnchor = (u64, usize);

/// The frequency index backing LFU eviction.
///
/// Keys live in the bucket whose frequency equals their access count. A
/// bucket left empty by a removal is dropped immediately, so the first map
/// entry is always the populated minimum frequency.
#[derive(Debug, Default)]
pub struct LfuIndex {
    buckets: BTreeMap<u64, KeyList>,
}

impl LfuIndex {
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }

    /// Adds a key to the front of its frequency bucket.
    pub fn insert(&mut self, frequency: u64, key: Bytes) -> LfuAnchor {
        let handle = self.buckets.entry(frequency).or_default().push_front(key);
        (frequency, handle)
    }

    /// Unlinks the key behind `anchor`, dropping its bucket if emptied.
    pub fn remove(&mut self, anchor: LfuAnchor) -> Option<Bytes> {
        let (frequency, handle) = anchor;
        let bucket = self.buckets.get_mut(&frequency)?;
        let key = bucket.remove(handle);
        if bucket.is_empty() {
            self.buckets.remove(&frequency);
        }
        key
    }

    /// Moves a key from its current bucket to the next-higher frequency,
    /// returning the new anchor.
    pub fn promote(&mut self, anchor: LfuAnchor) -> Option<LfuAnchor> {
        let key = self.remove(anchor)?;
        Some(self.insert(anchor.0 + 1, key))
    }

    /// The eviction candidate: the oldest key in the smallest-frequency
    /// bucket.
    pub fn least(&self) -> Option<&Bytes> {
        self.buckets.first_key_value()?.1.back()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(KeyList::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Expiration deadlines ordered by `(expires_at, key)`.
///
/// Contains exactly the keys that carry a TTL. Removal needs the exact
/// deadline the key was inserted with, which the store keeps in the entry.
#[derive(Debug, Default)]
pub struct TtlIndex {
    deadlines: BTreeSet<(Instant, Bytes)>,
}

impl TtlIndex {
    pub fn new() -> Self {
        Self {
            deadlines: BTreeSet::new(),
        }
    }

    pub fn insert(&mut self, expires_at: Instant, key: Bytes) {
        self.deadlines.insert((expires_at, key));
    }

    pub fn remove(&mut self, expires_at: Instant, key: &Bytes) -> bool {
        self.deadlines.remove(&(expires_at, key.clone()))
    }

    /// Keys whose deadline is at or before `now`, in expiration order.
    pub fn expired_keys(&self, now: Instant) -> Vec<Bytes> {
        self.deadlines
            .iter()
            .take_while(|(deadline, _)| *deadline <= now)
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
