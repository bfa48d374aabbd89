//! The Store
//!
//! The store owns a [`ProgressiveMap`] of entries plus the three eviction
//! indices, all behind one mutex. Every operation — including expiration
//! and eviction — takes the lock once for its whole logical effect, so the
//! map and the indices can never disagree.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      Store (Mutex)                        │
//! │                                                           │
//! │   ProgressiveMap<key, Entry>      KeyList (LRU, MRU-first)│
//! │         │    │                    LfuIndex (freq buckets) │
//! │         │    └── anchors ───────> TtlIndex (deadlines)    │
//! │         └── value, timestamps, access count               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each entry records where it sits in the LRU list and the LFU index, so
//! every destruction path (delete, expire, evict) unlinks the key from all
//! four structures through a single helper without searching.
//!
//! ## Expiry
//!
//! Keys expire two ways, as in most caches:
//! 1. **Lazy**: `get` and `ttl` check the deadline on access and eagerly
//!    delete an expired entry, indices included.
//! 2. **Active**: the [sweeper](crate::storage::sweeper) walks the TTL index
//!    about once a second and removes everything already due.

use crate::storage::index::{KeyList, LfuAnchor, LfuIndex, TtlIndex};
use crate::storage::map::ProgressiveMap;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A stored record and its index anchors.
pub struct Entry {
    /// The stored payload.
    pub value: Bytes,
    /// When this entry was created.
    pub created_at: Instant,
    /// Deadline after which the entry is gone; `None` means it never expires.
    pub expires_at: Option<Instant>,
    /// Successful `get`s against this entry; doubles as its LFU frequency.
    pub access_count: u64,
    /// This key's node in the LRU list.
    lru_anchor: usize,
    /// This key's frequency bucket and node in the LFU index.
    lfu_anchor: LfuAnchor,
}

impl Entry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Why a `ttl` query produced no remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TtlError {
    /// The key is absent or already expired.
    #[error("key not found")]
    NotFound,
    /// The key exists but carries no expiry.
    #[error("key has no expiry")]
    NoExpiry,
}

/// Everything guarded by the store mutex.
struct StoreInner {
    map: ProgressiveMap<Bytes, Entry>,
    lru: KeyList,
    lfu: LfuIndex,
    ttl: TtlIndex,
}

impl StoreInner {
    /// Removes a key from the map and from every index it appears in.
    /// The single funnel for delete, expire and evict.
    fn remove_key(&mut self, key: &Bytes) -> Option<Entry> {
        let entry = self.map.remove(key)?;
        self.lru.remove(entry.lru_anchor);
        self.lfu.remove(entry.lfu_anchor);
        if let Some(deadline) = entry.expires_at {
            self.ttl.remove(deadline, key);
        }
        Some(entry)
    }

    /// Inserts a fresh entry. A replaced key is fully removed first, so no
    /// prior counter or index position survives.
    fn insert_key(&mut self, key: Bytes, value: Bytes, ttl: Option<Duration>, now: Instant) {
        self.remove_key(&key);

        let expires_at = ttl.map(|ttl| now + ttl);
        let lru_anchor = self.lru.push_front(key.clone());
        let lfu_anchor = self.lfu.insert(0, key.clone());
        if let Some(deadline) = expires_at {
            self.ttl.insert(deadline, key.clone());
        }

        self.map.set(
            key,
            Entry {
                value,
                created_at: now,
                expires_at,
                access_count: 0,
                lru_anchor,
                lfu_anchor,
            },
        );
    }
}

/// Operation counters, readable without the lock.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    /// Keys currently stored.
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    /// Keys removed because their TTL ran out (lazy or swept).
    pub expired: u64,
    /// Keys removed by `lru_evict`/`lfu_evict`.
    pub evicted: u64,
}

/// The cache store shared by every connection and the sweeper.
///
/// Designed to be wrapped in an `Arc`. Returned payloads are `Bytes` clones
/// taken while the lock is held, so nothing borrowed from an entry outlives
/// it.
///
/// # Example
///
/// ```
/// use driftkv::storage::Store;
/// use bytes::Bytes;
///
/// let store = Store::new();
/// store.set(Bytes::from("name"), Bytes::from("drift"));
/// assert_eq!(store.get(&Bytes::from("name")), Some(Bytes::from("drift")));
/// ```
pub struct Store {
    inner: Mutex<StoreInner>,
    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
    evicted_count: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                map: ProgressiveMap::new(),
                lru: KeyList::new(),
                lfu: LfuIndex::new(),
                ttl: TtlIndex::new(),
            }),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
            evicted_count: AtomicU64::new(0),
        }
    }

    /// Reads a key's value.
    ///
    /// A hit bumps the access count, moves the key to the LRU front and
    /// promotes it one LFU bucket. An expired key is deleted on the spot and
    /// reported as absent, regardless of sweeper timing.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let expired = inner.map.lookup(key)?.is_expired(now);
        if expired {
            inner.remove_key(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let entry = inner.map.lookup_mut(key)?;
        entry.access_count += 1;
        inner.lru.move_to_front(entry.lru_anchor);
        if let Some(anchor) = inner.lfu.promote(entry.lfu_anchor) {
            entry.lfu_anchor = anchor;
        }
        Some(entry.value.clone())
    }

    /// Inserts or replaces a key with no expiry.
    pub fn set(&self, key: Bytes, value: Bytes) {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        self.inner.lock().unwrap().insert_key(key, value, None, now);
    }

    /// Inserts or replaces a key that expires after `ttl`.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        self.inner
            .lock()
            .unwrap()
            .insert_key(key, value, Some(ttl), now);
    }

    /// Deletes a key. Returns whether it was present.
    pub fn delete(&self, key: &Bytes) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().unwrap().remove_key(key).is_some()
    }

    /// Remaining whole seconds before `key` expires.
    ///
    /// Like `get`, an expired key is eagerly deleted and reported absent.
    /// The query itself does not count as an access.
    pub fn ttl(&self, key: &Bytes) -> Result<u64, TtlError> {
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let (expired, expires_at) = match inner.map.lookup(key) {
            None => return Err(TtlError::NotFound),
            Some(entry) => (entry.is_expired(now), entry.expires_at),
        };
        if expired {
            inner.remove_key(key);
            self.expired_count.fetch_add(1, Ordering::Relaxed);
            return Err(TtlError::NotFound);
        }

        match expires_at {
            Some(deadline) => Ok(deadline.duration_since(now).as_secs()),
            None => Err(TtlError::NoExpiry),
        }
    }

    /// Drops the least-recently-used key, returning it. `None` when empty.
    pub fn evict_lru(&self) -> Option<Bytes> {
        let mut guard = self.inner.lock().unwrap();
        let key = guard.lru.back().cloned()?;
        guard.remove_key(&key);
        self.evicted_count.fetch_add(1, Ordering::Relaxed);
        Some(key)
    }

    /// Drops the oldest key in the smallest frequency bucket, returning it.
    /// `None` when empty.
    pub fn evict_lfu(&self) -> Option<Bytes> {
        let mut guard = self.inner.lock().unwrap();
        let key = guard.lfu.least().cloned()?;
        guard.remove_key(&key);
        self.evicted_count.fetch_add(1, Ordering::Relaxed);
        Some(key)
    }

    /// Removes every key whose deadline has passed, walking the TTL index in
    /// expiration order. Called by the sweeper; returns how many were
    /// removed.
    pub fn sweep_expired(&self) -> u64 {
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();

        let due = guard.ttl.expired_keys(now);
        let mut removed = 0u64;
        for key in due {
            if guard.remove_key(&key).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            evicted: self.evicted_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.len())
            .field("get_ops", &self.get_count.load(Ordering::Relaxed))
            .field("set_ops", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}
