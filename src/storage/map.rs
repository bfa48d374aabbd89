//! Progressive Hash Map
//!
//! A chained hash table that never pays for a full resize in a single
//! operation. Growing or shrinking allocates a second table and migrates a
//! bounded number of bucket chains per public operation, so worst-case
//! latency stays flat even while the table doubles or halves underneath.
//!
//! ## How Incremental Rehashing Works
//!
//! ```text
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │   active (old capacity)  │      │  migrating (new capacity)│
//! │  [0] ∅   <- migrate_pos  │      │  [0] ──> entry ──> entry │
//! │  [1] ──> entry           │ ───> │  [1] ∅                   │
//! │  [2] ──> entry ──> entry │      │  [2] ──> entry           │
//! │  ...                     │      │  ...                     │
//! └──────────────────────────┘      └──────────────────────────┘
//! ```
//!
//! Every `lookup`/`set`/`remove` first moves up to [`REHASH_STEPS`] buckets
//! from `active` into `migrating`, advancing the cursor. Buckets below the
//! cursor are guaranteed empty in `active`. When the cursor reaches the end,
//! `migrating` becomes the new `active` table.
//!
//! ## Rules During a Resize
//!
//! - Lookups check `migrating` first (it holds newer writes for migrated
//!   buckets), then `active`.
//! - Updates happen in place wherever the key currently lives.
//! - Pure inserts go to `migrating` if the key's `active` bucket is below
//!   the cursor, otherwise to `active` so a later migration step moves them.
//! - Load-factor checks are suspended until the migration completes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Capacity of a freshly created (or cleared) map.
const INITIAL_CAPACITY: usize = 16;

/// The table never shrinks below this many buckets.
pub const MIN_CAPACITY: usize = 16;

/// Buckets migrated per public operation while a resize is in progress.
const REHASH_STEPS: usize = 1;

/// Load factor above which the table starts growing.
const LOAD_FACTOR_HIGH: f64 = 0.75;

/// Load factor below which the table starts shrinking.
const LOAD_FACTOR_LOW: f64 = 0.25;

type Link<K, V> = Option<Box<Node<K, V>>>;

/// A single chain node. Chains are singly linked; new nodes are prepended.
struct Node<K, V> {
    key: K,
    value: V,
    next: Link<K, V>,
}

/// One hash table: a power-of-two bucket vector of chains.
struct Table<K, V> {
    buckets: Vec<Link<K, V>>,
    len: usize,
    mask: usize,
}

impl<K: Hash + Eq, V> Table<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        let cap = capacity.next_power_of_two();
        let mut buckets = Vec::with_capacity(cap);
        buckets.resize_with(cap, || None);
        Self {
            buckets,
            len: 0,
            mask: cap - 1,
        }
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    fn find(&self, hash: u64, key: &K) -> Option<&V> {
        let mut link = &self.buckets[self.bucket_of(hash)];
        while let Some(node) = link {
            if node.key == *key {
                return Some(&node.value);
            }
            link = &node.next;
        }
        None
    }

    fn find_mut(&mut self, hash: u64, key: &K) -> Option<&mut V> {
        let idx = self.bucket_of(hash);
        let mut link = &mut self.buckets[idx];
        while let Some(node) = link {
            if node.key == *key {
                return Some(&mut node.value);
            }
            link = &mut node.next;
        }
        None
    }

    /// Splices a node out of its chain and returns it.
    fn remove(&mut self, hash: u64, key: &K) -> Option<(K, V)> {
        let idx = self.bucket_of(hash);
        let mut link = &mut self.buckets[idx];
        loop {
            match link {
                Some(node) if node.key == *key => {
                    let mut removed = link.take();
                    let next = removed.as_mut().unwrap().next.take();
                    *link = next;
                    self.len -= 1;
                    return removed.map(|n| (n.key, n.value));
                }
                Some(node) => {
                    link = &mut node.next;
                }
                None => return None,
            }
        }
    }

    /// Pushes a node onto the head of its bucket chain.
    fn prepend(&mut self, hash: u64, mut node: Box<Node<K, V>>) {
        let idx = self.bucket_of(hash);
        node.next = self.buckets[idx].take();
        self.buckets[idx] = Some(node);
        self.len += 1;
    }

    fn insert(&mut self, hash: u64, key: K, value: V) {
        self.prepend(
            hash,
            Box::new(Node {
                key,
                value,
                next: None,
            }),
        );
    }
}

/// A chained hash map with incremental resizing.
///
/// Logically this behaves like a plain `HashMap`, except that no single
/// operation is ever charged for a full table resize. All operations take
/// `&mut self` because even a lookup advances an in-progress migration.
///
/// # Example
///
/// ```
/// use driftkv::storage::ProgressiveMap;
///
/// let mut map = ProgressiveMap::new();
/// map.set("answer", 42);
/// assert_eq!(map.lookup(&"answer"), Some(&42));
/// assert_eq!(map.remove(&"answer"), Some(42));
/// assert!(map.is_empty());
/// ```
pub struct ProgressiveMap<K, V> {
    /// The primary table. Outside a resize, holds every entry.
    active: Table<K, V>,
    /// The resize target; `Some` exactly while a migration is in progress.
    migrating: Option<Table<K, V>>,
    /// Migration cursor: buckets of `active` below this index are empty.
    migrate_pos: usize,
}

impl<K: Hash + Eq, V> ProgressiveMap<K, V> {
    pub fn new() -> Self {
        Self {
            active: Table::with_capacity(INITIAL_CAPACITY),
            migrating: None,
            migrate_pos: 0,
        }
    }

    /// Hashes a key. The function is fixed for the process lifetime so
    /// entries rehash to a deterministic bucket during migration.
    fn hash_key(key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Looks up a key, advancing any in-progress resize first.
    pub fn lookup(&mut self, key: &K) -> Option<&V> {
        self.help_resizing();
        let hash = Self::hash_key(key);
        let Self {
            active, migrating, ..
        } = self;
        if let Some(target) = migrating {
            if let Some(value) = target.find(hash, key) {
                return Some(value);
            }
        }
        active.find(hash, key)
    }

    /// Like [`lookup`](Self::lookup), but returns a mutable reference.
    pub fn lookup_mut(&mut self, key: &K) -> Option<&mut V> {
        self.help_resizing();
        let hash = Self::hash_key(key);
        let Self {
            active, migrating, ..
        } = self;
        if let Some(target) = migrating {
            if let Some(value) = target.find_mut(hash, key) {
                return Some(value);
            }
        }
        active.find_mut(hash, key)
    }

    /// Inserts or updates a key. Updates happen in place wherever the key
    /// lives; pure inserts are routed so the migration invariant holds.
    pub fn set(&mut self, key: K, value: V) {
        self.help_resizing();
        let hash = Self::hash_key(&key);
        {
            let Self {
                active, migrating, ..
            } = &mut *self;
            if let Some(target) = migrating {
                if let Some(slot) = target.find_mut(hash, &key) {
                    *slot = value;
                    return;
                }
            }
            if let Some(slot) = active.find_mut(hash, &key) {
                *slot = value;
                return;
            }
        }
        self.insert_table(hash).insert(hash, key, value);
        self.check_load_factor();
    }

    /// Removes a key, returning its value if present. May start a shrink.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.help_resizing();
        let hash = Self::hash_key(key);
        let mut removed = None;
        if let Some(target) = self.migrating.as_mut() {
            removed = target.remove(hash, key);
        }
        if removed.is_none() {
            removed = self.active.remove(hash, key);
        }
        if removed.is_some() {
            self.check_load_factor();
        }
        removed.map(|(_, value)| value)
    }

    /// Total number of entries across both tables.
    pub fn len(&self) -> usize {
        self.active.len + self.migrating.as_ref().map_or(0, |t| t.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket count of the primary table.
    pub fn capacity(&self) -> usize {
        self.active.buckets.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.len() as f64 / self.capacity() as f64
    }

    /// True while a migration is in progress.
    pub fn is_resizing(&self) -> bool {
        self.migrating.is_some()
    }

    /// Drops every entry and resets to the initial capacity.
    pub fn clear(&mut self) {
        self.active = Table::with_capacity(INITIAL_CAPACITY);
        self.migrating = None;
        self.migrate_pos = 0;
    }

    /// Visits every present entry exactly once: the migration target first,
    /// then the primary table. No key ordering is promised. The map must not
    /// be mutated while iterating; callers hold the store lock.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut tables = Vec::with_capacity(2);
        if let Some(target) = &self.migrating {
            tables.push(target);
        }
        tables.push(&self.active);
        Iter {
            tables,
            table: 0,
            bucket: 0,
            node: None,
        }
    }

    /// Moves up to [`REHASH_STEPS`] buckets from `active` into `migrating`.
    /// Finishing the walk promotes `migrating` to `active`.
    fn help_resizing(&mut self) {
        let Self {
            active,
            migrating,
            migrate_pos,
        } = self;
        let Some(target) = migrating.as_mut() else {
            return;
        };

        let mut moved = 0;
        while moved < REHASH_STEPS && *migrate_pos < active.buckets.len() {
            let mut chain = active.buckets[*migrate_pos].take();
            while let Some(mut node) = chain {
                chain = node.next.take();
                let hash = Self::hash_key(&node.key);
                target.prepend(hash, node);
                active.len -= 1;
            }
            *migrate_pos += 1;
            moved += 1;
        }

        if *migrate_pos >= active.buckets.len() {
            if let Some(fresh) = migrating.take() {
                *active = fresh;
            }
            *migrate_pos = 0;
            // A completed shrink can leave the load factor still below the
            // low-water mark; chain the next resize so a drained map keeps
            // stepping down toward the minimum capacity.
            self.check_load_factor();
        }
    }

    /// Picks the table a pure insert must land in. During a resize, a key
    /// whose `active` bucket was already migrated goes straight to the
    /// target table; otherwise it joins the chain a future step will move.
    fn insert_table(&mut self, hash: u64) -> &mut Table<K, V> {
        let idx = hash as usize & self.active.mask;
        match self.migrating.as_mut() {
            Some(target) if idx < self.migrate_pos => target,
            _ => &mut self.active,
        }
    }

    /// Starts a grow or shrink when the primary table's load factor crosses
    /// a threshold. Never fires while a resize is already in progress.
    fn check_load_factor(&mut self) {
        if self.migrating.is_some() {
            return;
        }
        let load = self.active.len as f64 / self.active.buckets.len() as f64;
        if load > LOAD_FACTOR_HIGH {
            self.migrating = Some(Table::with_capacity(self.active.buckets.len() * 2));
            self.migrate_pos = 0;
        } else if load < LOAD_FACTOR_LOW && self.active.buckets.len() > MIN_CAPACITY {
            self.migrating = Some(Table::with_capacity(self.active.buckets.len() / 2));
            self.migrate_pos = 0;
        }
    }
}

impl<K: Hash + Eq, V> Default for ProgressiveMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward iterator over `(&K, &V)` pairs. See [`ProgressiveMap::iter`].
pub struct Iter<'a, K, V> {
    tables: Vec<&'a Table<K, V>>,
    table: usize,
    bucket: usize,
    node: Option<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                self.node = node.next.as_deref();
                return Some((&node.key, &node.value));
            }
            let table: &'a Table<K, V> = *self.tables.get(self.table)?;
            if self.bucket < table.buckets.len() {
                self.node = table.buckets[self.bucket].as_deref();
                self.bucket += 1;
            } else {
                self.table += 1;
                self.bucket = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    /// Asserts the structural invariants: every bucket of `active` below the
    /// cursor is empty while a resize is in progress, and the per-table
    /// length counters match the chains.
    fn check_invariants(map: &ProgressiveMap<u64, u64>) {
        if map.migrating.is_some() {
            for idx in 0..map.migrate_pos {
                assert!(
                    map.active.buckets[idx].is_none(),
                    "bucket {} below cursor {} is not empty",
                    idx,
                    map.migrate_pos
                );
            }
        } else {
            assert_eq!(map.migrate_pos, 0);
        }

        let mut counted = 0;
        for bucket in &map.active.buckets {
            let mut link = bucket;
            while let Some(node) = link {
                counted += 1;
                link = &node.next;
            }
        }
        assert_eq!(counted, map.active.len);

        if let Some(target) = &map.migrating {
            let mut counted = 0;
            for bucket in &target.buckets {
                let mut link = bucket;
                while let Some(node) = link {
                    counted += 1;
                    link = &node.next;
                }
            }
            assert_eq!(counted, target.len);
        }
    }

    /// Tiny deterministic generator so the reference-model test covers a
    /// mixed workload without pulling in an RNG.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            self.0 >> 33
        }
    }

    #[test]
    fn set_lookup_remove() {
        let mut map = ProgressiveMap::new();

        map.set("key", "value");
        assert_eq!(map.lookup(&"key"), Some(&"value"));
        assert_eq!(map.len(), 1);

        map.set("key", "updated");
        assert_eq!(map.lookup(&"key"), Some(&"updated"));
        assert_eq!(map.len(), 1);

        assert_eq!(map.remove(&"key"), Some("updated"));
        assert_eq!(map.lookup(&"key"), None);
        assert!(map.is_empty());
        assert_eq!(map.remove(&"key"), None);
    }

    #[test]
    fn lookup_mut_updates_in_place() {
        let mut map = ProgressiveMap::new();
        map.set(1u64, 10u64);

        *map.lookup_mut(&1).unwrap() += 5;
        assert_eq!(map.lookup(&1), Some(&15));
    }

    #[test]
    fn grow_preserves_entries() {
        let mut map = ProgressiveMap::new();

        for i in 0..1000u64 {
            map.set(i, i * 2);
            check_invariants(&map);
        }

        assert_eq!(map.len(), 1000);
        assert!(map.capacity() >= 1024);

        for i in 0..1000u64 {
            assert_eq!(map.lookup(&i), Some(&(i * 2)), "key {} lost", i);
        }
    }

    #[test]
    fn resize_is_incremental() {
        let mut map = ProgressiveMap::new();

        // 13 inserts push load factor past 0.75 at capacity 16.
        for i in 0..13u64 {
            map.set(i, i);
        }
        assert!(map.is_resizing());

        // The resize finishes within a bounded number of further operations.
        for _ in 0..map.capacity() + 1 {
            map.lookup(&0);
            check_invariants(&map);
        }
        assert!(!map.is_resizing());
        assert_eq!(map.capacity(), 32);
        assert_eq!(map.len(), 13);
    }

    #[test]
    fn shrink_returns_to_min_capacity() {
        let mut map = ProgressiveMap::new();

        for i in 0..1000u64 {
            map.set(i, i);
        }
        for i in 0..1000u64 {
            map.remove(&i);
            check_invariants(&map);
        }
        assert_eq!(map.len(), 0);

        // Pump operations until every pending shrink has drained.
        for _ in 0..10_000 {
            map.lookup(&0);
            if !map.is_resizing() && map.capacity() == MIN_CAPACITY {
                break;
            }
        }
        assert!(!map.is_resizing());
        assert_eq!(map.capacity(), MIN_CAPACITY);
    }

    #[test]
    fn load_factor_stays_bounded_under_inserts() {
        let mut map = ProgressiveMap::new();

        for i in 0..10_000u64 {
            map.set(i, i);
            if !map.is_resizing() {
                assert!(
                    map.load_factor() <= LOAD_FACTOR_HIGH + f64::EPSILON,
                    "load factor {} exceeds threshold at size {}",
                    map.load_factor(),
                    map.len()
                );
            }
        }
    }

    #[test]
    fn matches_reference_model() {
        let mut map = ProgressiveMap::new();
        let mut reference: HashMap<u64, u64> = HashMap::new();
        let mut rng = Lcg(0x5eed);

        for step in 0..20_000 {
            let key = rng.next() % 512;
            match rng.next() % 4 {
                0 => {
                    let value = rng.next();
                    map.set(key, value);
                    reference.insert(key, value);
                }
                1 => {
                    assert_eq!(map.remove(&key), reference.remove(&key), "step {}", step);
                }
                _ => {
                    assert_eq!(map.lookup(&key), reference.get(&key), "step {}", step);
                }
            }
            assert_eq!(map.len(), reference.len());
            check_invariants(&map);
        }

        for (key, value) in &reference {
            assert_eq!(map.lookup(key), Some(value));
        }
    }

    #[test]
    fn updates_during_resize_land_in_one_table() {
        let mut map = ProgressiveMap::new();

        for i in 0..13u64 {
            map.set(i, i);
        }
        assert!(map.is_resizing());

        // Overwrite and insert mid-migration, then confirm visibility.
        map.set(0, 100);
        map.set(500, 501);
        assert_eq!(map.lookup(&0), Some(&100));
        assert_eq!(map.lookup(&500), Some(&501));
        assert_eq!(map.len(), 14);
        check_invariants(&map);
    }

    #[test]
    fn iter_visits_each_key_once() {
        let mut map = ProgressiveMap::new();

        for i in 0..100u64 {
            map.set(i, i);
        }
        // Leave a resize mid-flight so iteration covers both tables.
        assert!(map.is_resizing() || map.len() == 100);

        let seen: HashSet<u64> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(seen.len(), 100);
        assert_eq!(map.iter().count(), 100);
        for i in 0..100u64 {
            assert!(seen.contains(&i));
        }
    }

    #[test]
    fn clear_resets_capacity() {
        let mut map = ProgressiveMap::new();

        for i in 0..1000u64 {
            map.set(i, i);
        }
        map.clear();

        assert!(map.is_empty());
        assert!(!map.is_resizing());
        assert_eq!(map.capacity(), INITIAL_CAPACITY);
        assert_eq!(map.lookup(&1), None);
    }
}
