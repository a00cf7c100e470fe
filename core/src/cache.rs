//! Bounded key-value cache with per-entry TTL and least-recently-used
//! eviction.
//!
//! Entries live in a slot arena threaded by a doubly-linked list ordered from
//! least to most recently touched, with a hash index from key to slot. Every
//! operation is O(1) amortized. The cache itself is not synchronized; callers
//! that share it across threads wrap it in a mutex.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A cached value together with its freshness bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    pub key: K,
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<K, V> CacheEntry<K, V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

#[derive(Debug)]
struct Node<K, V> {
    entry: CacheEntry<K, V>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
pub struct TtlLruCache<K, V> {
    index: HashMap<K, usize>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    /// Least recently touched.
    head: Option<usize>,
    /// Most recently touched.
    tail: Option<usize>,
    max_size: usize,
    default_ttl: Duration,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// `max_size` is clamped to at least one entry.
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            max_size: max_size.max(1),
            default_ttl,
        }
    }

    /// Returns the value for `key` unless it is missing or expired. A hit moves
    /// the entry to the most-recent end; an expired entry is dropped here.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let idx = *self.index.get(key)?;
        let expired = self
            .node(idx)
            .map(|node| node.entry.is_expired(Instant::now()))?;
        if expired {
            self.release(idx);
            return None;
        }

        self.unlink(idx);
        self.push_back(idx);
        self.node(idx).map(|node| node.entry.value.clone())
    }

    pub fn set(&mut self, key: K, value: V) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Inserts `value` as the most recent entry, replacing any previous entry
    /// for the same key and evicting the least recent one when full.
    pub fn set_with_ttl(&mut self, key: K, value: V, ttl: Duration) {
        if let Some(existing) = self.index.get(&key).copied() {
            self.release(existing);
        }

        while self.index.len() >= self.max_size {
            match self.head {
                Some(oldest) => {
                    self.release(oldest);
                }
                None => break,
            }
        }

        let node = Node {
            entry: CacheEntry {
                key: key.clone(),
                value,
                stored_at: Instant::now(),
                ttl,
            },
            prev: None,
            next: None,
        };
        let idx = self.allocate(node);
        self.index.insert(key, idx);
        self.push_back(idx);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = *self.index.get(key)?;
        self.release(idx).map(|node| node.entry.value)
    }

    /// Sweeps every expired entry and returns how many were dropped.
    pub fn cleanup(&mut self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let (next, expired) = match self.node(idx) {
                Some(node) => (node.next, node.entry.is_expired(now)),
                None => break,
            };
            if expired {
                self.release(idx);
                removed += 1;
            }
            cursor = next;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Keys from least to most recently touched.
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(node) = cursor.and_then(|idx| self.node(idx)) {
            keys.push(node.entry.key.clone());
            cursor = node.next;
        }
        keys
    }

    fn node(&self, idx: usize) -> Option<&Node<K, V>> {
        self.slots.get(idx).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, idx: usize) -> Option<&mut Node<K, V>> {
        self.slots.get_mut(idx).and_then(Option::as_mut)
    }

    fn allocate(&mut self, node: Node<K, V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<Node<K, V>> {
        self.unlink(idx);
        let node = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        self.index.remove(&node.entry.key);
        Some(node)
    }

    fn unlink(&mut self, idx: usize) {
        let Some((prev, next)) = self.node(idx).map(|node| (node.prev, node.next)) else {
            return;
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_back(&mut self, idx: usize) {
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(idx) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(t) => {
                if let Some(node) = self.node_mut(t) {
                    node.next = Some(idx);
                }
            }
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }
}
