//! A small hand-rolled FIFO cache, keyed by the content hash of whatever text it's asked to
//! tokenize, for scope headers and change bodies. A plain `HashMap` plus an eviction queue is
//! all that's needed — pulling in `dashmap`/`lru-mem` for a single-threaded, per-driver cache
//! would be dependency-for-its-own-sake.

use std::collections::HashMap;
use std::collections::VecDeque;

/// A bounded FIFO cache from `String` key to `V`. Oldest entry is evicted first once the cache
/// is at capacity; there is no recency tracking (a straight FIFO, not an LRU) — reference
/// tokenization doesn't need anything more elaborate.
#[derive(Debug, Clone)]
pub struct FifoCache<V> {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, V>,
}

impl<V> FifoCache<V> {
    pub fn new(capacity: usize) -> Self {
        FifoCache {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, value: V) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stable content-hash key for some text, used as the cache key so identical bodies seen in
/// different spans (or across commits) share one tokenization.
pub fn content_key(text: &str) -> String {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in text.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{hash:016x}")
}
