//! Bounded LRU cache mapping a hook-set fingerprint to a resolved build order.
//!
//! Purely advisory: a miss simply forces full recomputation by the
//! verifier. Nothing outside this process ever observes or compares a
//! fingerprint, so it is computed with the standard library's structural
//! hashing rather than a cryptographic digest - there is no persistent
//! cache to protect against collisions across runs.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

pub const DEFAULT_CAPACITY: usize = 64;

/// The ordered shape of a hook set: `(kind, sorted(required), overwrite, source)`
/// tuples in encounter order, the minimal information that determines the
/// topological sort's outcome.
#[derive(Hash)]
pub struct HookShape<'a> {
    pub kind: &'a str,
    pub required: Vec<&'a str>,
    pub overwrite: bool,
    pub source: &'a str,
}

/// `kernel_init` is folded in because it changes which dependencies survive
/// stripping (SPEC_FULL §4.6 step 4), and therefore the topological sort
/// this fingerprint keys - two hook sets identical in shape but differing
/// in kernel-init state must not collide.
pub fn fingerprint(shapes: &[HookShape<'_>], kernel_init: bool) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    kernel_init.hash(&mut hasher);
    for shape in shapes {
        shape.kind.hash(&mut hasher);
        shape.required.hash(&mut hasher);
        shape.overwrite.hash(&mut hasher);
        shape.source.hash(&mut hasher);
    }
    hasher.finish()
}

pub struct DependencyGraphCache {
    capacity: usize,
    entries: HashMap<u64, Vec<String>>,
    recency: VecDeque<u64>,
}

impl DependencyGraphCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    pub fn get(&mut self, key: u64) -> Option<Vec<String>> {
        if self.entries.contains_key(&key) {
            self.touch(key);
            self.entries.get(&key).cloned()
        } else {
            None
        }
    }

    pub fn put(&mut self, key: u64, ordered_kinds: Vec<String>) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.recency.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, ordered_kinds);
        self.touch(key);
    }

    pub fn invalidate(&mut self, key: u64) {
        self.entries.remove(&key);
        self.recency.retain(|k| *k != key);
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    fn touch(&mut self, key: u64) {
        self.recency.retain(|k| *k != key);
        self.recency.push_back(key);
    }
}

impl Default for DependencyGraphCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
