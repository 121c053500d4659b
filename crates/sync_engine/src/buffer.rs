//! Bounded FIFO buffer with overwrite-oldest semantics.
//!
//! Uses index-based separation:
//! - HeapRb stores slab keys in arrival order
//! - Slab stores the actual samples / frames
//!
//! Eviction and draining only move keys; payloads stay in the slab until
//! they are handed out.

use std::fmt;

use ringbuf::{traits::*, HeapRb};
use slab::Slab;
use tracing::warn;

/// Bounded FIFO keyed by arrival order
pub struct BoundedBuffer<T> {
    /// Buffer name for logs and metrics
    name: &'static str,
    /// Ring buffer of slab keys, oldest first
    index: HeapRb<usize>,
    /// Actual item storage
    storage: Slab<T>,
    capacity: usize,
    dropped_count: u64,
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedBuffer")
            .field("name", &self.name)
            .field("len", &self.index.occupied_len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped_count)
            .finish()
    }
}

impl<T> BoundedBuffer<T> {
    /// Create a buffer holding at most `capacity` items (at least one)
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            index: HeapRb::new(capacity),
            storage: Slab::with_capacity(capacity),
            capacity,
            dropped_count: 0,
        }
    }

    /// Append an item
    ///
    /// If the buffer is full the oldest item is evicted and returned.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.index.is_full() {
            let old = self.index.try_pop().map(|key| self.storage.remove(key));
            self.dropped_count += 1;
            warn!(
                buffer = self.name,
                capacity = self.capacity,
                dropped = self.dropped_count,
                "buffer saturated, oldest entry evicted"
            );
            metrics::counter!("strobe_sync_buffer_saturated_total", "buffer" => self.name)
                .increment(1);
            old
        } else {
            None
        };

        let key = self.storage.insert(item);
        let _ = self.index.try_push(key);
        evicted
    }

    /// Append every item in order
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.push(item);
        }
    }

    /// Remove and return the oldest item
    pub fn pop_front(&mut self) -> Option<T> {
        self.index.try_pop().map(|key| self.storage.remove(key))
    }

    /// Iterate oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.index.iter().filter_map(|k| self.storage.get(*k))
    }

    /// Apply `f` to every buffered item, in no particular order
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut T)) {
        for (_, item) in self.storage.iter_mut() {
            f(item);
        }
    }

    /// Remove everything, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        let keys: Vec<usize> = self.index.pop_iter().collect();
        keys.into_iter().map(|k| self.storage.remove(k)).collect()
    }

    pub fn clear(&mut self) {
        while self.index.try_pop().is_some() {}
        self.storage.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.index.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Items evicted on overflow since creation
    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }
}
