//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::MemTableEntry;
use crate::backend::BatchOp;

/// Fixed per-entry bookkeeping charge added to key/value lengths
const ENTRY_OVERHEAD: usize = 32;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, MemTableEntry>>,
    /// Approximate size in bytes
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    ///
    /// `Some(Tombstone)` means the key was deleted here and older data must
    /// not be consulted.
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair (write lock). Returns the new approximate size.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        Self::insert_locked(&mut data, &self.size, key, MemTableEntry::Value(value))
    }

    /// Delete a key (write lock, inserts tombstone). Returns the new size.
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let mut data = self.data.write();
        Self::insert_locked(&mut data, &self.size, key, MemTableEntry::Tombstone)
    }

    /// Apply a batch in order under a single write guard. Returns the new size.
    pub fn apply(&self, ops: Vec<BatchOp>) -> usize {
        let mut data = self.data.write();
        let mut size = self.size.load(Ordering::SeqCst);
        for op in ops {
            size = match op {
                BatchOp::Put { key, value } => {
                    Self::insert_locked(&mut data, &self.size, key, MemTableEntry::Value(value))
                }
                BatchOp::Delete { key } => {
                    Self::insert_locked(&mut data, &self.size, key, MemTableEntry::Tombstone)
                }
            };
        }
        size
    }

    fn insert_locked(
        data: &mut BTreeMap<Vec<u8>, MemTableEntry>,
        size: &AtomicUsize,
        key: Vec<u8>,
        entry: MemTableEntry,
    ) -> usize {
        let added = charge(&key, &entry);
        let removed = data
            .get(&key)
            .map(|old| charge(&key, old))
            .unwrap_or(0);
        data.insert(key, entry);

        let current = size.load(Ordering::SeqCst);
        let updated = (current + added).saturating_sub(removed);
        size.store(updated, Ordering::SeqCst);
        updated
    }

    /// Entries with key >= `start`, in key order, at most `limit` of them.
    /// Tombstones are included (as `None`) so callers can shadow older data.
    pub fn range_from(&self, start: &[u8], limit: usize) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.data
            .read()
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .take(limit)
            .map(|(k, e)| (k.clone(), e.clone().into_value()))
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot iterator over all entries in sorted key order (for flush)
    pub fn iter(&self) -> MemTableIterator {
        let entries: Vec<_> = self
            .data
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        MemTableIterator {
            inner: entries.into_iter(),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

fn charge(key: &[u8], entry: &MemTableEntry) -> usize {
    let value_len = match entry {
        MemTableEntry::Value(v) => v.len(),
        MemTableEntry::Tombstone => 0,
    };
    key.len() + value_len + ENTRY_OVERHEAD
}

/// Iterator over a snapshot of MemTable entries
pub struct MemTableIterator {
    inner: std::vec::IntoIter<(Vec<u8>, MemTableEntry)>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
