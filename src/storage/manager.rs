//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Serve range scans from every table

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{Result, TwinError};
use crate::memtable::{MemTable, MemTableEntry};

use super::sstable::{RawEntry, DEFAULT_BUFFER_SIZE};
use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (many concurrent readers, exclusive writer)
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,

    /// Buffer capacity for table readers and writers
    buffer_size: usize,
}

impl StorageManager {
    /// Open or create storage in the given directory
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Open or create storage, doing table I/O through `buffer_size` buffers
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove half-written tables left by a crash
    /// 3. Open readers for each table (loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open_with_buffer_size(path: &Path, buffer_size: usize) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_path = entry.path();

            if !file_path.is_file() {
                continue;
            }
            if file_path.extension().map_or(false, |ext| ext == "tmp") {
                tracing::debug!(path = %file_path.display(), "removing unfinished SSTable");
                fs::remove_file(&file_path)?;
                continue;
            }
            if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        // Newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            sstables.push(SSTableReader::open_with_buffer_size(
                &sstable_path,
                buffer_size,
            )?);
        }

        // Next ID = max + 1, or 1 if no SSTables exist
        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
            buffer_size,
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key not found, or found tombstone (deleted)
    ///
    /// Uses the write lock because SSTableReader::get() moves the file cursor.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }

            match reader.get(key) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => return Ok(None), // Tombstone = deleted
                Err(TwinError::KeyNotFound) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Up to `limit` raw entries (tombstones included) with key >= `start`
    /// from every table, ordered newest table first.
    pub fn scan_from(&self, start: &[u8], limit: usize) -> Result<Vec<Vec<RawEntry>>> {
        let mut sstables = self.sstables.write();
        sstables
            .iter_mut()
            .map(|reader| reader.scan_from(start, limit))
            .collect()
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// The table is written under a temporary name and renamed into place
    /// once complete, then a reader for it is added to the front of the list.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(TwinError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);
        let tmp_path = path.with_extension("sst.tmp");

        let mut builder = SSTableBuilder::with_buffer_size(&tmp_path, self.buffer_size)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        let mut metadata = builder.finish()?;

        fs::rename(&tmp_path, &path)?;
        metadata.path = path.clone();

        let reader = SSTableReader::open_with_buffer_size(&path, self.buffer_size)?;

        let mut sstables = self.sstables.write();
        sstables.insert(0, reader);

        Ok(metadata)
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
