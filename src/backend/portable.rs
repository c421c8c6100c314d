//! Portable Engine
//!
//! The pure-Rust fallback engine that coordinates the WAL, MemTable and
//! SSTable storage.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Handle concurrent read/write access
//! - Write the MemTable out when it is full
//! - Manage crash recovery on startup
//!
//! ## Directory Layout
//! ```text
//! {path}/
//!   ├── LOCK          (exclusive advisory lock)
//!   ├── wal.log       (write-ahead log)
//!   └── sstables/     (SSTable files)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::lock::DirLock;
use super::{successor, BackendHandle, Diagnostics, Engine, EngineKind, Entry, WriteBatch};
use crate::config::Config;
use crate::error::{Result, TwinError};
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Factory for [`PortableBackend`] handles
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableEngine;

impl Engine for PortableEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Portable
    }

    fn open(&self, config: &Config) -> Result<Box<dyn BackendHandle>> {
        Ok(Box::new(PortableBackend::open(config)?))
    }
}

/// An open portable engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/batch/memtable write-out): serialized by
///   `write_lock`, acquired before WAL → memtable → storage
/// - **Reads** (get/scan): no write_lock; the MemTable and StorageManager
///   lock internally. SSTable readers share one file cursor each, so the
///   StorageManager serializes sorted-table reads behind its own lock;
///   only memtable reads run in parallel.
pub struct PortableBackend {
    /// Directory the engine owns
    dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations
    write_lock: Mutex<()>,

    /// MemTable size that triggers a write-out
    write_buffer_size: usize,

    diagnostics: Diagnostics,

    /// Held for the lifetime of the handle
    _lock: DirLock,
}

impl PortableBackend {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// File RocksDB keeps in every database directory
    const NATIVE_MARKER: &'static str = "CURRENT";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Check (or create) the directory and take its lock
    /// 2. Load existing SSTables
    /// 3. Replay the WAL and write recovered data out to an SSTable
    /// 4. Ready to serve requests
    pub fn open(config: &Config) -> Result<Self> {
        let dir = config.path.clone();
        let diagnostics = Diagnostics::new(EngineKind::Portable, config);

        if !dir.exists() {
            if !config.create_if_missing {
                return Err(TwinError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!(
                        "{} does not exist and create_if_missing is off",
                        dir.display()
                    ),
                )));
            }
            fs::create_dir_all(&dir)?;
        } else if !dir.is_dir() {
            return Err(TwinError::Storage(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        if dir.join(Self::NATIVE_MARKER).exists() {
            return Err(TwinError::Storage(format!(
                "{} holds native engine data",
                dir.display()
            )));
        }

        let lock = DirLock::acquire(&dir)?;

        let storage_dir = dir.join(Self::SSTABLE_DIR);
        let wal_path = dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open_with_buffer_size(&storage_dir, config.block_size)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                diagnostics.emit(&format!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered, recovery.entries_corrupted, recovery.last_lsn
                ));
            }

            for entry in entries {
                match entry.operation {
                    Operation::Put { key, value } => {
                        memtable.put(key, value);
                    }
                    Operation::Delete { key } => {
                        memtable.delete(key);
                    }
                    Operation::Batch { ops } => {
                        memtable.apply(ops);
                    }
                }
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;

        // Recovered data goes to an SSTable before the WAL is dropped
        if !memtable.is_empty() {
            diagnostics.emit(&format!(
                "writing {} recovered entries to an SSTable",
                memtable.entry_count()
            ));
            storage.flush(&memtable)?;
            memtable.clear();
            wal.truncate()?;
        }

        diagnostics.emit(&format!(
            "opened {} ({} sstables, block_size={}, cache_size={} unused by this engine, lock={})",
            dir.display(),
            storage.sstable_count(),
            config.block_size,
            config.cache_size,
            lock.path().display()
        ));

        Ok(Self {
            dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
            write_buffer_size: config.write_buffer_size,
            diagnostics,
            _lock: lock,
        })
    }

    /// Write the memtable out to a new SSTable (caller holds write_lock)
    fn flush_memtable(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let table = self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        self.wal.lock().truncate()?;

        self.diagnostics.emit(&format!(
            "memtable written to {} ({} entries)",
            table.path.display(),
            table.entry_count
        ));
        Ok(())
    }

    /// Called after a mutation is already in the WAL and the memtable, so a
    /// failed write-out does not fail the mutation. The memtable stays over
    /// its limit and the next write (or `close`) tries again.
    fn maybe_flush(&self, memtable_size: usize) {
        if memtable_size < self.write_buffer_size {
            return;
        }
        if let Err(e) = self.flush_memtable() {
            tracing::warn!(
                path = %self.dir.display(),
                error = %e,
                "memtable write-out failed; will retry"
            );
            self.diagnostics
                .emit(&format!("memtable write-out deferred: {}", e));
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Directory owned by this engine
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }
}

impl BackendHandle for PortableBackend {
    fn kind(&self) -> EngineKind {
        EngineKind::Portable
    }

    /// Search order: MemTable (most recent writes), then SSTables newest → oldest
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return Ok(match entry {
                MemTableEntry::Value(value) => Some(value),
                MemTableEntry::Tombstone => None,
            });
        }

        self.storage.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;

        let size = self.memtable.put(key.to_vec(), value.to_vec());
        self.maybe_flush(size);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(Operation::Delete { key: key.to_vec() })?;

        let size = self.memtable.delete(key.to_vec());
        self.maybe_flush(size);
        Ok(())
    }

    /// One WAL entry for the whole batch, then one memtable write guard
    fn write(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.into_ops();

        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(Operation::Batch { ops: ops.clone() })?;

        let size = self.memtable.apply(ops);
        self.maybe_flush(size);
        Ok(())
    }

    /// Merges the memtable and every SSTable, newest source winning.
    ///
    /// The memtable is read before the SSTables so a concurrent write-out
    /// cannot hide an entry between the two reads.
    fn scan(&self, start: &[u8], limit: usize) -> Result<Vec<Entry>> {
        let limit = limit.max(1);
        let mut from = start.to_vec();

        loop {
            let mut sources = Vec::new();
            sources.push(self.memtable.range_from(&from, limit));
            sources.extend(self.storage.scan_from(&from, limit)?);

            // A source cut off at `limit` is only complete up to its last key
            let horizon = sources
                .iter()
                .filter(|source| source.len() == limit)
                .filter_map(|source| source.last().map(|(key, _)| key.clone()))
                .min();

            let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
            for source in sources {
                for (key, value) in source {
                    if horizon.as_ref().map_or(true, |h| &key <= h) {
                        merged.entry(key).or_insert(value);
                    }
                }
            }

            let live: Vec<Entry> = merged
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| Entry::new(key, v)))
                .take(limit)
                .collect();

            match horizon {
                Some(h) if live.is_empty() => from = successor(&h),
                _ => return Ok(live),
            }
        }
    }

    /// Writes the memtable out and syncs the WAL; the directory lock is
    /// released when the handle drops.
    fn close(self: Box<Self>) -> Result<()> {
        {
            let _write_guard = self.write_lock.lock();
            self.flush_memtable()?;
            self.wal.lock().sync()?;
        }
        self.diagnostics
            .emit(&format!("closed {}", self.dir.display()));
        Ok(())
    }
}
