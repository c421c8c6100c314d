//! Storage Module
//!
//! Persistent sorted-table layer of the portable engine.
//!
//! ## Responsibilities
//! - Persist memtable contents to disk in sorted format
//! - Point lookups and range scans across tables, newest first
//! - Rediscover tables on reopen

mod manager;
mod sstable;

pub use manager::StorageManager;
pub use sstable::{RawEntry, SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
