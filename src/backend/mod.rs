//! Backend Module
//!
//! The seam between the store and the engines behind it.
//!
//! ## Pieces
//! - [`Engine`]: factory that opens a [`BackendHandle`] for a [`Config`]
//! - [`BackendHandle`]: one open engine instance bound to one directory
//! - [`BackendSelector`]: preferred engine first, fallback on I/O-class failure
//!
//! ## Engines
//! ```text
//!            ┌──────────────────┐
//!            │ BackendSelector  │
//!            └────────┬─────────┘
//!          preferred  │  fallback
//!        ┌────────────┴────────────┐
//!        ▼                         ▼
//! ┌──────────────┐        ┌────────────────┐
//! │ NativeEngine │        │ PortableEngine │
//! │  (RocksDB)   │        │ WAL+MemTable+  │
//! │              │        │    SSTables    │
//! └──────────────┘        └────────────────┘
//! ```

mod lock;
mod native;
mod portable;
mod selector;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{Config, LogSink};
use crate::error::Result;

pub use native::NativeEngine;
pub use portable::{PortableBackend, PortableEngine};
pub use selector::BackendSelector;

// =============================================================================
// Engine Identity
// =============================================================================

/// Which engine implementation is serving a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// RocksDB, compiled in with the `native` feature
    Native,
    /// Pure-Rust WAL + memtable + SSTable engine
    Portable,
}

impl EngineKind {
    /// Whether this is the native-accelerated implementation
    pub fn is_native(&self) -> bool {
        matches!(self, EngineKind::Native)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Native => "native",
            EngineKind::Portable => "portable",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Data Types
// =============================================================================

/// A key/value pair produced by a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Entry {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.key, self.value)
    }
}

/// One queued batch mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Ordered set of mutations an engine applies as one atomic write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(BatchOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.ops.push(BatchOp::Delete { key: key.to_vec() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

// =============================================================================
// Capability Traits
// =============================================================================

/// An open engine instance that exclusively owns its directory
///
/// Implementations are internally synchronized; the store calls them from
/// many threads at once through a shared reference.
pub trait BackendHandle: Send + Sync {
    /// Engine serving this handle
    fn kind(&self) -> EngineKind;

    /// Point lookup; `None` means the key is absent
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite one key
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove one key; absent keys are not an error
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Apply every operation of `batch`, in order, or none of them
    fn write(&self, batch: WriteBatch) -> Result<()>;

    /// Up to `limit` live entries with key >= `start`, in ascending key order.
    ///
    /// A page may hold fewer than `limit` entries while more remain; an
    /// empty page means there is nothing at or after `start`.
    fn scan(&self, start: &[u8], limit: usize) -> Result<Vec<Entry>>;

    /// Release the directory and every engine resource
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens backend handles of one engine kind
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn open(&self, config: &Config) -> Result<Box<dyn BackendHandle>>;
}

// =============================================================================
// Helpers
// =============================================================================

/// Smallest key strictly greater than `key` in byte-lexicographic order
pub(crate) fn successor(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0);
    next
}

/// Engine diagnostics: always a `tracing` event, plus the configured sink
#[derive(Clone)]
pub(crate) struct Diagnostics {
    kind: EngineKind,
    sink: Option<LogSink>,
}

impl Diagnostics {
    pub(crate) fn new(kind: EngineKind, config: &Config) -> Self {
        Self {
            kind,
            sink: config.log_sink.clone(),
        }
    }

    pub(crate) fn emit(&self, message: &str) {
        tracing::debug!(target: "twinkv::engine", engine = %self.kind, "{}", message);
        if let Some(sink) = &self.sink {
            sink(message);
        }
    }
}
