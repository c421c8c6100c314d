//! # twinkv
//!
//! An embedded, ordered, byte-keyed key-value store in front of two
//! interchangeable engines:
//! - a native RocksDB engine (cargo feature `native`), preferred when present
//! - a portable pure-Rust engine (WAL + MemTable + SSTables) used as fallback
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │     get / put / remove / put_all / remove_all / flush        │
//! └──────────┬──────────────────────┬────────────────────────────┘
//!            │                      │
//!            ▼                      ▼
//!   ┌─────────────────┐    ┌─────────────────┐
//!   │   BatchWriter   │    │     Cursor      │
//!   │ (atomic commit) │    │ (ordered scan)  │
//!   └────────┬────────┘    └────────┬────────┘
//!            └───────────┬──────────┘
//!                        ▼
//!              ┌───────────────────┐
//!              │  BackendHandle    │ ◄── BackendSelector
//!              │ native | portable │     (native → portable)
//!              └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use twinkv::{Config, Store};
//!
//! # fn main() -> twinkv::Result<()> {
//! let store = Store::open(Config::builder().path("./data").build())?;
//! store.put(b"a", b"1")?;
//! assert_eq!(store.get(b"a")?, Some(b"1".to_vec()));
//!
//! let mut cursor = store.search(b"a")?;
//! while cursor.has_next()? {
//!     let entry = cursor.next_entry()?;
//!     println!("{:?} = {:?}", entry.key(), entry.value());
//! }
//! cursor.close();
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod backend;
pub mod memtable;
pub mod storage;
pub mod store;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use backend::{
    BackendHandle, BackendSelector, BatchOp, Engine, EngineKind, Entry, NativeEngine,
    PortableEngine, WriteBatch,
};
pub use config::{Config, ConfigBuilder, LogSink, WalSyncStrategy};
pub use error::{Result, TwinError};
pub use store::{BatchWriter, Cursor, Store};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of twinkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
