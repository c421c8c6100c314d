//! Native Engine
//!
//! RocksDB behind the `native` cargo feature. Builds without the feature keep
//! the engine type so the selector's preference order stays the same, but
//! every open fails with `EngineUnavailable` and the store falls back.

use super::{BackendHandle, Engine, EngineKind};
use crate::config::Config;
use crate::error::Result;

/// Factory for RocksDB-backed handles
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl NativeEngine {
    /// Whether this build can open native handles at all
    pub fn is_available() -> bool {
        cfg!(feature = "native")
    }
}

impl Engine for NativeEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Native
    }

    #[cfg(feature = "native")]
    fn open(&self, config: &Config) -> Result<Box<dyn BackendHandle>> {
        Ok(Box::new(rocks::NativeBackend::open(config)?))
    }

    #[cfg(not(feature = "native"))]
    fn open(&self, _config: &Config) -> Result<Box<dyn BackendHandle>> {
        Err(crate::error::TwinError::EngineUnavailable(
            "built without the `native` feature".to_string(),
        ))
    }
}

#[cfg(feature = "native")]
mod rocks {
    use std::path::PathBuf;

    use rocksdb::{BlockBasedOptions, Cache, Direction, IteratorMode, Options, DB};

    use crate::backend::{BackendHandle, BatchOp, Diagnostics, EngineKind, Entry, WriteBatch};
    use crate::config::Config;
    use crate::error::{Result, TwinError};

    /// Files the portable engine leaves in its directory
    const PORTABLE_MARKERS: [&str; 2] = ["wal.log", "sstables"];

    pub(super) struct NativeBackend {
        db: DB,
        path: PathBuf,
        diagnostics: Diagnostics,
    }

    impl NativeBackend {
        pub(super) fn open(config: &Config) -> Result<Self> {
            let diagnostics = Diagnostics::new(EngineKind::Native, config);

            if let Some(marker) = PORTABLE_MARKERS
                .iter()
                .find(|marker| config.path.join(marker).exists())
            {
                return Err(TwinError::Storage(format!(
                    "{} holds portable engine data ({})",
                    config.path.display(),
                    marker
                )));
            }

            let cache = Cache::new_lru_cache(config.cache_size);
            let mut table_options = BlockBasedOptions::default();
            table_options.set_block_size(config.block_size);
            table_options.set_block_cache(&cache);

            let mut options = Options::default();
            options.create_if_missing(config.create_if_missing);
            options.set_block_based_table_factory(&table_options);

            let db = DB::open(&options, &config.path)?;

            diagnostics.emit(&format!(
                "opened {} (block_size={}, cache_size={})",
                config.path.display(),
                config.block_size,
                config.cache_size
            ));

            Ok(Self {
                db,
                path: config.path.clone(),
                diagnostics,
            })
        }
    }

    impl BackendHandle for NativeBackend {
        fn kind(&self) -> EngineKind {
            EngineKind::Native
        }

        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            Ok(self.db.get(key)?)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
            Ok(self.db.put(key, value)?)
        }

        fn delete(&self, key: &[u8]) -> Result<()> {
            Ok(self.db.delete(key)?)
        }

        fn write(&self, batch: WriteBatch) -> Result<()> {
            let mut native = rocksdb::WriteBatch::default();
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put { key, value } => native.put(key, value),
                    BatchOp::Delete { key } => native.delete(key),
                }
            }
            Ok(self.db.write(native)?)
        }

        fn scan(&self, start: &[u8], limit: usize) -> Result<Vec<Entry>> {
            self.db
                .iterator(IteratorMode::From(start, Direction::Forward))
                .take(limit.max(1))
                .map(|item| {
                    item.map(|(key, value)| Entry::new(key.into_vec(), value.into_vec()))
                        .map_err(TwinError::from)
                })
                .collect()
        }

        /// Flushes memtables to disk; dropping the handle closes the database
        fn close(self: Box<Self>) -> Result<()> {
            self.db.flush()?;
            self.diagnostics
                .emit(&format!("closed {}", self.path.display()));
            Ok(())
        }
    }
}
