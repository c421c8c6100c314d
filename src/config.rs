//! Configuration for twinkv
//!
//! Centralized configuration with sensible defaults. A `Config` is immutable
//! once a store has been opened with it and is reused verbatim on flush.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, TwinError};

/// Callback receiving engine diagnostic messages
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Main configuration for a twinkv store
#[derive(Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory owned by the open engine. Layout is engine-defined.
    pub path: PathBuf,

    /// Create the store when the directory is missing instead of failing
    pub create_if_missing: bool,

    // -------------------------------------------------------------------------
    // Engine Tuning
    // -------------------------------------------------------------------------
    /// Engine block granularity (in bytes)
    pub block_size: usize,

    /// Engine read-cache budget (in bytes)
    pub cache_size: usize,

    /// Routes engine diagnostics to the host's logging facility
    pub log_sink: Option<LogSink>,

    // -------------------------------------------------------------------------
    // Portable Engine Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// Max size of memtable before it is written out (in bytes)
    pub write_buffer_size: usize,

    // -------------------------------------------------------------------------
    // Cursor Configuration
    // -------------------------------------------------------------------------
    /// Entries fetched from the engine per cursor refill
    pub cursor_batch_size: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./twinkv_data"),
            create_if_missing: true,
            block_size: 32 * 1024,        // 32 KB
            cache_size: 64 * 1024 * 1024, // 64 MB
            log_sink: None,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            write_buffer_size: 4 * 1024 * 1024, // 4 MB
            cursor_batch_size: 256,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("create_if_missing", &self.create_if_missing)
            .field("block_size", &self.block_size)
            .field("cache_size", &self.cache_size)
            .field("log_sink", &self.log_sink.as_ref().map(|_| "<fn>"))
            .field("wal_sync_strategy", &self.wal_sync_strategy)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("cursor_batch_size", &self.cursor_batch_size)
            .finish()
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings no engine can run with
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(TwinError::Config("path must not be empty".to_string()));
        }
        if self.block_size == 0 {
            return Err(TwinError::Config("block_size must be positive".to_string()));
        }
        if self.cache_size == 0 {
            return Err(TwinError::Config("cache_size must be positive".to_string()));
        }
        if self.write_buffer_size == 0 {
            return Err(TwinError::Config(
                "write_buffer_size must be positive".to_string(),
            ));
        }
        if self.cursor_batch_size == 0 {
            return Err(TwinError::Config(
                "cursor_batch_size must be positive".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(TwinError::Config(
                "WAL sync interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store directory
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Create the store if the directory does not exist
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the engine block size (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the engine read-cache budget (in bytes)
    pub fn cache_size(mut self, size: usize) -> Self {
        self.config.cache_size = size;
        self
    }

    /// Forward engine diagnostics to `sink`
    pub fn log_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.config.log_sink = Some(Arc::new(sink));
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.config.write_buffer_size = size;
        self
    }

    /// Set how many entries a cursor fetches per refill
    pub fn cursor_batch_size(mut self, count: usize) -> Self {
        self.config.cursor_batch_size = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert_eq!(config.block_size, 32_768);
        assert_eq!(config.cache_size, 67_108_864);
        assert!(config.log_sink.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides_fields() {
        let config = Config::builder()
            .path("/tmp/somewhere")
            .create_if_missing(false)
            .block_size(4096)
            .cache_size(1024)
            .cursor_batch_size(8)
            .build();

        assert_eq!(config.path, PathBuf::from("/tmp/somewhere"));
        assert!(!config.create_if_missing);
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.cache_size, 1024);
        assert_eq!(config.cursor_batch_size, 8);
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let config = Config::builder().block_size(0).build();
        assert!(matches!(config.validate(), Err(TwinError::Config(_))));

        let config = Config::builder().cursor_batch_size(0).build();
        assert!(matches!(config.validate(), Err(TwinError::Config(_))));

        let config = Config::builder()
            .wal_sync_strategy(WalSyncStrategy::EveryNEntries { count: 0 })
            .build();
        assert!(matches!(config.validate(), Err(TwinError::Config(_))));
    }

    #[test]
    fn debug_hides_sink() {
        let config = Config::builder().log_sink(|_| {}).build();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("<fn>"));
    }
}
