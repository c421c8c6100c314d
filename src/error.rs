//! Error types for twinkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TwinError
pub type Result<T> = std::result::Result<T, TwinError>;

/// Unified error type for twinkv operations
#[derive(Debug, Error)]
pub enum TwinError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal miss inside a single sorted table; never returned by the store.
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Native engine error: {0}")]
    Native(String),

    #[error("Store open failed on both engines (preferred: {preferred}): {source}")]
    StoreOpen {
        preferred: Box<TwinError>,
        #[source]
        source: Box<TwinError>,
    },

    // -------------------------------------------------------------------------
    // Store Usage Errors
    // -------------------------------------------------------------------------
    #[error("Batch write failed: {0}")]
    BatchWrite(#[source] Box<TwinError>),

    #[error("Cursor has no remaining entries")]
    IteratorExhausted,

    #[error("Cursor has no current entry to remove")]
    NoCurrentEntry,

    #[error("Backend handle was replaced or closed")]
    StaleHandle,

    #[error("Store is closed")]
    Closed,

    #[error("Failed to release {resource}: {source}")]
    ResourceRelease {
        resource: &'static str,
        #[source]
        source: Box<TwinError>,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TwinError {
    /// Whether an engine open failure of this kind allows falling back to
    /// another engine.
    pub fn is_io_class(&self) -> bool {
        matches!(
            self,
            TwinError::Io(_)
                | TwinError::WalCorruption(_)
                | TwinError::WalWrite(_)
                | TwinError::Storage(_)
                | TwinError::Serialization(_)
                | TwinError::EngineUnavailable(_)
                | TwinError::Native(_)
        )
    }
}

#[cfg(feature = "native")]
impl From<rocksdb::Error> for TwinError {
    fn from(e: rocksdb::Error) -> Self {
        TwinError::Native(e.into_string())
    }
}

impl From<bincode::Error> for TwinError {
    fn from(e: bincode::Error) -> Self {
        TwinError::Serialization(e.to_string())
    }
}
