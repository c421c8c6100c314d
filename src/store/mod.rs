//! Store Module
//!
//! The public façade over whichever engine the selector opened.
//!
//! ## Handle Lifecycle
//! The live handle sits behind an `RwLock` together with a generation
//! counter:
//! - get/put/remove, batch commits and cursor refills hold the read side
//! - `flush()` and `close()` hold the write side while they swap the handle,
//!   and bump the generation
//! - batches and cursors remember the generation they were created under and
//!   fail with `StaleHandle` once it moves on

mod batch;
mod cursor;

use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{BackendHandle, BackendSelector, EngineKind};
use crate::config::Config;
use crate::error::{Result, TwinError};

pub use batch::BatchWriter;
pub use cursor::Cursor;

/// Embedded ordered key-value store
///
/// Cloning a `Store` yields another reference to the same open store.
#[derive(Clone)]
pub struct Store {
    shared: Arc<Shared>,
}

/// State shared by a store and the batches/cursors it hands out
pub(crate) struct Shared {
    config: Config,
    selector: BackendSelector,
    slot: RwLock<Slot>,
}

struct Slot {
    live: Option<Live>,
    generation: u64,
    /// Set by `close()`; a failed flush leaves the store reopenable instead
    closed: bool,
}

struct Live {
    backend: Box<dyn BackendHandle>,
    kind: EngineKind,
}

impl Shared {
    /// Run `f` against the live handle under the read lock.
    ///
    /// With `expected` set, the call fails with `StaleHandle` unless the
    /// handle is still the generation the caller was created under.
    pub(crate) fn with_backend<T>(
        &self,
        expected: Option<u64>,
        f: impl FnOnce(&dyn BackendHandle) -> Result<T>,
    ) -> Result<T> {
        let slot = self.slot.read();
        if let Some(generation) = expected {
            if generation != slot.generation {
                return Err(TwinError::StaleHandle);
            }
        }
        match &slot.live {
            Some(live) => f(live.backend.as_ref()),
            None if expected.is_some() => Err(TwinError::StaleHandle),
            None => Err(TwinError::Closed),
        }
    }

    /// Generation of the live handle, or `Closed`
    pub(crate) fn live_generation(&self) -> Result<u64> {
        let slot = self.slot.read();
        match slot.live {
            Some(_) => Ok(slot.generation),
            None => Err(TwinError::Closed),
        }
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let slot = self.slot.read();
        slot.live.is_some() && slot.generation == generation
    }

    pub(crate) fn cursor_batch_size(&self) -> usize {
        self.config.cursor_batch_size
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(live) = self.slot.get_mut().live.take() {
            if let Err(e) = live.backend.close() {
                tracing::warn!(engine = %live.kind, error = %e, "closing store on drop failed");
            }
        }
    }
}

impl Store {
    /// Open a store with the default selector (native, then portable)
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with(config, BackendSelector::default())
    }

    /// Open a store choosing engines through `selector`
    pub fn open_with(config: Config, selector: BackendSelector) -> Result<Self> {
        config.validate()?;

        let (backend, kind) = selector.open(&config)?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                selector,
                slot: RwLock::new(Slot {
                    live: Some(Live { backend, kind }),
                    generation: 0,
                    closed: false,
                }),
            }),
        })
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Get a value by key; `Ok(None)` means not found
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.shared.with_backend(None, |backend| backend.get(key))
    }

    /// Put a key-value pair, overwriting any previous value
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.shared.with_backend(None, |backend| backend.put(key, value))
    }

    /// Remove a key; absent keys are not an error
    pub fn remove(&self, key: &[u8]) -> Result<()> {
        self.shared.with_backend(None, |backend| backend.delete(key))
    }

    // =========================================================================
    // Batch Operations
    // =========================================================================

    /// Begin an explicit batch against the current handle
    pub fn batch(&self) -> Result<BatchWriter> {
        let generation = self.shared.live_generation()?;
        Ok(BatchWriter::new(Arc::clone(&self.shared), generation))
    }

    /// Put every entry in one atomic batch
    pub fn put_all<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = self.batch()?;
        for (key, value) in entries {
            batch.put(key.as_ref(), value.as_ref());
        }
        batch.commit()
    }

    /// Remove every key in one atomic batch
    pub fn remove_all<I, K>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut batch = self.batch()?;
        for key in keys {
            batch.delete(key.as_ref());
        }
        batch.commit()
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Cursor positioned at the first key >= `start_key`
    pub fn search(&self, start_key: &[u8]) -> Result<Cursor> {
        let generation = self.shared.live_generation()?;
        Ok(Cursor::new(
            Arc::clone(&self.shared),
            generation,
            start_key.to_vec(),
        ))
    }

    /// Cursor positioned at the first key in the store
    pub fn load_all(&self) -> Result<Cursor> {
        self.search(&[])
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the current handle and reopen through the selector.
    ///
    /// Waits for in-flight calls, invalidates every outstanding batch and
    /// cursor. A failure to close the old handle is logged and the reopen
    /// still happens; a failed reopen leaves the store closed until the next
    /// successful `flush()`.
    pub fn flush(&self) -> Result<()> {
        let mut slot = self.shared.slot.write();
        if slot.closed {
            return Err(TwinError::Closed);
        }

        if let Some(live) = slot.live.take() {
            slot.generation += 1;
            if let Err(e) = live.backend.close() {
                let err = TwinError::ResourceRelease {
                    resource: "backend handle",
                    source: Box::new(e),
                };
                tracing::warn!(engine = %live.kind, error = %err, "reopening after failed close");
            }
        }

        let (backend, kind) = self.shared.selector.open(&self.shared.config)?;
        tracing::info!(engine = %kind, generation = slot.generation, "store reopened");
        slot.live = Some(Live { backend, kind });
        Ok(())
    }

    /// Release the backend handle. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut slot = self.shared.slot.write();
        slot.closed = true;

        let live = match slot.live.take() {
            Some(live) => live,
            None => return Ok(()),
        };
        slot.generation += 1;

        live.backend.close().map_err(|e| {
            let err = TwinError::ResourceRelease {
                resource: "backend handle",
                source: Box::new(e),
            };
            tracing::warn!(engine = %live.kind, error = %err, "close failed");
            err
        })
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Engine serving the store, or `None` while closed
    pub fn engine_kind(&self) -> Option<EngineKind> {
        self.shared.slot.read().live.as_ref().map(|live| live.kind)
    }

    pub fn is_open(&self) -> bool {
        self.shared.slot.read().live.is_some()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}
