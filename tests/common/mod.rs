//! Fake engines shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use twinkv::{
    BackendHandle, BatchOp, Config, Engine, EngineKind, Entry, Result, TwinError, WriteBatch,
};

type Disk = Arc<Mutex<BTreeMap<Vec<u8>, Vec<u8>>>>;

// =============================================================================
// MemoryEngine: in-memory "disk" that survives close/reopen
// =============================================================================

#[derive(Clone)]
pub struct MemoryEngine {
    kind: EngineKind,
    disk: Disk,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
    fail_write: bool,
    /// 1-based open attempt that fails
    fail_open_at: Option<usize>,
}

impl MemoryEngine {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            disk: Arc::new(Mutex::new(BTreeMap::new())),
            opens: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_close: false,
            fail_write: false,
            fail_open_at: None,
        }
    }

    /// Handles report an error when closed
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Handles reject every batch write
    pub fn failing_write(mut self) -> Self {
        self.fail_write = true;
        self
    }

    /// The `attempt`-th call to `open` (1-based) fails with an I/O error
    pub fn failing_open_at(mut self, attempt: usize) -> Self {
        self.fail_open_at = Some(attempt);
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Engine for MemoryEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn open(&self, _config: &Config) -> Result<Box<dyn BackendHandle>> {
        let attempt = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_open_at == Some(attempt) {
            return Err(TwinError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated open failure",
            )));
        }
        Ok(Box::new(MemoryHandle {
            engine: self.clone(),
        }))
    }
}

struct MemoryHandle {
    engine: MemoryEngine,
}

impl BackendHandle for MemoryHandle {
    fn kind(&self) -> EngineKind {
        self.engine.kind
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.engine.disk.lock().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.engine.disk.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.engine.disk.lock().remove(key);
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        if self.engine.fail_write {
            return Err(TwinError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated write failure",
            )));
        }
        let mut disk = self.engine.disk.lock();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    disk.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    disk.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, start: &[u8], limit: usize) -> Result<Vec<Entry>> {
        Ok(self
            .engine
            .disk
            .lock()
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .take(limit)
            .map(|(k, v)| Entry::new(k.clone(), v.clone()))
            .collect())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.engine.closes.fetch_add(1, Ordering::SeqCst);
        if self.engine.fail_close {
            return Err(TwinError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated close failure",
            )));
        }
        Ok(())
    }
}

// =============================================================================
// FailingEngine: never opens
// =============================================================================

#[derive(Clone)]
pub struct FailingEngine {
    kind: EngineKind,
    make_error: fn() -> TwinError,
    attempts: Arc<AtomicUsize>,
}

impl FailingEngine {
    /// Fails with an I/O-class "engine unavailable" error
    pub fn unavailable(kind: EngineKind) -> Self {
        Self::with_error(kind, || {
            TwinError::EngineUnavailable("simulated missing native support".to_string())
        })
    }

    pub fn with_error(kind: EngineKind, make_error: fn() -> TwinError) -> Self {
        Self {
            kind,
            make_error,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Engine for FailingEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn open(&self, _config: &Config) -> Result<Box<dyn BackendHandle>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err((self.make_error)())
    }
}
