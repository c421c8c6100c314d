//! Batch Writer
//!
//! Scoped set of pending puts/deletes, applied atomically on commit.

use std::sync::Arc;

use super::Shared;
use crate::backend::WriteBatch;
use crate::error::{Result, TwinError};

/// Pending mutations against one handle generation
///
/// Nothing is visible to readers until [`commit`](Self::commit) returns.
/// The pending batch is released however the writer goes away: commit
/// success, commit failure, [`abort`](Self::abort), or drop.
pub struct BatchWriter {
    shared: Arc<Shared>,
    generation: u64,
    batch: Option<WriteBatch>,
}

impl BatchWriter {
    pub(crate) fn new(shared: Arc<Shared>, generation: u64) -> Self {
        Self {
            shared,
            generation,
            batch: Some(WriteBatch::new()),
        }
    }

    /// Queue a put
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> &mut Self {
        if let Some(batch) = self.batch.as_mut() {
            batch.put(key, value);
        }
        self
    }

    /// Queue a delete
    pub fn delete(&mut self, key: &[u8]) -> &mut Self {
        if let Some(batch) = self.batch.as_mut() {
            batch.delete(key);
        }
        self
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.batch.as_ref().map_or(0, WriteBatch::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply every queued operation, in order, as one atomic write.
    ///
    /// Fails with `StaleHandle` if the store was flushed or closed since the
    /// batch began, and with `BatchWrite` if the engine rejected the write;
    /// in both cases none of the operations took effect.
    pub fn commit(mut self) -> Result<()> {
        let batch = self.batch.take().unwrap_or_default();
        let pending = batch.len();

        let result = self
            .shared
            .with_backend(Some(self.generation), |backend| backend.write(batch))
            .map_err(|e| match e {
                TwinError::StaleHandle | TwinError::Closed => e,
                other => TwinError::BatchWrite(Box::new(other)),
            });

        match &result {
            Ok(()) => tracing::trace!(operations = pending, "batch committed"),
            Err(e) => tracing::debug!(operations = pending, error = %e, "batch commit failed"),
        }
        result
    }

    /// Discard the queued operations
    pub fn abort(mut self) {
        self.release("aborted");
    }

    fn release(&mut self, reason: &str) {
        if let Some(batch) = self.batch.take() {
            if !batch.is_empty() {
                tracing::debug!(operations = batch.len(), reason, "discarding uncommitted batch");
            }
        }
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        self.release("dropped");
    }
}
