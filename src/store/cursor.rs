//! Cursor
//!
//! Forward, ordered iteration over a store.
//!
//! A cursor pulls pages of `cursor_batch_size` entries from the engine. Each
//! page comes from a short-lived engine scan that is opened and released
//! inside the refill, so nothing is pinned on the handle between calls and a
//! flush never has to wait for an idle cursor. Writes landing between two
//! refills may become visible; the cursor does not promise a snapshot.

use std::collections::VecDeque;
use std::sync::Arc;

use super::Shared;
use crate::backend::{successor, Entry};
use crate::error::{Result, TwinError};

/// Forward iterator over entries in ascending key order
pub struct Cursor {
    shared: Arc<Shared>,
    generation: u64,
    page_size: usize,
    /// Entries fetched but not yet returned
    buffer: VecDeque<Entry>,
    /// Key the next refill starts at; `None` once the engine ran dry
    resume_from: Option<Vec<u8>>,
    /// Key of the entry most recently returned by `next_entry`
    current: Option<Vec<u8>>,
    /// Set after the `Iterator` impl yields an error
    fused: bool,
}

impl Cursor {
    pub(crate) fn new(shared: Arc<Shared>, generation: u64, start: Vec<u8>) -> Self {
        let page_size = shared.cursor_batch_size();
        Self {
            shared,
            generation,
            page_size,
            buffer: VecDeque::new(),
            resume_from: Some(start),
            current: None,
            fused: false,
        }
    }

    /// Whether another entry remains
    pub fn has_next(&mut self) -> Result<bool> {
        self.ensure_current()?;
        self.refill()?;
        Ok(!self.buffer.is_empty())
    }

    /// Advance one entry; `IteratorExhausted` past the end
    pub fn next_entry(&mut self) -> Result<Entry> {
        if !self.has_next()? {
            return Err(TwinError::IteratorExhausted);
        }
        let entry = self
            .buffer
            .pop_front()
            .ok_or(TwinError::IteratorExhausted)?;
        self.current = Some(entry.key().to_vec());
        Ok(entry)
    }

    /// Delete the entry most recently returned by `next_entry`
    pub fn remove_current(&mut self) -> Result<()> {
        self.ensure_current()?;
        let key = self.current.take().ok_or(TwinError::NoCurrentEntry)?;

        let result = self
            .shared
            .with_backend(Some(self.generation), |backend| backend.delete(&key));
        if result.is_err() {
            self.current = Some(key);
        }
        result
    }

    /// Whether the store was flushed or closed since this cursor opened
    pub fn is_stale(&self) -> bool {
        !self.shared.is_current(self.generation)
    }

    /// Release the cursor
    pub fn close(self) {
        tracing::trace!(buffered = self.buffer.len(), "cursor closed");
    }

    fn ensure_current(&self) -> Result<()> {
        if self.is_stale() {
            return Err(TwinError::StaleHandle);
        }
        Ok(())
    }

    fn refill(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            return Ok(());
        }
        let from = match &self.resume_from {
            Some(from) => from,
            None => return Ok(()),
        };

        let page_size = self.page_size;
        let page = self
            .shared
            .with_backend(Some(self.generation), |backend| backend.scan(from, page_size))?;

        self.resume_from = page.last().map(|entry| successor(entry.key()));
        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for Cursor {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        let item = match self.has_next() {
            Ok(true) => self.next_entry(),
            Ok(false) => return None,
            Err(e) => Err(e),
        };
        if item.is_err() {
            self.fused = true;
        }
        Some(item)
    }
}
