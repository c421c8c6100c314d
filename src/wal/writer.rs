//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::reader::WalReader;
use super::{Operation, WalEntry};
use crate::config::WalSyncStrategy;
use crate::error::{Result, TwinError};

/// Writes entries to the WAL file
///
/// Every append is flushed to the OS before it returns; whether it is also
/// fsynced depends on the [`WalSyncStrategy`].
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// LSN the next append will receive
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    /// File length covered by fully written frames
    committed_len: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// Existing valid entries are kept and LSNs continue after the last one.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            let mut reader = WalReader::open(path)?;
            let mut last = 0;
            while let Ok(Some(entry)) = reader.next_entry() {
                last = entry.lsn;
            }
            last
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let committed_len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            current_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
            committed_len,
        })
    }

    /// Append an operation to the WAL, returning its LSN
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn;
        let frame = WalEntry::new(lsn, operation).serialize()?;

        if let Err(e) = self
            .writer
            .write_all(&frame)
            .and_then(|_| self.writer.flush())
        {
            self.rollback()?;
            return Err(TwinError::WalWrite(format!("append lsn {}: {}", lsn, e)));
        }

        self.committed_len += frame.len() as u64;
        self.current_lsn += 1;
        self.unsynced += 1;

        match self.sync_strategy {
            WalSyncStrategy::EveryWrite => self.sync()?,
            WalSyncStrategy::EveryNEntries { count } => {
                if self.unsynced >= count {
                    self.sync()?;
                }
            }
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry (called once they are durable elsewhere).
    ///
    /// LSNs keep increasing across truncations of this writer only; a writer
    /// opened on an empty log starts again at 1.
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;
        self.unsynced = 0;
        self.committed_len = 0;
        Ok(())
    }

    /// Forget a frame that was only partly written: discard whatever is
    /// still buffered and cut the file back to the last whole frame.
    pub(crate) fn rollback(&mut self) -> Result<()> {
        let file = self.writer.get_ref().try_clone()?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts hands back the buffer instead of flushing it
        let (file, _discarded) = stale.into_parts();
        file.set_len(self.committed_len)?;
        Ok(())
    }

    /// Get the LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Path of the underlying log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
