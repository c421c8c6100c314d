//! SSTable Iterator
//!
//! Sequential iteration over the entries of an SSTable data block.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::Result;

use super::{le_u32, RawEntry, HEADER_SIZE, TOMBSTONE_MARKER};

/// Iterator over SSTable entries in sorted key order
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
}

impl<'a> SSTableIterator<'a> {
    /// Create an iterator over the whole data block
    pub(super) fn new(file: &'a mut BufReader<File>, end_offset: u64) -> Result<Self> {
        Self::starting_at(file, HEADER_SIZE, end_offset)
    }

    /// Create an iterator positioned at the entry starting at `offset`
    pub(super) fn starting_at(
        file: &'a mut BufReader<File>,
        offset: u64,
        end_offset: u64,
    ) -> Result<Self> {
        file.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: offset,
        })
    }

    fn read_entry(&mut self) -> Result<RawEntry> {
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = le_u32(&header[0..4]) as usize;
        let val_len = le_u32(&header[4..8]);

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;

        let mut entry_size = 8 + key_len as u64;

        let value = if val_len == TOMBSTONE_MARKER {
            None
        } else {
            let mut v = vec![0u8; val_len as usize];
            self.file.read_exact(&mut v)?;
            entry_size += val_len as u64;
            Some(v)
        };

        self.current_offset += entry_size;
        Ok((key, value))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<RawEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stop at index block
        if self.current_offset >= self.end_offset {
            return None;
        }

        match self.read_entry() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                // Do not keep reading from an unknown position
                self.current_offset = self.end_offset;
                Some(Err(e))
            }
        }
    }
}
