//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::entry::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use super::WalEntry;
use crate::error::{Result, TwinError};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset just past the last successfully decoded frame
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn header, torn
    /// payload, or checksum mismatch is reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut raw = [0u8; HEADER_SIZE];
        match read_fully(&mut self.reader, &mut raw)? {
            0 => return Ok(None),
            n if n < HEADER_SIZE => {
                return Err(TwinError::WalCorruption(format!(
                    "partial header at offset {}",
                    self.position
                )))
            }
            _ => {}
        }

        let header = FrameHeader::decode(&raw);
        if header.len > MAX_PAYLOAD_SIZE {
            return Err(TwinError::WalCorruption(format!(
                "implausible frame length {} at offset {}",
                header.len, self.position
            )));
        }

        let mut payload = vec![0u8; header.len as usize];
        if read_fully(&mut self.reader, &mut payload)? < payload.len() {
            return Err(TwinError::WalCorruption(format!(
                "partial payload at offset {}",
                self.position
            )));
        }

        let entry = WalEntry::from_payload(header, &payload)?;
        self.position += (HEADER_SIZE + payload.len()) as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last valid frame read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries; stops after the first error
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
