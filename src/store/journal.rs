//! Append-only product journal.
//!
//! Layout: a 5-byte header (magic + version) followed by frames of
//! `[len: u32 LE][MessagePack entry][crc32: u32 LE]`. A frame cut short at the
//! end of the file is a torn write and is truncated on open; a frame whose
//! checksum does not match is corruption.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CatalogError, Result};
use crate::types::{Product, ProductId};

/// Magic bytes for the journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"CJL\0";

/// Current journal format version.
const JOURNAL_VERSION: u8 = 1;

const HEADER_LEN: u64 = 5;

/// Frames larger than this are treated as corruption.
const MAX_ENTRY_BYTES: usize = 16 * 1024 * 1024;

/// One journaled mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum JournalEntry {
    /// Full state of a created or updated product.
    Upsert(Product),
    /// A deleted product.
    Remove(ProductId),
    /// Id allocator position; written first by compaction so ids of
    /// deleted products stay retired.
    Checkpoint { next_id: ProductId },
}

enum Frame {
    Entry(JournalEntry, u64),
    End,
    Torn,
}

/// Writer half of the journal.
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
    /// fsync after this many appends; 0 syncs only on `sync`.
    sync_interval: usize,
    unsynced: usize,
    /// File length up to the last fully appended frame.
    committed_len: u64,
}

impl Journal {
    /// Open or create the journal, returning it with every entry replayed
    /// in write order.
    pub fn open(path: impl AsRef<Path>, sync_interval: usize) -> Result<(Self, Vec<JournalEntry>)> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            Self::replay(&path)?
        } else {
            Self::write_header(&mut File::create(&path)?)?;
            Vec::new()
        };

        let writer = BufWriter::new(OpenOptions::new().append(true).open(&path)?);
        let committed_len = fs::metadata(&path)?.len();
        Ok((
            Self {
                path,
                writer,
                sync_interval,
                unsynced: 0,
                committed_len,
            },
            entries,
        ))
    }

    /// Append one entry. The entry is flushed to the OS before returning.
    ///
    /// On failure nothing of the entry is left behind: buffered bytes are
    /// dropped and the file is cut back to the last complete frame.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        match self.write_frame(entry) {
            Ok(len) => {
                self.committed_len += len;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.discard_pending() {
                    warn!(
                        path = %self.path.display(),
                        error = %rollback,
                        "failed to roll back journal append"
                    );
                }
                Err(e)
            }
        }
    }

    fn write_frame(&mut self, entry: &JournalEntry) -> Result<u64> {
        let len = Self::write_entry(&mut self.writer, entry)?;
        self.writer.flush()?;

        self.unsynced += 1;
        if self.sync_interval > 0 && self.unsynced >= self.sync_interval {
            self.sync()?;
        }
        Ok(len)
    }

    /// Drop unflushed bytes and truncate to `committed_len`.
    fn discard_pending(&mut self) -> Result<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let (stale, _unflushed) =
            std::mem::replace(&mut self.writer, BufWriter::new(file)).into_parts();
        drop(stale);
        self.writer.get_ref().set_len(self.committed_len)?;
        Ok(())
    }

    /// Flush and fsync pending appends.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Atomically replace the journal contents with `entries`.
    pub fn rewrite(&mut self, entries: &[JournalEntry]) -> Result<()> {
        self.sync()?;

        let tmp_path = self.path.with_extension("journal.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            Self::write_header(&mut file)?;
            let mut writer = BufWriter::new(file);
            for entry in entries {
                Self::write_entry(&mut writer, entry)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        self.writer = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        self.committed_len = fs::metadata(&self.path)?.len();
        self.unsynced = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay(path: &Path) -> Result<Vec<JournalEntry>> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut reader = BufReader::new(&file);

        let mut header = [0u8; HEADER_LEN as usize];
        if read_up_to(&mut reader, &mut header)? < header.len() {
            return Err(CatalogError::InvalidFormat("Journal header truncated".into()));
        }
        if &header[..4] != JOURNAL_MAGIC {
            return Err(CatalogError::InvalidFormat("Invalid journal magic".into()));
        }
        if header[4] != JOURNAL_VERSION {
            return Err(CatalogError::InvalidFormat(format!(
                "Unsupported journal version: {}",
                header[4]
            )));
        }

        let mut entries = Vec::new();
        let mut valid_end = HEADER_LEN;
        loop {
            match Self::read_entry(&mut reader, valid_end)? {
                Frame::Entry(entry, len) => {
                    entries.push(entry);
                    valid_end += len;
                }
                Frame::End => break,
                Frame::Torn => {
                    warn!(
                        path = %path.display(),
                        offset = valid_end,
                        "truncating torn journal tail"
                    );
                    drop(reader);
                    file.set_len(valid_end)?;
                    file.sync_all()?;
                    break;
                }
            }
        }

        Ok(entries)
    }

    fn write_header(file: &mut File) -> Result<()> {
        file.write_all(JOURNAL_MAGIC)?;
        file.write_all(&[JOURNAL_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    /// Write one frame; returns its length in bytes.
    fn write_entry(writer: &mut impl Write, entry: &JournalEntry) -> Result<u64> {
        let encoded = rmp_serde::to_vec(entry)?;

        let len = encoded.len() as u32;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&encoded)?;
        writer.write_all(&crc32fast::hash(&encoded).to_le_bytes())?;

        Ok(8 + u64::from(len))
    }

    fn read_entry(reader: &mut impl Read, offset: u64) -> Result<Frame> {
        let mut len_bytes = [0u8; 4];
        match read_up_to(reader, &mut len_bytes)? {
            0 => return Ok(Frame::End),
            4 => {}
            _ => return Ok(Frame::Torn),
        }
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_ENTRY_BYTES {
            return Err(CatalogError::Corruption(format!(
                "journal entry at offset {offset} claims {len} bytes"
            )));
        }

        let mut encoded = vec![0u8; len];
        if read_up_to(reader, &mut encoded)? < len {
            return Ok(Frame::Torn);
        }

        let mut checksum_bytes = [0u8; 4];
        if read_up_to(reader, &mut checksum_bytes)? < 4 {
            return Ok(Frame::Torn);
        }
        if u32::from_le_bytes(checksum_bytes) != crc32fast::hash(&encoded) {
            return Err(CatalogError::Corruption(format!(
                "journal checksum mismatch at offset {offset}"
            )));
        }

        let entry = rmp_serde::from_slice(&encoded)?;
        Ok(Frame::Entry(entry, 8 + len as u64))
    }
}

/// Fill as much of `buf` as the reader can supply; returns bytes read.
fn read_up_to(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
