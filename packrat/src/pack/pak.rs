//! Flat-table backend (PAK).
//!
//! Layout: `"PACK"` magic, little-endian u32 directory offset, little-endian
//! u32 directory size, the data region, then one contiguous directory table
//! of fixed 64-byte records (56-byte NUL-padded name, u32 data offset, u32
//! data length). The table is appended and the header patched only at
//! close, which is the format's single two-phase commit point.
//!
//! Archives of this vintage bound the entry count per file; when a volume
//! fills up, writing rolls over to a successor file named by incrementing
//! the numeric suffix of the stem.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::names;
use super::time::FileTime;
use super::{Backend, WarnSink};
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"PACK";
const HEADER_SIZE: u64 = 12;
const NAME_FIELD: usize = 56;
const RECORD_SIZE: u64 = 64;
const MAX_NAME_LEN: usize = NAME_FIELD - 1;
const MAX_ENTRIES_PER_VOLUME: usize = 2048;
const MAX_FILE_SIZE: u64 = i32::MAX as u64;
const MAX_ENTRY_SIZE: u64 = i32::MAX as u64;

struct PakEntry {
    name: String,
    pos: u64,
    len: u64,
}

pub(crate) struct PakPack {
    file: File,
    path: PathBuf,
    entries: Vec<PakEntry>,
    /// First entry belonging to the current volume; everything before it
    /// was finalized into an earlier volume during rollover.
    volume_base: usize,
    /// Append position for the next entry's data.
    write_offset: u64,
    /// Read cursor state.
    read_pos: u64,
    read_remaining: u64,
    /// Write cursor append position.
    write_pos: u64,
    warn: WarnSink,
}

impl PakPack {
    pub(crate) fn open(path: &Path, writable: bool, warn: WarnSink) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(writable).open(path)?;
        let file_len = file.metadata()?.len();

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).map_err(|_| Error::Truncated)?;
        if &magic != MAGIC {
            return Err(Error::BadMagic { expected: "PACK" });
        }

        let table_offset = u64::from(file.read_u32::<LittleEndian>().map_err(|_| Error::Truncated)?);
        let table_size = u64::from(file.read_u32::<LittleEndian>().map_err(|_| Error::Truncated)?);
        if table_offset + table_size > file_len {
            return Err(Error::TableOutOfBounds {
                offset: table_offset,
                size: table_size,
                file_len,
            });
        }

        let count = (table_size / RECORD_SIZE) as usize;
        let mut entries = Vec::with_capacity(count);

        file.seek(SeekFrom::Start(table_offset))?;
        for _ in 0..count {
            let mut name_buf = [0u8; NAME_FIELD];
            file.read_exact(&mut name_buf).map_err(|_| Error::Truncated)?;
            let pos = u64::from(file.read_u32::<LittleEndian>().map_err(|_| Error::Truncated)?);
            let len = u64::from(file.read_u32::<LittleEndian>().map_err(|_| Error::Truncated)?);
            if pos + len > file_len {
                return Err(Error::TableOutOfBounds {
                    offset: pos,
                    size: len,
                    file_len,
                });
            }
            entries.push(PakEntry {
                name: names::decode_table_name(&name_buf),
                pos,
                len,
            });
        }
        tracing::debug!(path = %path.display(), entries = count, "opened PAK archive");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries,
            volume_base: 0,
            // New data overwrites the old table; it is rewritten at close.
            write_offset: table_offset,
            read_pos: 0,
            read_remaining: 0,
            write_pos: 0,
            warn,
        })
    }

    pub(crate) fn create(path: &Path, warn: WarnSink) -> Result<Self> {
        let file = Self::create_volume(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries: Vec::new(),
            volume_base: 0,
            write_offset: HEADER_SIZE,
            read_pos: 0,
            read_remaining: 0,
            write_pos: 0,
            warn,
        })
    }

    /// Write the minimal valid empty container: magic plus a zeroed
    /// placeholder table offset/size, patched at close.
    fn create_volume(path: &Path) -> Result<File> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(MAGIC)?;
        file.write_u32::<LittleEndian>(0)?;
        file.write_u32::<LittleEndian>(0)?;
        Ok(file)
    }

    /// Append the current volume's directory table and patch the header.
    fn finalize_volume(&mut self) -> Result<()> {
        let table_offset = self.write_offset;
        let volume_entries = &self.entries[self.volume_base..];
        let table_size = volume_entries.len() as u64 * RECORD_SIZE;

        if table_offset + table_size > MAX_FILE_SIZE {
            return Err(Error::ArchiveTooLarge {
                size: table_offset + table_size,
                max: MAX_FILE_SIZE,
            });
        }

        self.file.seek(SeekFrom::Start(table_offset))?;
        for entry in volume_entries {
            let mut name_buf = [0u8; NAME_FIELD];
            name_buf[..entry.name.len()].copy_from_slice(entry.name.as_bytes());
            self.file.write_all(&name_buf)?;
            self.file.write_u32::<LittleEndian>(entry.pos as u32)?;
            self.file.write_u32::<LittleEndian>(entry.len as u32)?;
        }

        self.file.seek(SeekFrom::Start(4))?;
        self.file.write_u32::<LittleEndian>(table_offset as u32)?;
        self.file.write_u32::<LittleEndian>(table_size as u32)?;
        self.file.flush()?;
        tracing::debug!(
            path = %self.path.display(),
            entries = volume_entries.len(),
            table_offset,
            "finalized PAK volume"
        );
        Ok(())
    }

    /// Finalize the full volume and continue in its successor.
    fn roll_over(&mut self) -> Result<()> {
        let next = successor_path(&self.path).ok_or_else(|| Error::RolloverUnavailable {
            path: self.path.clone(),
        })?;
        self.finalize_volume()?;

        tracing::debug!(from = %self.path.display(), to = %next.display(), "rolling over to next PAK volume");
        self.warn.emit(
            &next.display().to_string(),
            "volume full, continuing in next volume",
        );
        self.file = Self::create_volume(&next)?;
        self.path = next;
        self.volume_base = self.entries.len();
        self.write_offset = HEADER_SIZE;
        Ok(())
    }
}

/// Successor volume path: increment the numeric suffix of the stem,
/// preserving its width (`data08.pak` becomes `data09.pak`). Stems with no
/// trailing digits have no successor.
fn successor_path(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let digits_at = stem
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + stem[i..].chars().next().map_or(1, char::len_utf8));
    let digits = &stem[digits_at..];
    if digits.is_empty() {
        return None;
    }
    let next: u64 = digits.parse::<u64>().ok()?.checked_add(1)?;
    let mut name = format!("{}{:0width$}", &stem[..digits_at], next, width = digits.len());
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    Some(path.with_file_name(name))
}

impl Backend for PakPack {
    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn entry_name(&self, idx: usize) -> &str {
        &self.entries[idx].name
    }

    fn entry_len(&self, idx: usize) -> u64 {
        self.entries[idx].len
    }

    fn entry_mtime(&self, _idx: usize) -> Option<FileTime> {
        // The format has no concept of time.
        None
    }

    fn open_entry(&mut self, idx: usize) -> Result<()> {
        self.read_pos = self.entries[idx].pos;
        self.read_remaining = self.entries[idx].len;
        Ok(())
    }

    fn new_entry(&mut self, name: &str, _mtime: Option<FileTime>) -> Result<usize> {
        if self.entries.len() - self.volume_base >= MAX_ENTRIES_PER_VOLUME {
            self.roll_over()?;
        }

        self.entries.push(PakEntry {
            name: name.to_string(),
            pos: self.write_offset,
            len: 0,
        });
        self.write_pos = self.write_offset;
        Ok(self.entries.len() - 1)
    }

    fn read_entry(&mut self, _idx: usize, buf: &mut [u8]) -> Result<usize> {
        let want = buf.len().min(self.read_remaining as usize);
        if want == 0 {
            return Ok(0);
        }
        self.file.seek(SeekFrom::Start(self.read_pos))?;
        self.file.read_exact(&mut buf[..want])?;
        self.read_pos += want as u64;
        self.read_remaining -= want as u64;
        Ok(want)
    }

    fn write_entry(&mut self, idx: usize, buf: &[u8]) -> Result<usize> {
        let entry = &mut self.entries[idx];
        if entry.len + buf.len() as u64 > MAX_ENTRY_SIZE {
            return Err(Error::EntryTooLarge {
                name: entry.name.clone(),
                max: MAX_ENTRY_SIZE,
            });
        }
        self.file.seek(SeekFrom::Start(self.write_pos))?;
        self.file.write_all(buf)?;
        self.write_pos += buf.len() as u64;
        entry.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn close_read(&mut self, _idx: usize) -> Result<()> {
        self.read_pos = 0;
        self.read_remaining = 0;
        Ok(())
    }

    fn close_write(&mut self, _idx: usize) -> Result<()> {
        // The table row is deferred until close; only the append position
        // moves forward.
        self.write_offset = self.write_pos;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.finalize_volume()
    }

    fn max_name_len(&self) -> usize {
        MAX_NAME_LEN
    }
}
