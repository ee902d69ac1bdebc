//! Relocating-table backend (GRP).
//!
//! Layout: `"KenSilverman"` magic, little-endian u32 entry count, then the
//! directory table (12-byte NUL-padded name + u32 length per record), then
//! the data region. No offsets are stored; each entry's data offset is the
//! sum of all prior entries' lengths plus the header and table size.
//!
//! Because the table precedes the data, growing it means physically
//! shifting every existing data byte toward the end of the file. The shift
//! runs once per reservation batch (`pre_reserve`), not per insertion; each
//! entry's table row is then patched in place when its write cursor closes.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::names;
use super::time::FileTime;
use super::{Backend, WarnSink};
use crate::error::{Error, Result};

const MAGIC: &[u8; 12] = b"KenSilverman";
const HEADER_SIZE: u64 = 16;
const NAME_FIELD: usize = 12;
const RECORD_SIZE: u64 = 16;
const MAX_NAME_LEN: usize = NAME_FIELD;
const MAX_ENTRY_SIZE: u64 = u32::MAX as u64;
const SHIFT_BLOCK: u64 = 4096;

struct GrpEntry {
    name: String,
    pos: u64,
    len: u64,
}

pub(crate) struct GrpPack {
    file: File,
    path: PathBuf,
    entries: Vec<GrpEntry>,
    /// Reserved-but-unwritten table rows of the active batch.
    pending_reserved: Option<usize>,
    pending_used: usize,
    read_pos: u64,
    read_remaining: u64,
    write_pos: u64,
    warn: WarnSink,
}

impl GrpPack {
    pub(crate) fn open(path: &Path, writable: bool, warn: WarnSink) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(writable).open(path)?;
        let file_len = file.metadata()?.len();

        let mut magic = [0u8; 12];
        file.read_exact(&mut magic).map_err(|_| Error::Truncated)?;
        if &magic != MAGIC {
            return Err(Error::BadMagic {
                expected: "KenSilverman",
            });
        }

        let count = u64::from(file.read_u32::<LittleEndian>().map_err(|_| Error::Truncated)?);
        let data_start = HEADER_SIZE + count * RECORD_SIZE;
        if data_start > file_len {
            return Err(Error::TableOutOfBounds {
                offset: HEADER_SIZE,
                size: count * RECORD_SIZE,
                file_len,
            });
        }

        let mut entries = Vec::with_capacity(count as usize);
        let mut pos = data_start;
        for _ in 0..count {
            let mut name_buf = [0u8; NAME_FIELD];
            file.read_exact(&mut name_buf).map_err(|_| Error::Truncated)?;
            let len = u64::from(file.read_u32::<LittleEndian>().map_err(|_| Error::Truncated)?);
            entries.push(GrpEntry {
                // Old DOS tools wrote these in the PC's native code page.
                name: names::decode_cp437(&name_buf),
                pos,
                len,
            });
            pos += len;
        }

        if pos != file_len {
            return Err(Error::SizeMismatch {
                expected: pos,
                actual: file_len,
            });
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened GRP archive");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries,
            pending_reserved: None,
            pending_used: 0,
            read_pos: 0,
            read_remaining: 0,
            write_pos: 0,
            warn,
        })
    }

    pub(crate) fn create(path: &Path, warn: WarnSink) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(MAGIC)?;
        file.write_u32::<LittleEndian>(0)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries: Vec::new(),
            pending_reserved: None,
            pending_used: 0,
            read_pos: 0,
            read_remaining: 0,
            write_pos: 0,
            warn,
        })
    }

    /// Make room for `additional` table rows by moving the whole data
    /// region `additional * RECORD_SIZE` bytes toward the end of file.
    ///
    /// The tail seeds the shifted region first: the last
    /// `min(shift, data_size)` bytes are written at their final position,
    /// then the remaining data is walked backward in fixed-size blocks so
    /// no block is overwritten before it has been moved. The vacated table
    /// slots are zero-filled and the header count is raised to cover the
    /// reservation.
    fn shift_data(&mut self, additional: usize) -> Result<()> {
        let shift = additional as u64 * RECORD_SIZE;
        let data_start = HEADER_SIZE + self.entries.len() as u64 * RECORD_SIZE;
        let data_size: u64 = self.entries.iter().map(|e| e.len).sum();
        let data_end = data_start + data_size;

        if data_size > 0 {
            let seed = shift.min(data_size);
            let mut buf = vec![0u8; seed as usize];
            self.file.seek(SeekFrom::Start(data_end - seed))?;
            self.file.read_exact(&mut buf)?;
            self.file.seek(SeekFrom::Start(data_end + shift - seed))?;
            self.file.write_all(&buf)?;

            let mut block = vec![0u8; SHIFT_BLOCK as usize];
            let mut remaining = data_size - seed;
            while remaining > 0 {
                let chunk = remaining.min(SHIFT_BLOCK);
                let pos = data_start + remaining - chunk;
                self.file.seek(SeekFrom::Start(pos))?;
                self.file.read_exact(&mut block[..chunk as usize])?;
                self.file.seek(SeekFrom::Start(pos + shift))?;
                self.file.write_all(&block[..chunk as usize])?;
                remaining -= chunk;
            }
        }

        // Zero the opened table slots so a torn batch is at least visible.
        self.file.seek(SeekFrom::Start(data_start))?;
        let zeros = vec![0u8; shift as usize];
        self.file.write_all(&zeros)?;

        self.file.seek(SeekFrom::Start(MAGIC.len() as u64))?;
        self.file
            .write_u32::<LittleEndian>((self.entries.len() + additional) as u32)?;

        // Every stored entry now lives `shift` bytes further in.
        for entry in &mut self.entries {
            entry.pos += shift;
        }
        tracing::debug!(
            path = %self.path.display(),
            additional,
            moved = data_size,
            "shifted GRP data region"
        );
        Ok(())
    }

    /// Patch one finished entry's table row in place.
    fn write_table_row(&mut self, idx: usize) -> Result<()> {
        let entry = &self.entries[idx];
        let mut name_buf = [0u8; NAME_FIELD];
        let encoded = names::encode_cp437(&entry.name);
        name_buf[..encoded.len()].copy_from_slice(&encoded);

        self.file
            .seek(SeekFrom::Start(HEADER_SIZE + idx as u64 * RECORD_SIZE))?;
        self.file.write_all(&name_buf)?;
        self.file.write_u32::<LittleEndian>(entry.len as u32)?;
        Ok(())
    }
}

impl Backend for GrpPack {
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
        None
    }

    fn open_entry(&mut self, idx: usize) -> Result<()> {
        self.read_pos = self.entries[idx].pos;
        self.read_remaining = self.entries[idx].len;
        Ok(())
    }

    fn new_entry(&mut self, name: &str, _mtime: Option<FileTime>) -> Result<usize> {
        if self.pending_reserved.is_none() {
            self.pre_reserve(1)?;
        }

        if !names::is_dos_83(name) {
            self.warn.emit(name, "not a DOS 8.3 file name");
        }

        let pos = self.file.seek(SeekFrom::End(0))?;
        self.entries.push(GrpEntry {
            name: name.to_ascii_uppercase(),
            pos,
            len: 0,
        });
        self.write_pos = pos;
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

    fn close_write(&mut self, idx: usize) -> Result<()> {
        self.write_table_row(idx)?;

        self.pending_used += 1;
        if let Some(reserved) = self.pending_reserved {
            if self.pending_used >= reserved {
                self.pending_reserved = None;
                self.pending_used = 0;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Refuse to close a torn batch: reserved rows would remain as
        // zero-filled placeholders in the table.
        if let Some(reserved) = self.pending_reserved {
            return Err(Error::BatchOpen {
                written: self.pending_used,
                reserved,
            });
        }
        self.file.flush()?;
        Ok(())
    }

    fn pre_reserve(&mut self, additional: usize) -> Result<()> {
        if self.pending_reserved.is_some() {
            return Err(Error::BatchPending);
        }
        if additional == 0 {
            return Ok(());
        }
        if self.entries.len() as u64 + additional as u64 > u64::from(u32::MAX) {
            return Err(Error::TooManyEntries {
                max: u32::MAX as usize,
            });
        }
        self.shift_data(additional)?;
        self.pending_reserved = Some(additional);
        self.pending_used = 0;
        Ok(())
    }

    fn max_name_len(&self) -> usize {
        MAX_NAME_LEN
    }
}
