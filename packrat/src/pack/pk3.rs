//! Compressed backend (PK3) over the zip codec.
//!
//! The central directory is enumerated once at open; directory-only records
//! are discarded. The zip codec owns the wire details: the UTF-8 name flag
//! (legacy names decode as CP437), DOS timestamps with their 1980 epoch
//! floor, and per-entry deflate streams.
//!
//! New entries are stored uncompressed when the extension marks an
//! already-compressed media payload, and deflated at maximum level
//! otherwise. Entries appended in a session become readable once the
//! archive is closed and reopened; reads of pre-existing entries stay
//! valid across interleaved appends since the reader keeps its own copy of
//! the central directory.

use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::time::{self, FileTime};
use super::{Backend, WarnSink};
use crate::error::{Error, Result};

const MAX_NAME_LEN: usize = u16::MAX as usize - 1;

/// Extensions whose payloads are already compressed; deflating them again
/// costs CPU for no size win.
const STORED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "mp3", "ogg", "opus", "flac"];

struct Pk3Entry {
    name: String,
    len: u64,
    mtime: Option<FileTime>,
    /// Central-directory position; `None` for entries appended in this
    /// session, which are not readable until the archive is reopened.
    zip_index: Option<usize>,
}

pub(crate) struct Pk3Pack {
    path: PathBuf,
    archive: Option<ZipArchive<File>>,
    writer: Option<ZipWriter<File>>,
    entries: Vec<Pk3Entry>,
    /// Active read cursor: the entry decompressed into memory.
    read_buf: Option<Cursor<Vec<u8>>>,
    warn: WarnSink,
}

impl Pk3Pack {
    pub(crate) fn open(path: &Path, writable: bool, warn: WarnSink) -> Result<Self> {
        let mut archive = ZipArchive::new(File::open(path)?)?;

        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let record = archive.by_index_raw(i)?;
            if record.is_dir() || record.name().ends_with('/') {
                continue;
            }
            entries.push(Pk3Entry {
                name: record.name().to_string(),
                len: record.size(),
                mtime: record.last_modified().and_then(time::from_zip_datetime),
                zip_index: Some(i),
            });
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened PK3 archive");

        let writer = if writable {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            Some(ZipWriter::new_append(file)?)
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            archive: Some(archive),
            writer,
            entries,
            read_buf: None,
            warn,
        })
    }

    pub(crate) fn create(path: &Path, warn: WarnSink) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            archive: None,
            writer: Some(ZipWriter::new(file)),
            entries: Vec::new(),
            read_buf: None,
            warn,
        })
    }
}

/// Compression choice for a new entry, by extension.
fn compression_for_name(name: &str) -> (CompressionMethod, Option<i64>) {
    let ext = name.rsplit('.').next().map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some(e) if STORED_EXTENSIONS.contains(&e) => (CompressionMethod::Stored, None),
        _ => (CompressionMethod::Deflated, Some(9)),
    }
}

impl Backend for Pk3Pack {
    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn entry_name(&self, idx: usize) -> &str {
        &self.entries[idx].name
    }

    fn entry_len(&self, idx: usize) -> u64 {
        self.entries[idx].len
    }

    fn entry_mtime(&self, idx: usize) -> Option<FileTime> {
        self.entries[idx].mtime
    }

    fn open_entry(&mut self, idx: usize) -> Result<()> {
        let entry = &self.entries[idx];
        let Some(zip_index) = entry.zip_index else {
            return Err(Error::EntryUnavailable {
                name: entry.name.clone(),
            });
        };
        let archive = self.archive.as_mut().ok_or(Error::NoReadEntry)?;

        let mut file = archive.by_index(zip_index)?;
        let mut data = Vec::with_capacity(entry.len as usize);
        file.read_to_end(&mut data)?;
        self.read_buf = Some(Cursor::new(data));
        Ok(())
    }

    fn new_entry(&mut self, name: &str, mtime: Option<FileTime>) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or(Error::NotWritable)?;

        let (method, level) = compression_for_name(name);
        let mut options = SimpleFileOptions::default()
            .compression_method(method)
            .compression_level(level);
        if let Some(ts) = mtime {
            match time::to_zip_datetime(ts) {
                Some(zdt) => options = options.last_modified_time(zdt),
                None => self.warn.emit(name, "timestamp outside the zip epoch range"),
            }
        }

        writer.start_file(name, options)?;
        self.entries.push(Pk3Entry {
            name: name.to_string(),
            len: 0,
            mtime,
            zip_index: None,
        });
        Ok(self.entries.len() - 1)
    }

    fn read_entry(&mut self, _idx: usize, buf: &mut [u8]) -> Result<usize> {
        let cursor = self.read_buf.as_mut().ok_or(Error::NoReadEntry)?;
        Ok(cursor.read(buf)?)
    }

    fn write_entry(&mut self, idx: usize, buf: &[u8]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or(Error::NoWriteEntry)?;
        writer.write_all(buf)?;
        self.entries[idx].len += buf.len() as u64;
        Ok(buf.len())
    }

    fn close_read(&mut self, _idx: usize) -> Result<()> {
        self.read_buf = None;
        Ok(())
    }

    fn close_write(&mut self, _idx: usize) -> Result<()> {
        // The codec finalizes the entry's local header when the next entry
        // starts or the archive finishes.
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.read_buf = None;
        self.archive = None;
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        Ok(())
    }

    fn max_name_len(&self) -> usize {
        MAX_NAME_LEN
    }
}
