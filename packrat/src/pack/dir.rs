//! Directory backend: a filesystem tree treated as an archive.
//!
//! Each entry is one regular file; the entry name is the relative path with
//! segments joined by `/`. Timestamps come from filesystem modification
//! time, converted through the civil intermediate in [`super::time`].

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::time::{self, FileTime};
use super::{Backend, WarnSink};
use crate::error::{Error, Result};

// Generous cap; real path limits are enforced by the OS on open.
const MAX_NAME_LEN: usize = 4096;

struct DirEntryRec {
    name: String,
    syspath: PathBuf,
    len: u64,
    mtime: Option<FileTime>,
}

pub(crate) struct DirPack {
    base: PathBuf,
    entries: Vec<DirEntryRec>,
    warn: WarnSink,
    reader: Option<File>,
    writer: Option<File>,
    pending_mtime: Option<FileTime>,
}

impl DirPack {
    pub(crate) fn open(path: &Path, warn: WarnSink) -> Result<Self> {
        let mut entries = Vec::new();
        for item in WalkDir::new(path).follow_links(false) {
            let item = item?;
            if !item.file_type().is_file() {
                continue;
            }
            let rel = item
                .path()
                .strip_prefix(path)
                .map_err(|_| Error::WalkDir(format!("path escapes base: {}", item.path().display())))?;
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let meta = item.metadata()?;
            entries.push(DirEntryRec {
                name,
                syspath: item.path().to_path_buf(),
                len: meta.len(),
                mtime: meta.modified().ok().map(time::from_system_time),
            });
        }
        tracing::debug!(path = %path.display(), entries = entries.len(), "enumerated directory archive");

        Ok(Self {
            base: path.to_path_buf(),
            entries,
            warn,
            reader: None,
            writer: None,
            pending_mtime: None,
        })
    }

    pub(crate) fn create(path: &Path, warn: WarnSink) -> Result<Self> {
        fs::create_dir(path)?;
        Ok(Self {
            base: path.to_path_buf(),
            entries: Vec::new(),
            warn,
            reader: None,
            writer: None,
            pending_mtime: None,
        })
    }
}

impl Backend for DirPack {
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
        self.reader = Some(File::open(&self.entries[idx].syspath)?);
        Ok(())
    }

    fn new_entry(&mut self, name: &str, mtime: Option<FileTime>) -> Result<usize> {
        let mut syspath = self.base.clone();
        for part in name.split('/') {
            syspath.push(part);
        }
        // Parent directories exist only once an entry actually needs them.
        if let Some(parent) = syspath.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&syspath)?;
        self.writer = Some(file);
        self.pending_mtime = mtime;

        self.entries.push(DirEntryRec {
            name: name.to_string(),
            syspath,
            len: 0,
            mtime,
        });
        Ok(self.entries.len() - 1)
    }

    fn read_entry(&mut self, _idx: usize, buf: &mut [u8]) -> Result<usize> {
        let reader = self.reader.as_mut().ok_or(Error::NoReadEntry)?;
        Ok(reader.read(buf)?)
    }

    fn write_entry(&mut self, idx: usize, buf: &[u8]) -> Result<usize> {
        let writer = self.writer.as_mut().ok_or(Error::NoWriteEntry)?;
        writer.write_all(buf)?;
        self.entries[idx].len += buf.len() as u64;
        Ok(buf.len())
    }

    fn close_read(&mut self, _idx: usize) -> Result<()> {
        self.reader = None;
        Ok(())
    }

    fn close_write(&mut self, idx: usize) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.sync_data()?;
            if let Some(mtime) = self.pending_mtime.take() {
                match time::to_system_time(mtime) {
                    Some(st) => writer.set_modified(st)?,
                    None => self
                        .warn
                        .emit(&self.entries[idx].name, "timestamp not representable in local time"),
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.writer = None;
        Ok(())
    }

    fn max_name_len(&self) -> usize {
        MAX_NAME_LEN
    }
}
