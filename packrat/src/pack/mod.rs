//! Pack archive sessions and backend dispatch.
//!
//! A [`Pack`] is an open session over one physical container: a plain
//! directory, a flat-table PAK file, a relocating-table GRP file, or a
//! compressed PK3/zip file. The backend is chosen once at open/create time
//! from the path; everything above it speaks the same entry lifecycle.

mod dir;
mod grp;
mod index;
mod names;
mod pak;
mod pk3;
mod time;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use index::EntryIndex;

pub use time::FileTime;

/// Receives `(entry name, message)` pairs for non-fatal conditions.
///
/// Warnings never abort a batch operation; they exist so callers can report
/// skipped duplicates, missing entries, and name encoding concerns without
/// stopping the surrounding work.
#[derive(Clone)]
pub struct WarnSink(Option<Arc<dyn Fn(&str, &str) + Send + Sync>>);

impl WarnSink {
    /// Wrap a warning callback.
    pub fn new(f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        Self(Some(Arc::new(f)))
    }

    /// A sink that drops all warnings.
    pub fn silent() -> Self {
        Self(None)
    }

    pub(crate) fn emit(&self, entry: &str, message: &str) {
        tracing::debug!(entry, message, "archive warning");
        if let Some(f) = &self.0 {
            f(entry, message);
        }
    }
}

impl Default for WarnSink {
    fn default() -> Self {
        Self::silent()
    }
}

impl std::fmt::Debug for WarnSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WarnSink")
            .field(&self.0.as_ref().map(|_| "fn"))
            .finish()
    }
}

/// The operations every archive backend implements.
///
/// Entry identifiers are indices into the backend's entry table, handed out
/// by `new_entry` and resolved through the session's [`EntryIndex`]. Each
/// backend keeps its own locator data (byte offsets, zip positions,
/// filesystem paths) private.
pub(crate) trait Backend: Send {
    fn entry_count(&self) -> usize;
    fn entry_name(&self, idx: usize) -> &str;
    fn entry_len(&self, idx: usize) -> u64;
    fn entry_mtime(&self, idx: usize) -> Option<FileTime>;

    fn open_entry(&mut self, idx: usize) -> Result<()>;
    fn new_entry(&mut self, name: &str, mtime: Option<FileTime>) -> Result<usize>;
    fn read_entry(&mut self, idx: usize, buf: &mut [u8]) -> Result<usize>;
    fn write_entry(&mut self, idx: usize, buf: &[u8]) -> Result<usize>;
    fn close_read(&mut self, idx: usize) -> Result<()>;
    fn close_write(&mut self, idx: usize) -> Result<()>;
    fn close(&mut self) -> Result<()>;

    /// Reserve table space ahead of a bulk insert. A no-op for backends
    /// that do not need it.
    fn pre_reserve(&mut self, additional: usize) -> Result<()> {
        let _ = additional;
        Ok(())
    }

    /// Hard limit on encoded entry name length, in bytes.
    fn max_name_len(&self) -> usize;
}

/// An open archive session.
///
/// Holds at most one read cursor and one write cursor, mutually
/// independent. Sessions are single-threaded; independent sessions own
/// disjoint file handles and may be driven from separate threads.
pub struct Pack {
    backend: Box<dyn Backend>,
    index: EntryIndex,
    warn: WarnSink,
    path: PathBuf,
    writable: bool,
    read_idx: Option<usize>,
    write_idx: Option<usize>,
}

/// Open an existing archive, dispatching the backend by path:
/// directories, `.pak`, `.grp`, and `.pk3`/`.zip` files.
pub fn open_pack(path: impl AsRef<Path>, writable: bool, warn: WarnSink) -> Result<Pack> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), writable, "opening archive");

    let backend: Box<dyn Backend> = if path.is_dir() {
        Box::new(dir::DirPack::open(path, warn.clone())?)
    } else {
        match extension_of(path).as_deref() {
            Some("pak") => Box::new(pak::PakPack::open(path, writable, warn.clone())?),
            Some("grp") => Box::new(grp::GrpPack::open(path, writable, warn.clone())?),
            Some("pk3" | "zip") => Box::new(pk3::Pk3Pack::open(path, writable, warn.clone())?),
            _ => {
                return Err(Error::UnsupportedArchive {
                    path: path.to_path_buf(),
                });
            }
        }
    };

    let mut pack = Pack {
        backend,
        index: EntryIndex::new(),
        warn,
        path: path.to_path_buf(),
        writable,
        read_idx: None,
        write_idx: None,
    };
    pack.rebuild_index();
    Ok(pack)
}

/// Create a new, empty archive. The minimal valid container is written
/// immediately. An extensionless path becomes a new directory archive.
pub fn create_pack(path: impl AsRef<Path>, warn: WarnSink) -> Result<Pack> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "creating archive");

    let backend: Box<dyn Backend> = match extension_of(path).as_deref() {
        Some("pak") => Box::new(pak::PakPack::create(path, warn.clone())?),
        Some("grp") => Box::new(grp::GrpPack::create(path, warn.clone())?),
        Some("pk3" | "zip") => Box::new(pk3::Pk3Pack::create(path, warn.clone())?),
        None => Box::new(dir::DirPack::create(path, warn.clone())?),
        Some(_) => {
            return Err(Error::UnsupportedArchive {
                path: path.to_path_buf(),
            });
        }
    };

    Ok(Pack {
        backend,
        index: EntryIndex::new(),
        warn,
        path: path.to_path_buf(),
        writable: true,
        read_idx: None,
        write_idx: None,
    })
}

/// Create a new directory archive regardless of how the path looks.
///
/// Extraction uses this for stem-named output folders, whose names may
/// contain dots that would otherwise dispatch to a file backend.
pub fn create_directory_pack(path: impl AsRef<Path>, warn: WarnSink) -> Result<Pack> {
    let path = path.as_ref();
    let backend: Box<dyn Backend> = Box::new(dir::DirPack::create(path, warn.clone())?);
    Ok(Pack {
        backend,
        index: EntryIndex::new(),
        warn,
        path: path.to_path_buf(),
        writable: true,
        read_idx: None,
        write_idx: None,
    })
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

impl Pack {
    /// The path this session was opened or created with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether entries may be added to this session.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Number of entries currently in the table.
    pub fn entry_count(&self) -> usize {
        self.backend.entry_count()
    }

    /// Name of the entry at table position `idx` (case-preserving).
    pub fn entry_name(&self, idx: usize) -> &str {
        self.backend.entry_name(idx)
    }

    /// Uncompressed length of the entry at table position `idx`.
    pub fn entry_len(&self, idx: usize) -> u64 {
        self.backend.entry_len(idx)
    }

    /// Stored timestamp of the entry at table position `idx`, if the
    /// format has one.
    pub fn entry_mtime(&self, idx: usize) -> Option<FileTime> {
        self.backend.entry_mtime(idx)
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, name: &str) -> bool {
        self.index.find(&names::canonical_name(name)).is_some()
    }

    /// Begin a new entry for writing.
    ///
    /// Returns `Ok(false)` and emits a warning when an entry with the same
    /// case-insensitive name already exists; the insertion is skipped and
    /// the batch may continue. Name-encoding concerns are warnings too;
    /// empty names, names over the backend's hard limit, and exhausted
    /// entry capacity are errors.
    pub fn new_entry(&mut self, name: &str, mtime: Option<FileTime>) -> Result<bool> {
        if !self.writable {
            return Err(Error::NotWritable);
        }
        if self.write_idx.is_some() {
            return Err(Error::WriteCursorActive);
        }

        let name = names::canonical_name(name);
        if name.is_empty() {
            return Err(Error::EmptyEntryName);
        }
        if !names::is_ascii(&name) {
            self.warn.emit(&name, "new entry contains non-ASCII characters");
        }
        if names::has_control_chars(&name) {
            self.warn.emit(&name, "new entry contains control characters");
        }
        if name.len() > self.backend.max_name_len() {
            return Err(Error::NameTooLong {
                len: name.len(),
                max: self.backend.max_name_len(),
                name,
            });
        }
        if self.index.find(&name).is_some() {
            self.warn.emit(&name, "duplicate entry");
            return Ok(false);
        }

        let idx = self.backend.new_entry(&name, mtime)?;
        self.write_idx = Some(idx);
        Ok(true)
    }

    /// Open an existing entry for reading.
    ///
    /// Returns `Ok(false)` and emits a warning when no entry with that
    /// case-insensitive name exists, so batch callers can continue.
    pub fn open_entry(&mut self, name: &str) -> Result<bool> {
        if self.read_idx.is_some() {
            return Err(Error::ReadCursorActive);
        }

        let name = names::canonical_name(name);
        let Some(idx) = self.index.find(&name) else {
            self.warn.emit(&name, "entry not found");
            return Ok(false);
        };

        self.backend.open_entry(idx)?;
        self.read_idx = Some(idx);
        Ok(true)
    }

    /// Read from the active read cursor. Returns 0 at end of entry.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let idx = self.read_idx.ok_or(Error::NoReadEntry)?;
        self.backend.read_entry(idx, buf)
    }

    /// Write to the active write cursor.
    ///
    /// A return value smaller than `buf.len()` signals an unrecoverable
    /// I/O failure and must be treated as fatal for the whole operation.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let idx = self.write_idx.ok_or(Error::NoWriteEntry)?;
        self.backend.write_entry(idx, buf)
    }

    /// Timestamp of the entry under the active read cursor, if any.
    pub fn entry_timestamp(&self) -> Option<FileTime> {
        self.read_idx.and_then(|idx| self.backend.entry_mtime(idx))
    }

    /// Release the read cursor. Idempotent.
    pub fn close_read_entry(&mut self) -> Result<()> {
        if let Some(idx) = self.read_idx.take() {
            self.backend.close_read(idx)?;
        }
        Ok(())
    }

    /// Release the write cursor and finalize the entry's table row.
    /// Idempotent. Rebuilds the entry index.
    pub fn close_write_entry(&mut self) -> Result<()> {
        if let Some(idx) = self.write_idx.take() {
            self.backend.close_write(idx)?;
            self.rebuild_index();
        }
        Ok(())
    }

    /// Reserve table space for `additional` upcoming entries.
    ///
    /// Meaningful for the relocating-table backend, which can then shift
    /// its data region once instead of per insertion; a successful no-op
    /// everywhere else.
    pub fn pre_reserve(&mut self, additional: usize) -> Result<()> {
        if !self.writable {
            return Err(Error::NotWritable);
        }
        self.backend.pre_reserve(additional)
    }

    /// Close the session, finalizing any deferred backend metadata.
    ///
    /// Safe to call without any prior writes; open cursors are released
    /// first.
    pub fn close(mut self) -> Result<()> {
        self.close_read_entry()?;
        self.close_write_entry()?;
        tracing::debug!(path = %self.path.display(), entries = self.entry_count(), "closing archive");
        self.backend.close()
    }

    fn rebuild_index(&mut self) {
        let Self { backend, index, .. } = self;
        index.rebuild((0..backend.entry_count()).map(|i| backend.entry_name(i)));
        debug_assert!(index.len() <= backend.entry_count());
    }
}

impl std::fmt::Debug for Pack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pack")
            .field("path", &self.path)
            .field("writable", &self.writable)
            .field("entries", &self.entry_count())
            .finish_non_exhaustive()
    }
}
