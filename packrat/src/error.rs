//! Error types for `packrat`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `packrat` operations.
///
/// Recoverable conditions (duplicate entries, entries not found, name
/// encoding concerns) are not errors; they are surfaced through the
/// warning sink so batch operations can continue.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the zip codec backing PK3 archives.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDir(String),

    /// A stream copy wrote fewer bytes than requested.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes actually written.
        written: usize,
        /// Bytes requested.
        expected: usize,
    },

    // ==================== Structural Errors ====================
    /// The file does not start with the expected magic bytes.
    #[error("invalid archive magic: expected {expected}")]
    BadMagic {
        /// The magic string the format requires.
        expected: &'static str,
    },

    /// Unexpected end of file while parsing an archive structure.
    #[error("unexpected end of file")]
    Truncated,

    /// The declared directory table lies outside the physical file.
    #[error("directory table out of bounds: offset {offset} + size {size} > file length {file_len}")]
    TableOutOfBounds {
        /// Declared table offset.
        offset: u64,
        /// Declared table size in bytes.
        size: u64,
        /// Physical file length.
        file_len: u64,
    },

    /// The physical file length disagrees with the directory table.
    #[error("archive size mismatch: table declares {expected} bytes, file has {actual}")]
    SizeMismatch {
        /// File length implied by the directory table.
        expected: u64,
        /// Actual file length.
        actual: u64,
    },

    /// The path is not recognized as any supported archive kind.
    #[error("not a supported archive: {path}")]
    UnsupportedArchive {
        /// The offending path.
        path: PathBuf,
    },

    // ==================== Capacity Errors ====================
    /// An entry name exceeds the backend's hard name length limit.
    #[error("entry name too long: {name} ({len} bytes, maximum is {max})")]
    NameTooLong {
        /// The offending name.
        name: String,
        /// Its encoded length in bytes.
        len: usize,
        /// The backend's limit.
        max: usize,
    },

    /// The backend's maximum entry count was reached.
    #[error("archive is full: {max} entries")]
    TooManyEntries {
        /// The backend's entry count limit.
        max: usize,
    },

    /// Multi-volume rollover requires a numeric suffix in the file stem.
    #[error("cannot roll over to a new volume: {path} has no numeric suffix")]
    RolloverUnavailable {
        /// The current volume's path.
        path: PathBuf,
    },

    /// A single entry grew past what the format can record.
    #[error("entry too large: {name} exceeds {max} bytes")]
    EntryTooLarge {
        /// The entry being written.
        name: String,
        /// The format's per-entry size limit.
        max: u64,
    },

    /// The whole archive grew past what the format can address.
    #[error("archive too large: {size} bytes (maximum is {max})")]
    ArchiveTooLarge {
        /// The would-be archive size.
        size: u64,
        /// The format's file size limit.
        max: u64,
    },

    // ==================== Protocol Violations ====================
    /// The archive was opened read-only.
    #[error("archive is not writable")]
    NotWritable,

    /// An entry name must not be empty.
    #[error("entry name is empty")]
    EmptyEntryName,

    /// A reservation batch is already pending.
    #[error("entry batch already pending")]
    BatchPending,

    /// Close was requested while a reservation batch is still open.
    #[error("entry batch still open: {written} of {reserved} reserved entries written")]
    BatchOpen {
        /// Entries written so far in the batch.
        written: usize,
        /// Entries reserved for the batch.
        reserved: usize,
    },

    /// A read entry is already open on this archive.
    #[error("a read entry is already open")]
    ReadCursorActive,

    /// A write entry is already open on this archive.
    #[error("a write entry is already open")]
    WriteCursorActive,

    /// Read was called with no entry open for reading.
    #[error("no entry open for reading")]
    NoReadEntry,

    /// Write was called with no entry open for writing.
    #[error("no entry open for writing")]
    NoWriteEntry,

    /// The entry was appended in this session and only becomes readable
    /// once the archive is closed and reopened.
    #[error("entry not readable until the archive is reopened: {name}")]
    EntryUnavailable {
        /// The pending entry's name.
        name: String,
    },
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDir(err.to_string())
    }
}

/// A specialized Result type for `packrat` operations.
pub type Result<T> = std::result::Result<T, Error>;
