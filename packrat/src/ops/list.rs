//! Entry listing.

use crate::pack::{FileTime, Pack};

/// One listed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry name, case-preserving, `/`-separated.
    pub name: String,
    /// Uncompressed length in bytes.
    pub len: u64,
    /// Stored timestamp, absent when the format has none.
    pub mtime: Option<FileTime>,
}

/// List an archive's entries in table order, optionally filtered by a
/// case-insensitive substring of the entry name.
pub fn list_entries(pack: &Pack, filter: Option<&str>) -> Vec<EntryInfo> {
    let needle = filter.map(str::to_lowercase);
    (0..pack.entry_count())
        .filter(|&i| match &needle {
            Some(n) => pack.entry_name(i).to_lowercase().contains(n),
            None => true,
        })
        .map(|i| EntryInfo {
            name: pack.entry_name(i).to_string(),
            len: pack.entry_len(i),
            mtime: pack.entry_mtime(i),
        })
        .collect()
}
