//! Extraction of archives into per-archive directories.

use std::fs;
use std::path::Path;

use super::copy_entry;
use crate::error::Result;
use crate::pack::{WarnSink, create_directory_pack, open_pack};

/// Extract every entry of the archive at `archive_path` into a subfolder
/// of `out_dir` named after the archive (its file stem).
///
/// Returns the number of entries written.
pub fn extract_pack(archive_path: &Path, out_dir: &Path, warn: &WarnSink) -> Result<usize> {
    let mut src = open_pack(archive_path, false, warn.clone())?;

    let subfolder = archive_path
        .file_stem()
        .unwrap_or_else(|| archive_path.as_os_str())
        .to_os_string();
    fs::create_dir_all(out_dir)?;
    let mut dest = create_directory_pack(out_dir.join(subfolder), warn.clone())?;

    let names: Vec<String> = (0..src.entry_count())
        .map(|i| src.entry_name(i).to_string())
        .collect();
    tracing::debug!(archive = %archive_path.display(), entries = names.len(), "extracting archive");

    let mut written = 0;
    for name in &names {
        if copy_entry(&mut src, &mut dest, name)? {
            written += 1;
        }
    }

    dest.close()?;
    src.close()?;
    Ok(written)
}
