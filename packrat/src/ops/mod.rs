//! Batch operations over archive sessions: listing, merge/convert,
//! extraction, and differencing.

mod convert;
mod diff;
mod extract;
mod list;

pub use convert::{ConvertOutcome, convert_packs};
pub use diff::{DiffChange, DiffReport, diff_packs};
pub use extract::extract_pack;
pub use list::{EntryInfo, list_entries};

use crate::error::{Error, Result};
use crate::pack::Pack;

/// Stream-copy chunk size shared by the engines.
const COPY_CHUNK: usize = 64 * 1024;

/// Stream one entry from `src` into `dest`, carrying the source timestamp.
///
/// Returns `Ok(false)` when the entry was skipped (missing in the source or
/// a duplicate in the destination); those conditions have already been
/// reported through the warning sink. Short writes are fatal.
pub(crate) fn copy_entry(src: &mut Pack, dest: &mut Pack, name: &str) -> Result<bool> {
    if !src.open_entry(name)? {
        return Ok(false);
    }
    let mtime = src.entry_timestamp();

    match dest.new_entry(name, mtime) {
        Ok(true) => {}
        Ok(false) => {
            src.close_read_entry()?;
            return Ok(false);
        }
        Err(e) => {
            // Leave the source in a reusable state; the batch is aborting
            // anyway, but the caller owns that decision.
            let _ = src.close_read_entry();
            return Err(e);
        }
    }

    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let written = dest.write(&buf[..n])?;
        if written != n {
            return Err(Error::ShortWrite {
                written,
                expected: n,
            });
        }
    }

    dest.close_write_entry()?;
    src.close_read_entry()?;
    Ok(true)
}
