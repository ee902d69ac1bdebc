//! Merge/convert engine.
//!
//! Unions the entries of N ordered source archives into one destination.
//! When several sources contain the same case-insensitive name, the last
//! source wins: earlier copies are skipped without their bytes ever being
//! read.

use super::copy_entry;
use crate::error::Result;
use crate::pack::{Pack, WarnSink};

/// Tally of a convert run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOutcome {
    /// Entries stream-copied into the destination.
    pub copied: usize,
    /// Entries skipped: overridden by a later source, missing, or already
    /// present in the destination.
    pub skipped: usize,
}

/// Merge `sources` (in order) into `dest`.
///
/// A write failure mid-copy is fatal to the whole operation; partially
/// written output is left as-is.
pub fn convert_packs(sources: &mut [Pack], dest: &mut Pack, warn: &WarnSink) -> Result<ConvertOutcome> {
    let mut outcome = ConvertOutcome::default();

    // Decide up front which entries survive the last-source-wins override,
    // so skipped entries are never opened at all.
    let mut plan: Vec<Vec<String>> = Vec::with_capacity(sources.len());
    for i in 0..sources.len() {
        let mut keep = Vec::new();
        for e in 0..sources[i].entry_count() {
            let name = sources[i].entry_name(e).to_string();
            if sources[i + 1..].iter().any(|later| later.contains(&name)) {
                warn.emit(&name, "overridden by a later source archive");
                outcome.skipped += 1;
            } else if dest.contains(&name) {
                // Checked here so the reservation below matches the number
                // of entries actually created.
                warn.emit(&name, "duplicate entry");
                outcome.skipped += 1;
            } else {
                keep.push(name);
            }
        }
        plan.push(keep);
    }

    // Let a relocating-table destination shift once instead of per entry.
    let total: usize = plan.iter().map(Vec::len).sum();
    dest.pre_reserve(total)?;
    tracing::debug!(sources = sources.len(), entries = total, "converting archives");

    for (src, names) in sources.iter_mut().zip(&plan) {
        for name in names {
            if copy_entry(src, dest, name)? {
                outcome.copied += 1;
            } else {
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}
