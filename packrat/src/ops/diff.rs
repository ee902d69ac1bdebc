//! Differencing engine.
//!
//! Compares two archives by content: every entry is reduced to a streaming
//! CRC-64 of its decompressed bytes, and differences are classified by
//! matching checksums before names. This catches renames that a
//! name-keyed comparison would report as an add/remove pair.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::pack::Pack;

const CHUNK: usize = 64 * 1024;

/// One classified difference between the two archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffChange {
    /// Same bytes exist in the second archive under different names.
    Renamed {
        /// Name in the first archive.
        name: String,
        /// Matching names in the second archive (several on a multi-rename).
        renamed_to: Vec<String>,
    },
    /// Both archives have the entry, with different bytes.
    ContentChanged {
        /// The shared entry name.
        name: String,
    },
    /// The entry exists only in the first archive.
    OnlyInFirst {
        /// The entry name.
        name: String,
    },
    /// The entry exists only in the second archive.
    OnlyInSecond {
        /// The entry name.
        name: String,
    },
}

impl DiffChange {
    /// The name the report is sorted by.
    pub fn name(&self) -> &str {
        match self {
            Self::Renamed { name, .. }
            | Self::ContentChanged { name }
            | Self::OnlyInFirst { name }
            | Self::OnlyInSecond { name } => name,
        }
    }
}

impl fmt::Display for DiffChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renamed { name, renamed_to } => {
                write!(f, "renamed: {name} -> {}", renamed_to.join(", "))
            }
            Self::ContentChanged { name } => write!(f, "content differs: {name}"),
            Self::OnlyInFirst { name } => write!(f, "only in first: {name}"),
            Self::OnlyInSecond { name } => write!(f, "only in second: {name}"),
        }
    }
}

/// The full comparison result, sorted by entry name.
#[derive(Debug, Default, Serialize)]
pub struct DiffReport {
    /// All classified differences.
    pub changes: Vec<DiffChange>,
}

impl DiffReport {
    /// True when the archives have identical content.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Short human-readable tally.
    pub fn summary(&self) -> String {
        let mut renamed = 0;
        let mut changed = 0;
        let mut only_first = 0;
        let mut only_second = 0;
        for c in &self.changes {
            match c {
                DiffChange::Renamed { .. } => renamed += 1,
                DiffChange::ContentChanged { .. } => changed += 1,
                DiffChange::OnlyInFirst { .. } => only_first += 1,
                DiffChange::OnlyInSecond { .. } => only_second += 1,
            }
        }
        format!(
            "{renamed} renamed, {changed} changed, {only_first} only in first, {only_second} only in second"
        )
    }
}

/// A computed `(name, checksum)` pair.
struct EntrySum {
    name: String,
    sum: u64,
}

/// Checksum every entry of the archive with a streaming CRC-64.
fn checksum_table(pack: &mut Pack) -> Result<Vec<EntrySum>> {
    let names: Vec<String> = (0..pack.entry_count())
        .map(|i| pack.entry_name(i).to_string())
        .collect();

    let mut sums = Vec::with_capacity(names.len());
    let mut buf = vec![0u8; CHUNK];
    for name in names {
        if !pack.open_entry(&name)? {
            continue;
        }
        let mut digest = crc64fast::Digest::new();
        loop {
            let n = pack.read(&mut buf)?;
            if n == 0 {
                break;
            }
            digest.write(&buf[..n]);
        }
        pack.close_read_entry()?;
        sums.push(EntrySum {
            name,
            sum: digest.sum64(),
        });
    }
    Ok(sums)
}

/// Compare two archives and classify every difference.
///
/// The two checksum scans are independent read-only passes and run
/// concurrently.
pub fn diff_packs(first: &mut Pack, second: &mut Pack) -> Result<DiffReport> {
    let (sums_a, sums_b) = rayon::join(|| checksum_table(first), || checksum_table(second));
    let sums_a = sums_a?;
    let mut sums_b = sums_b?;

    let names_a: HashSet<String> = sums_a.iter().map(|e| e.name.to_lowercase()).collect();
    let names_b: HashSet<String> = sums_b.iter().map(|e| e.name.to_lowercase()).collect();
    let checksums_a: HashSet<u64> = sums_a.iter().map(|e| e.sum).collect();

    // Range lookups over B go by checksum, not by name.
    sums_b.sort_by(|x, y| x.sum.cmp(&y.sum).then_with(|| x.name.cmp(&y.name)));

    let mut changes = Vec::new();

    for entry in &sums_a {
        let start = sums_b.partition_point(|e| e.sum < entry.sum);
        let end = sums_b.partition_point(|e| e.sum <= entry.sum);
        let matches = &sums_b[start..end];

        if matches.is_empty() {
            if names_b.contains(&entry.name.to_lowercase()) {
                changes.push(DiffChange::ContentChanged {
                    name: entry.name.clone(),
                });
            } else {
                changes.push(DiffChange::OnlyInFirst {
                    name: entry.name.clone(),
                });
            }
        } else if !matches
            .iter()
            .any(|m| m.name.to_lowercase() == entry.name.to_lowercase())
        {
            changes.push(DiffChange::Renamed {
                name: entry.name.clone(),
                renamed_to: matches.iter().map(|m| m.name.clone()).collect(),
            });
        }
        // A checksum match under the same name is an identical entry.
    }

    // Symmetric pass: anything in B not already explained above.
    for entry in &sums_b {
        if !checksums_a.contains(&entry.sum) && !names_a.contains(&entry.name.to_lowercase()) {
            changes.push(DiffChange::OnlyInSecond {
                name: entry.name.clone(),
            });
        }
    }

    changes.sort_by(|x, y| x.name().to_lowercase().cmp(&y.name().to_lowercase()));
    Ok(DiffReport { changes })
}
