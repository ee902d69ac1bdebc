//! CLI command for listing archive contents

use std::path::{Path, PathBuf};

use crate::ops::list_entries;
use crate::pack::open_pack;

use super::stderr_warnings;

/// Format byte size for human-readable output
fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1}M", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1}K", bytes as f64 / 1024.0)
    } else {
        format!("{bytes}")
    }
}

pub fn execute(
    archives: &[PathBuf],
    filter: Option<&str>,
    long: bool,
    count: bool,
) -> anyhow::Result<()> {
    let multiple = archives.len() > 1;
    for (i, path) in archives.iter().enumerate() {
        if multiple {
            if i > 0 {
                println!();
            }
            println!("{}:", path.display());
        }
        list_one(path, filter, long, count)?;
    }
    Ok(())
}

fn list_one(path: &Path, filter: Option<&str>, long: bool, count: bool) -> anyhow::Result<()> {
    let pack = open_pack(path, false, stderr_warnings())?;
    let entries = list_entries(&pack, filter);

    if count {
        println!("{}", entries.len());
    } else if long {
        let mut total = 0u64;
        for entry in &entries {
            let when = entry
                .mtime
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
            println!("{:>10}  {:>19}  {}", format_size(entry.len), when, entry.name);
            total += entry.len;
        }
        println!();
        println!("{} entries, {} total", entries.len(), format_size(total));
    } else {
        for entry in &entries {
            println!("{}", entry.name);
        }
    }

    pack.close()?;
    Ok(())
}
