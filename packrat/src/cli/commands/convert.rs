//! CLI command for merging archives into one output

use std::path::{Path, PathBuf};

use crate::ops::convert_packs;
use crate::pack::{create_pack, open_pack};

use super::stderr_warnings;

pub fn execute(sources: &[PathBuf], output: &Path) -> anyhow::Result<()> {
    let warn = stderr_warnings();

    let mut open_sources = Vec::with_capacity(sources.len());
    for path in sources {
        open_sources.push(open_pack(path, false, warn.clone())?);
    }
    let mut dest = create_pack(output, warn.clone())?;

    let outcome = convert_packs(&mut open_sources, &mut dest, &warn)?;

    dest.close()?;
    for src in open_sources {
        src.close()?;
    }

    println!(
        "{}: {} entries written, {} skipped",
        output.display(),
        outcome.copied,
        outcome.skipped
    );
    Ok(())
}
