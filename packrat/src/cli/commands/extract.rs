//! CLI command for extracting archives into per-archive subfolders

use std::path::{Path, PathBuf};

use crate::ops::extract_pack;

use super::stderr_warnings;

pub fn execute(archives: &[PathBuf], destination: &Path) -> anyhow::Result<()> {
    let warn = stderr_warnings();

    for path in archives {
        let written = extract_pack(path, destination, &warn)?;
        println!("{}: {written} entries extracted", path.display());
    }
    Ok(())
}
