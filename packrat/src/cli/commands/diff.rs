//! CLI command for comparing two archives

use std::path::Path;

use crate::ops::diff_packs;
use crate::pack::open_pack;

use super::stderr_warnings;

/// Compare two archives. Returns true when differences were found.
pub fn execute(first: &Path, second: &Path, format: &str, quiet: bool) -> anyhow::Result<bool> {
    let warn = stderr_warnings();

    let mut a = open_pack(first, false, warn.clone())?;
    let mut b = open_pack(second, false, warn)?;

    let report = diff_packs(&mut a, &mut b)?;

    a.close()?;
    b.close()?;

    if format == "json" {
        let output = serde_json::json!({
            "first": first.display().to_string(),
            "second": second.display().to_string(),
            "identical": report.is_empty(),
            "changes": report.changes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if report.is_empty() {
        if !quiet {
            println!("Archives are identical");
        }
    } else {
        for change in &report.changes {
            println!("{change}");
        }
        if !quiet {
            println!();
            println!("{}", report.summary());
        }
    }

    Ok(!report.is_empty())
}
