use anyhow::{Context, Result};
use std::path::PathBuf;

use celio::batch::check_batch;

/// Validate a set of CEL files against the first file's header
pub fn run(files: Vec<PathBuf>) -> Result<()> {
    let (geometry, cdf_name) = check_batch(&files).context("Batch check failed")?;
    println!(
        "OK: {} file(s) match chip type {} ({})",
        files.len(),
        cdf_name,
        geometry
    );
    Ok(())
}
