use anyhow::{Context, Result};
use std::path::PathBuf;

use celio::{CelReader, ValueKind};

/// Display a CEL file's format and header information
pub fn run(file: PathBuf, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let reader = CelReader::open(&file).context("Failed to classify file")?;
    let header = reader.read_header().context("Failed to read header")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&header)?);
        return Ok(());
    }

    println!("CEL File Information");
    println!("====================");
    println!("File: {}", file.display());
    println!("Format: {}", reader.kind());
    println!();

    println!("Header:");
    println!("  Chip type: {}", header.cdf_name);
    println!("  Dimensions: {} cols x {} rows", header.cols, header.rows);
    println!(
        "  Grid corners: UL{:?} UR{:?} LR{:?} LL{:?}",
        header.grid_corner_ul, header.grid_corner_ur, header.grid_corner_lr, header.grid_corner_ll
    );
    println!("  Algorithm: {}", header.algorithm);
    println!("  Parameters: {}", header.algorithm_parameters);
    if let Some(date) = &header.scan_date {
        println!("  Scan date: {}", date);
    }
    println!();

    let values = reader
        .read_values(ValueKind::Intensity, header.rows)
        .context("Failed to read intensities")?;
    let (masks, outliers) = reader
        .mask_outliers()
        .context("Failed to read mask/outlier lists")?;

    println!("Body:");
    println!(
        "  Cells: {} of {} read{}",
        values.cells_read,
        values.data.len(),
        if values.is_complete() {
            ""
        } else {
            " (short read - file may be truncated)"
        }
    );
    println!("  Masked cells: {}", masks.len());
    println!("  Outlier cells: {}", outliers.len());

    Ok(())
}
