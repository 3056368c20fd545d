//! Batch reading: many CEL files into one matrix.
//!
//! The reference geometry and chip type come from the first file.
//! Every file is validated against them *before* any body is read, so
//! a mismatch anywhere aborts the batch without wasted decoding work.
//! Each file then fills its own column of a column-major value matrix;
//! attaching file names as column labels stays with the caller.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::{CelError, Result};
use crate::header::ChipGeometry;
use crate::reader::CelReader;
use crate::values::ValueKind;

/// What to extract and whether to blank flagged cells.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub kind: ValueKind,
    /// Overwrite `[MASKS]` cells with [`crate::MASKED`].
    pub remove_masks: bool,
    /// Overwrite `[OUTLIERS]` cells with [`crate::MISSING`].
    pub remove_outliers: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            kind: ValueKind::Intensity,
            remove_masks: false,
            remove_outliers: false,
        }
    }
}

/// The assembled matrix and the per-file read outcomes.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Geometry of the reference (first) file.
    pub geometry: ChipGeometry,
    /// Chip name of the reference file.
    pub cdf_name: String,
    /// Column-major values: `geometry.cells()` rows by one column per
    /// input file, file `i`'s column at `i * cells .. (i + 1) * cells`.
    pub data: Vec<f64>,
    /// Cell records decoded per file; less than `geometry.cells()`
    /// marks a short (truncated text) read.
    pub cells_read: Vec<usize>,
}

impl BatchResult {
    /// Borrow file `index`'s column.
    pub fn column(&self, index: usize) -> &[f64] {
        let cells = self.geometry.cells();
        &self.data[index * cells..(index + 1) * cells]
    }
}

/// Read a batch of CEL files into one matrix.
///
/// Fatal errors (unrecognized files, dimension or chip-type mismatches,
/// corruption) abort the whole batch; a short text body read is
/// reported through [`BatchResult::cells_read`] instead.
pub fn read_batch(paths: &[PathBuf], options: BatchOptions) -> Result<BatchResult> {
    let first = paths.first().ok_or(CelError::EmptyBatch)?;

    let reference = CelReader::open(first)?.read_header()?;
    let geometry = reference.geometry();
    let cdf_name = reference.cdf_name;

    // Classify and validate every file up front; only then read bodies.
    let mut readers = Vec::with_capacity(paths.len());
    for path in paths {
        let reader = CelReader::open(path)?;
        reader.check_against(&cdf_name, geometry)?;
        readers.push(reader);
    }

    let cells = geometry.cells();
    let mut data = vec![0.0; cells * readers.len()];
    let mut cells_read = Vec::with_capacity(readers.len());
    for (i, reader) in readers.iter().enumerate() {
        info!("reading {}", reader.path().display());
        let values = reader.read_values(options.kind, geometry.rows)?;
        cells_read.push(values.cells_read);
        let column = &mut data[i * cells..(i + 1) * cells];
        column.copy_from_slice(&values.data);
        if options.remove_masks || options.remove_outliers {
            reader.apply_masks(
                column,
                geometry.rows,
                options.remove_masks,
                options.remove_outliers,
            )?;
        }
    }

    Ok(BatchResult {
        geometry,
        cdf_name,
        data,
        cells_read,
    })
}

/// Validate `paths` against the first file's geometry and chip type
/// without reading any body. Returns the reference geometry and name.
pub fn check_batch(paths: &[PathBuf]) -> Result<(ChipGeometry, String)> {
    let first = paths.first().ok_or(CelError::EmptyBatch)?;
    let reference = CelReader::open(first)?.read_header()?;
    let geometry = reference.geometry();
    let cdf_name = reference.cdf_name;
    for path in paths {
        CelReader::open(path)?.check_against(&cdf_name, geometry)?;
    }
    Ok((geometry, cdf_name))
}

/// Convenience wrapper for callers holding `&str`/`&Path` lists.
pub fn read_batch_from<P: AsRef<Path>>(paths: &[P], options: BatchOptions) -> Result<BatchResult> {
    let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    read_batch(&paths, options)
}
