//! Text and gzipped-text CEL parsing.
//!
//! Both encodings share one line-oriented [`SectionScanner`]; the gzip
//! variant is the same state machine over a decompressing reader. The
//! scanner only ever moves forward, which matches the section order the
//! format guarantees: `[CEL]`, `[HEADER]`, `[INTENSITY]`, `[MASKS]`,
//! `[OUTLIERS]`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::warn;

use crate::error::{CelError, Result};
use crate::header::{
    cdf_name_from_dat_header, parse_f64, parse_grid_corner, parse_i32, DetailedHeader,
};
use crate::values::{cell_index, mark_cells, CoordList, ProbeValues, ValueKind, MASKED, MISSING};

/// Marker the first line of a text CEL file must start with.
pub(crate) const CEL_MARKER: &str = "[CEL]";

/// Line-oriented scanner over a readable source.
///
/// Section search and key lookup are fatal on end-of-input (the file is
/// structurally truncated); only the `[INTENSITY]` body loop treats
/// end-of-input as a recoverable short read.
pub(crate) struct SectionScanner<R: BufRead> {
    reader: R,
    path: PathBuf,
    line: String,
}

impl<R: BufRead> SectionScanner<R> {
    pub(crate) fn new(reader: R, path: &Path) -> Self {
        SectionScanner {
            reader,
            path: path.to_path_buf(),
            line: String::new(),
        }
    }

    /// Read the next line into the internal buffer. `Ok(false)` at end
    /// of input; decompression errors are promoted to `TruncatedFile`.
    fn next_line(&mut self, looking_for: &str) -> Result<bool> {
        self.line.clear();
        match self.reader.read_line(&mut self.line) {
            Ok(0) => Ok(false),
            Ok(_) => Ok(true),
            Err(_) => Err(CelError::truncated(&self.path, looking_for)),
        }
    }

    /// Read lines until one starts with `prefix`, returning that line
    /// with the trailing line terminator removed. Reaching end of input
    /// first is a fatal truncation.
    pub(crate) fn find_line_starting_with(&mut self, prefix: &str) -> Result<String> {
        loop {
            if !self.next_line(prefix)? {
                return Err(CelError::truncated(&self.path, prefix));
            }
            if self.line.starts_with(prefix) {
                return Ok(self.line.trim_end_matches(['\r', '\n']).to_string());
            }
        }
    }

    /// Same as [`Self::find_line_starting_with`], named for section
    /// markers.
    pub(crate) fn advance_to_section(&mut self, marker: &str) -> Result<()> {
        self.find_line_starting_with(marker).map(|_| ())
    }

    /// The value part of a `Key=value` line, line terminator stripped.
    fn key_value(&mut self, key: &str) -> Result<String> {
        let line = self.find_line_starting_with(key)?;
        match line.split_once('=') {
            Some((_, value)) => Ok(value.to_string()),
            None => Err(CelError::parse(&self.path, key, line)),
        }
    }
}

/// Open a plain text CEL file, verifying the `[CEL]` marker on the
/// first line. The scanner is left positioned after that line.
pub(crate) fn open(path: &Path) -> Result<SectionScanner<BufReader<File>>> {
    let file = File::open(path).map_err(|e| CelError::open(path, e))?;
    let mut scanner = SectionScanner::new(BufReader::new(file), path);
    check_marker(&mut scanner)?;
    Ok(scanner)
}

/// Open a gzipped text CEL file. Same contract as [`open`].
pub(crate) fn open_gz(path: &Path) -> Result<SectionScanner<BufReader<GzDecoder<File>>>> {
    let file = File::open(path).map_err(|e| CelError::open(path, e))?;
    let mut scanner = SectionScanner::new(BufReader::new(GzDecoder::new(file)), path);
    check_marker(&mut scanner)?;
    Ok(scanner)
}

fn check_marker<R: BufRead>(scanner: &mut SectionScanner<R>) -> Result<()> {
    if !scanner.next_line(CEL_MARKER)? || !scanner.line.starts_with(CEL_MARKER) {
        return Err(CelError::NotACelFile {
            path: scanner.path.clone(),
        });
    }
    Ok(())
}

/// Read `Cols=`, `Rows=` (in that order) and the chip name from the
/// `[HEADER]` section. Used by the consistency check, which must not
/// touch the body.
pub(crate) fn read_check_info<R: BufRead>(
    scanner: &mut SectionScanner<R>,
) -> Result<(i32, i32, String)> {
    scanner.advance_to_section("[HEADER]")?;
    let cols_val = scanner.key_value("Cols")?;
    let cols = parse_i32(&scanner.path, "Cols", &cols_val)?;
    let rows_val = scanner.key_value("Rows")?;
    let rows = parse_i32(&scanner.path, "Rows", &rows_val)?;
    let dat_header = scanner.find_line_starting_with("DatHeader")?;
    let cdf_name = cdf_name_from_dat_header(&dat_header)
        .ok_or_else(|| CelError::missing(&scanner.path, "DatHeader chip name (.1sq token)"))?;
    Ok((cols, rows, cdf_name))
}

/// Read the full `[HEADER]` section into a [`DetailedHeader`].
pub(crate) fn read_header<R: BufRead>(scanner: &mut SectionScanner<R>) -> Result<DetailedHeader> {
    scanner.advance_to_section("[HEADER]")?;
    let cols_val = scanner.key_value("Cols")?;
    let cols = parse_i32(&scanner.path, "Cols", &cols_val)?;
    let rows_val = scanner.key_value("Rows")?;
    let rows = parse_i32(&scanner.path, "Rows", &rows_val)?;

    let ul_line = scanner.find_line_starting_with("GridCornerUL")?;
    let grid_corner_ul = parse_grid_corner(&scanner.path, &ul_line)?;
    let ur_line = scanner.find_line_starting_with("GridCornerUR")?;
    let grid_corner_ur = parse_grid_corner(&scanner.path, &ur_line)?;
    let lr_line = scanner.find_line_starting_with("GridCornerLR")?;
    let grid_corner_lr = parse_grid_corner(&scanner.path, &lr_line)?;
    let ll_line = scanner.find_line_starting_with("GridCornerLL")?;
    let grid_corner_ll = parse_grid_corner(&scanner.path, &ll_line)?;

    let dat_line = scanner.find_line_starting_with("DatHeader")?;
    let dat_header = dat_line
        .strip_prefix("DatHeader=")
        .unwrap_or(&dat_line)
        .to_string();
    let cdf_name = cdf_name_from_dat_header(&dat_line)
        .ok_or_else(|| CelError::missing(&scanner.path, "DatHeader chip name (.1sq token)"))?;

    let algorithm = scanner.key_value("Algorithm")?;
    let algorithm_parameters = scanner.key_value("AlgorithmParameters")?;

    Ok(DetailedHeader {
        cdf_name,
        cols,
        rows,
        grid_corner_ul,
        grid_corner_ur,
        grid_corner_lr,
        grid_corner_ll,
        dat_header,
        algorithm,
        algorithm_parameters,
        scan_date: None,
    })
}

/// Read one value per cell from the `[INTENSITY]` body.
///
/// The body has no declared length of its own, so a premature end of
/// input, an empty line, or a line with fewer tokens than `kind`
/// requires all stop the read early: the array is returned partially
/// filled with `cells_read` telling the caller how far we got. That is
/// the one recoverable failure mode in the crate.
pub(crate) fn read_values<R: BufRead>(
    scanner: &mut SectionScanner<R>,
    kind: ValueKind,
    chip_rows: i32,
) -> Result<ProbeValues> {
    scanner.advance_to_section("[HEADER]")?;
    let cols_val = scanner.key_value("Cols")?;
    let cols = parse_i32(&scanner.path, "Cols", &cols_val)?;
    let rows_val = scanner.key_value("Rows")?;
    let rows = parse_i32(&scanner.path, "Rows", &rows_val)?;
    let cells = (cols as usize) * (rows as usize);

    scanner.advance_to_section("[INTENSITY]")?;
    scanner.find_line_starting_with("CellHeader=")?;

    let mut data = vec![0.0; cells];
    let mut cells_read = 0;
    for _ in 0..cells {
        if !scanner.next_line("cell intensity line")? {
            break;
        }
        let line = scanner.line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < kind.min_tokens() {
            break;
        }
        let x = parse_i32(&scanner.path, "cell x", tokens[0])?;
        let y = parse_i32(&scanner.path, "cell y", tokens[1])?;
        let value = parse_f64(&scanner.path, "cell value", tokens[kind.token_index()])?;
        let index = cell_index(x, y, chip_rows);
        let slot = data.get_mut(index).ok_or_else(|| {
            CelError::corrupt(&scanner.path, format!("cell ({x}, {y}) outside the grid"))
        })?;
        *slot = value;
        cells_read += 1;
    }

    if cells_read < cells {
        warn!(
            "{}: read {} of {} expected cell records; the file may be truncated",
            scanner.path.display(),
            cells_read,
            cells
        );
    }
    Ok(ProbeValues { data, cells_read })
}

/// Read the coordinate pairs of a `[MASKS]` or `[OUTLIERS]` section.
/// Unlike the intensity body these sections declare their length, so a
/// missing record here is fatal truncation.
fn read_coord_section<R: BufRead>(
    scanner: &mut SectionScanner<R>,
    marker: &str,
) -> Result<CoordList> {
    scanner.advance_to_section(marker)?;
    let number_cells_val = scanner.key_value("NumberCells")?;
    let count = parse_i32(&scanner.path, "NumberCells", &number_cells_val)?;
    scanner.find_line_starting_with("CellHeader=")?;

    let mut coords = CoordList::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        if !scanner.next_line(marker)? {
            return Err(CelError::truncated(
                &scanner.path,
                format!("{count} coordinate records in {marker}"),
            ));
        }
        let mut tokens = scanner.line.split_whitespace();
        let x = parse_i32(&scanner.path, "mask x", tokens.next().unwrap_or(""))?;
        let y = parse_i32(&scanner.path, "mask y", tokens.next().unwrap_or(""))?;
        coords.push(x as i16, y as i16);
    }
    Ok(coords)
}

/// Extract both coordinate lists. `[MASKS]` precedes `[OUTLIERS]`.
pub(crate) fn mask_outliers<R: BufRead>(
    scanner: &mut SectionScanner<R>,
) -> Result<(CoordList, CoordList)> {
    let masks = read_coord_section(scanner, "[MASKS]")?;
    let outliers = read_coord_section(scanner, "[OUTLIERS]")?;
    Ok((masks, outliers))
}

/// Overwrite flagged cells in `values`: masked cells become [`MASKED`],
/// outlier cells become [`MISSING`].
pub(crate) fn apply_masks<R: BufRead>(
    scanner: &mut SectionScanner<R>,
    values: &mut [f64],
    chip_rows: i32,
    apply_mask: bool,
    apply_outlier: bool,
) -> Result<()> {
    if !apply_mask && !apply_outlier {
        return Ok(());
    }
    if apply_mask {
        let masks = read_coord_section(scanner, "[MASKS]")?;
        mark_cells(&scanner.path, values, &masks, chip_rows, MASKED)?;
    }
    if apply_outlier {
        let outliers = read_coord_section(scanner, "[OUTLIERS]")?;
        mark_cells(&scanner.path, values, &outliers, chip_rows, MISSING)?;
    }
    Ok(())
}
