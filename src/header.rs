//! Header records and the DatHeader parsing rules shared by the text
//! and binary backends.

use std::path::Path;

use serde::Serialize;

use crate::error::{CelError, Result};

/// Grid dimensions of an array design. Fixed by the first file of a
/// batch; every other file must match it exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChipGeometry {
    pub cols: i32,
    pub rows: i32,
}

impl ChipGeometry {
    pub fn new(cols: i32, rows: i32) -> Self {
        ChipGeometry { cols, rows }
    }

    /// Total number of cells on the chip.
    pub fn cells(&self) -> usize {
        (self.cols as usize) * (self.rows as usize)
    }
}

impl std::fmt::Display for ChipGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Everything the `[CEL]`/`[HEADER]` sections (or their binary/generic
/// equivalents) record about a scan.
///
/// All strings are owned; grid corners are `(x, y)` in pixel
/// coordinates of the source DAT image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailedHeader {
    /// Chip/CDF name, the `.1sq`-suffixed DatHeader token with the
    /// suffix removed.
    pub cdf_name: String,
    pub cols: i32,
    pub rows: i32,
    pub grid_corner_ul: (i32, i32),
    pub grid_corner_ur: (i32, i32),
    pub grid_corner_lr: (i32, i32),
    pub grid_corner_ll: (i32, i32),
    /// The raw DatHeader line, `DatHeader=` prefix removed.
    pub dat_header: String,
    pub algorithm: String,
    pub algorithm_parameters: String,
    /// Scan date, recorded only by the generic container format.
    pub scan_date: Option<String>,
}

impl DetailedHeader {
    pub fn geometry(&self) -> ChipGeometry {
        ChipGeometry::new(self.cols, self.rows)
    }
}

/// Find the chip name in DatHeader text: the single whitespace token
/// ending in `.1sq`, suffix stripped. The token must be strictly longer
/// than the suffix.
pub(crate) fn cdf_name_from_dat_header(text: &str) -> Option<String> {
    text.split_whitespace()
        .find_map(|token| token.strip_suffix(".1sq"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Parse a `GridCornerXX=x y` line into its coordinate pair. Both `=`
/// and whitespace delimit, so `GridCornerUL=123 456` tokenizes as
/// `[GridCornerUL, 123, 456]`.
pub(crate) fn parse_grid_corner(path: &Path, line: &str) -> Result<(i32, i32)> {
    let mut tokens = line.split(['=', ' ', '\t']).filter(|t| !t.is_empty());
    let _key = tokens.next();
    let x = parse_i32(path, "grid corner x", tokens.next().unwrap_or(""))?;
    let y = parse_i32(path, "grid corner y", tokens.next().unwrap_or(""))?;
    Ok((x, y))
}

pub(crate) fn parse_i32(path: &Path, what: &str, token: &str) -> Result<i32> {
    let token = token.trim();
    token
        .parse::<i32>()
        .map_err(|_| CelError::parse(path, what, token))
}

pub(crate) fn parse_f64(path: &Path, what: &str, token: &str) -> Result<f64> {
    let token = token.trim();
    token
        .parse::<f64>()
        .map_err(|_| CelError::parse(path, what, token))
}

/// Check a candidate header against the batch reference: exact geometry
/// match, then a case-insensitive *prefix* match of the chip name over
/// the reference name's length.
pub(crate) fn check_reference(
    path: &Path,
    cdf_name: &str,
    geometry: ChipGeometry,
    ref_name: &str,
    ref_geometry: ChipGeometry,
) -> Result<()> {
    if geometry != ref_geometry {
        return Err(CelError::DimensionMismatch {
            path: path.to_path_buf(),
            expected: ref_geometry.to_string(),
            actual: geometry.to_string(),
        });
    }
    let matches = cdf_name.len() >= ref_name.len()
        && cdf_name.as_bytes()[..ref_name.len()].eq_ignore_ascii_case(ref_name.as_bytes());
    if !matches {
        return Err(CelError::ChipTypeMismatch {
            path: path.to_path_buf(),
            expected: ref_name.to_string(),
            actual: cdf_name.to_string(),
        });
    }
    Ok(())
}
