//! Binary (v4) CEL decoding.
//!
//! Fixed little-endian layout: a header with magic 64 and version 4,
//! three length-prefixed text blobs, scalar counts, then `cols * rows`
//! cell records of `(f32 mean, f32 stddev, i16 npixels)` followed by
//! the mask and outlier coordinate blocks. Endianness is normalized in
//! the `byteorder` read calls, never at call sites.
//!
//! Unlike the text scanner, a short cell record here is always fatal:
//! the header declares exactly how many records must follow.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{CelError, Result};
use crate::header::{cdf_name_from_dat_header, parse_grid_corner, DetailedHeader};
use crate::values::{cell_index, mark_cells, CoordList, ProbeValues, ValueKind, MASKED, MISSING};

pub(crate) const BINARY_MAGIC: i32 = 64;
pub(crate) const BINARY_VERSION: i32 = 4;

/// Bytes per cell record: two f32 and one i16.
const CELL_RECORD_SIZE: i64 = 10;
/// Bytes per mask/outlier record: two i16.
const COORD_RECORD_SIZE: i64 = 4;

/// The fixed-layout header at the front of a binary CEL file.
#[derive(Debug, Clone)]
pub(crate) struct BinaryHeader {
    pub cols: i32,
    pub rows: i32,
    pub n_cells: i32,
    /// Free-text header blob; parsed with the text tokenizer for the
    /// grid corners, DatHeader and chip name.
    pub header: String,
    pub algorithm: String,
    pub parameters: String,
    #[allow(dead_code)]
    pub cell_margin: i32,
    pub n_outliers: u32,
    pub n_masks: u32,
    #[allow(dead_code)]
    pub n_subgrids: i32,
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| CelError::open(path, e))?;
    Ok(BufReader::new(file))
}

fn truncated<'a>(path: &'a Path, looking_for: &str) -> impl FnOnce(std::io::Error) -> CelError + 'a {
    let looking_for = looking_for.to_string();
    move |_| CelError::truncated(path, looking_for)
}

fn read_blob<R: Read>(reader: &mut R, path: &Path, what: &str) -> Result<String> {
    let len = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(path, what))?;
    if len < 0 {
        return Err(CelError::corrupt(path, format!("negative {what} length")));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes).map_err(truncated(path, what))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode the fixed-layout header, leaving the reader positioned at the
/// first cell record.
pub(crate) fn read_binary_header<R: Read>(reader: &mut R, path: &Path) -> Result<BinaryHeader> {
    let magic = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(path, "magic number"))?;
    if magic != BINARY_MAGIC {
        return Err(CelError::NotACelFile {
            path: path.to_path_buf(),
        });
    }
    let version = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(path, "version number"))?;
    if version != BINARY_VERSION {
        return Err(CelError::corrupt(
            path,
            format!("binary CEL version {version}, only version {BINARY_VERSION} is supported"),
        ));
    }

    let cols = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(path, "Cols"))?;
    let rows = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(path, "Rows"))?;
    let n_cells = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(path, "cell count"))?;
    if n_cells != cols.wrapping_mul(rows) {
        return Err(CelError::DimensionMismatch {
            path: path.to_path_buf(),
            expected: format!("{cols}x{rows} ({} cells)", (cols as i64) * (rows as i64)),
            actual: format!("{n_cells} cells"),
        });
    }

    let header = read_blob(reader, path, "header text")?;
    let algorithm = read_blob(reader, path, "algorithm name")?;
    let parameters = read_blob(reader, path, "algorithm parameters")?;

    let cell_margin = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(path, "cell margin"))?;
    let n_outliers = reader
        .read_u32::<LittleEndian>()
        .map_err(truncated(path, "outlier count"))?;
    let n_masks = reader
        .read_u32::<LittleEndian>()
        .map_err(truncated(path, "mask count"))?;
    let n_subgrids = reader
        .read_i32::<LittleEndian>()
        .map_err(truncated(path, "subgrid count"))?;

    Ok(BinaryHeader {
        cols,
        rows,
        n_cells,
        header,
        algorithm,
        parameters,
        cell_margin,
        n_outliers,
        n_masks,
        n_subgrids,
    })
}

/// Build a [`DetailedHeader`] from the header blob. The blob is itself
/// a text block carrying `GridCornerXX=` and `DatHeader=` lines, parsed
/// with the same rules as the text format.
pub(crate) fn read_header_from<R: Read>(reader: &mut R, path: &Path) -> Result<DetailedHeader> {
    let binary = read_binary_header(reader, path)?;

    let mut header = DetailedHeader {
        cols: binary.cols,
        rows: binary.rows,
        algorithm: binary.algorithm.clone(),
        algorithm_parameters: binary.parameters.trim_end().to_string(),
        ..DetailedHeader::default()
    };

    for line in binary.header.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with("GridCornerUL") {
            header.grid_corner_ul = parse_grid_corner(path, line)?;
        } else if line.starts_with("GridCornerUR") {
            header.grid_corner_ur = parse_grid_corner(path, line)?;
        } else if line.starts_with("GridCornerLR") {
            header.grid_corner_lr = parse_grid_corner(path, line)?;
        } else if line.starts_with("GridCornerLL") {
            header.grid_corner_ll = parse_grid_corner(path, line)?;
        } else if let Some(rest) = line.strip_prefix("DatHeader=") {
            header.dat_header = rest.to_string();
        }
    }

    header.cdf_name = cdf_name_from_dat_header(&binary.header)
        .ok_or_else(|| CelError::missing(path, "DatHeader chip name (.1sq token)"))?;
    Ok(header)
}

pub(crate) fn read_header(path: &Path) -> Result<DetailedHeader> {
    read_header_from(&mut open(path)?, path)
}

/// Geometry and chip name only, for the batch consistency check.
pub(crate) fn read_check_info(path: &Path) -> Result<(i32, i32, String)> {
    let binary = read_binary_header(&mut open(path)?, path)?;
    let cdf_name = cdf_name_from_dat_header(&binary.header)
        .ok_or_else(|| CelError::missing(path, "DatHeader chip name (.1sq token)"))?;
    Ok((binary.cols, binary.rows, cdf_name))
}

/// Decode one value per cell record, in row-major chip order.
pub(crate) fn read_values_from<R: Read>(
    reader: &mut R,
    path: &Path,
    kind: ValueKind,
) -> Result<ProbeValues> {
    let header = read_binary_header(reader, path)?;
    let cells = header.n_cells as usize;
    let mut data = vec![0.0; cells];

    for y in 0..header.rows {
        for x in 0..header.cols {
            let cell = (y * header.cols + x) as usize;
            let record = read_cell_record(reader).map_err(|_| CelError::CorruptBinaryRecord {
                path: path.to_path_buf(),
                cell,
            })?;
            let value = match kind {
                ValueKind::Intensity => record.0 as f64,
                ValueKind::StdDev => record.1 as f64,
                ValueKind::NPixels => record.2 as f64,
            };
            let index = cell_index(x, y, header.rows);
            let slot = data.get_mut(index).ok_or_else(|| {
                CelError::corrupt(path, format!("cell ({x}, {y}) outside the grid"))
            })?;
            *slot = value;
        }
    }
    Ok(ProbeValues {
        data,
        cells_read: cells,
    })
}

pub(crate) fn read_values(path: &Path, kind: ValueKind) -> Result<ProbeValues> {
    read_values_from(&mut open(path)?, path, kind)
}

fn read_cell_record<R: Read>(reader: &mut R) -> std::io::Result<(f32, f32, i16)> {
    let intensity = reader.read_f32::<LittleEndian>()?;
    let stddev = reader.read_f32::<LittleEndian>()?;
    let npixels = reader.read_i16::<LittleEndian>()?;
    Ok((intensity, stddev, npixels))
}

fn read_coords<R: Read>(reader: &mut R, path: &Path, count: u32, what: &str) -> Result<CoordList> {
    let mut coords = CoordList::with_capacity(count as usize);
    for _ in 0..count {
        let x = reader
            .read_i16::<LittleEndian>()
            .map_err(truncated(path, what))?;
        let y = reader
            .read_i16::<LittleEndian>()
            .map_err(truncated(path, what))?;
        coords.push(x, y);
    }
    Ok(coords)
}

/// Read the mask and outlier coordinate blocks, seeking straight past
/// the cell records.
pub(crate) fn mask_outliers_from<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
) -> Result<(CoordList, CoordList)> {
    let header = read_binary_header(reader, path)?;
    reader
        .seek(SeekFrom::Current(header.n_cells as i64 * CELL_RECORD_SIZE))
        .map_err(truncated(path, "mask records"))?;
    let masks = read_coords(reader, path, header.n_masks, "mask records")?;
    let outliers = read_coords(reader, path, header.n_outliers, "outlier records")?;
    Ok((masks, outliers))
}

pub(crate) fn mask_outliers(path: &Path) -> Result<(CoordList, CoordList)> {
    mask_outliers_from(&mut open(path)?, path)
}

/// Mark masked/outlier cells in `values` with the shared sentinels.
/// A skipped block is seeked over, not parsed.
pub(crate) fn apply_masks_from<R: Read + Seek>(
    reader: &mut R,
    path: &Path,
    values: &mut [f64],
    apply_mask: bool,
    apply_outlier: bool,
) -> Result<()> {
    if !apply_mask && !apply_outlier {
        return Ok(());
    }
    let header = read_binary_header(reader, path)?;
    reader
        .seek(SeekFrom::Current(header.n_cells as i64 * CELL_RECORD_SIZE))
        .map_err(truncated(path, "mask records"))?;

    if apply_mask {
        let masks = read_coords(reader, path, header.n_masks, "mask records")?;
        mark_cells(path, values, &masks, header.rows, MASKED)?;
    } else if header.n_masks > 0 {
        reader
            .seek(SeekFrom::Current(header.n_masks as i64 * COORD_RECORD_SIZE))
            .map_err(truncated(path, "outlier records"))?;
    }
    if apply_outlier {
        let outliers = read_coords(reader, path, header.n_outliers, "outlier records")?;
        mark_cells(path, values, &outliers, header.rows, MISSING)?;
    }
    Ok(())
}

pub(crate) fn apply_masks(
    path: &Path,
    values: &mut [f64],
    apply_mask: bool,
    apply_outlier: bool,
) -> Result<()> {
    apply_masks_from(&mut open(path)?, path, values, apply_mask, apply_outlier)
}
