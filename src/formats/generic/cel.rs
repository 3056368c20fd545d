//! CEL semantics on top of the generic container.
//!
//! An intensity CEL file is one data group whose data sets appear in
//! the fixed order Intensity, StdDev, Pixel, Outlier, Mask. The
//! multi-channel variant stores one such group per scan channel, linked
//! by the groups' next-group offsets.

use log::warn;

use crate::error::{CelError, Result};
use crate::header::{cdf_name_from_dat_header, DetailedHeader};
use crate::values::{mark_cells, CoordList, ProbeValues, ValueKind, MASKED, MISSING};

use super::container::{DataGroup, DataHeader, GenericReader};
use super::cursor::SkipRead;

/// Data-type identifier of a single-channel intensity file.
pub(crate) const DATA_TYPE_INTENSITY: &str = "affymetrix-calvin-intensity";
/// Data-type identifier of a multi-channel intensity file.
pub(crate) const DATA_TYPE_MULTI_INTENSITY: &str = "affymetrix-calvin-multi-intensity";

/// Name of the intensity data set; channel counting looks for it.
const INTENSITY_SET: &str = "Intensity";

const NVT_ROWS: &str = "affymetrix-cel-rows";
const NVT_COLS: &str = "affymetrix-cel-cols";
const NVT_DAT_HEADER: &str = "affymetrix-dat-header";
const NVT_PARTIAL_DAT_HEADER: &str = "affymetrix-partial-dat-header";
const NVT_ARRAY_TYPE: &str = "affymetrix-array-type";
const NVT_ALGORITHM: &str = "affymetrix-algorithm-name";
const NVT_SCAN_DATE: &str = "affymetrix-scan-date";
const PARAM_PREFIX: &str = "affymetrix-algorithm-param-";

/// Read just far enough to learn the data-type identifier. Used by the
/// sniffer to tell single- from multi-channel files (and both from
/// non-CEL generic containers).
pub(crate) fn sniff_data_type<C: SkipRead>(reader: &mut GenericReader<C>) -> Result<String> {
    reader.read_file_header()?;
    let data_header = reader.read_data_header()?;
    Ok(data_header.data_type_id)
}

/// Position the reader on the data group for `channel`, consuming the
/// file and data headers on the way.
fn open_channel<C: SkipRead>(
    reader: &mut GenericReader<C>,
    channel: usize,
) -> Result<(DataHeader, DataGroup)> {
    let file_header = reader.read_file_header()?;
    let data_header = reader.read_data_header()?;
    reader.skip_to(file_header.first_group_pos as u64)?;
    let mut group = reader.read_data_group()?;
    for _ in 0..channel {
        let next = group.next_group_pos as u64;
        if next == 0 || next <= reader.position() {
            return Err(CelError::corrupt(
                reader.path(),
                format!("channel {channel} is beyond the last data group"),
            ));
        }
        reader.skip_to(next)?;
        group = reader.read_data_group()?;
    }
    Ok((data_header, group))
}

/// Count the sibling data groups holding an `Intensity` data set.
pub(crate) fn channel_count<C: SkipRead>(reader: &mut GenericReader<C>) -> Result<usize> {
    let file_header = reader.read_file_header()?;
    reader.read_data_header()?;
    reader.skip_to(file_header.first_group_pos as u64)?;

    let mut channels = 0;
    loop {
        let group_start = reader.position();
        let group = reader.read_data_group()?;
        for _ in 0..group.n_data_sets {
            let set = reader.read_data_set()?;
            if set.name == INTENSITY_SET {
                channels += 1;
                break;
            }
            reader.skip_rows(&set)?;
        }
        let next = group.next_group_pos as u64;
        if next == 0 {
            break;
        }
        if next <= group_start {
            warn!(
                "{}: data group offset {next} does not advance; stopping the walk",
                reader.path().display()
            );
            break;
        }
        reader.skip_to(next)?;
    }
    Ok(channels)
}

/// Name of the `channel`-th data group.
pub(crate) fn channel_name<C: SkipRead>(
    reader: &mut GenericReader<C>,
    channel: usize,
) -> Result<String> {
    let (_, group) = open_channel(reader, channel)?;
    Ok(group.name)
}

/// Header record assembled from the data header's NVT triplets.
pub(crate) fn read_header<C: SkipRead>(reader: &mut GenericReader<C>) -> Result<DetailedHeader> {
    reader.read_file_header()?;
    let data_header = reader.read_data_header()?;
    header_from_nvts(reader, &data_header)
}

fn header_from_nvts<C: SkipRead>(
    reader: &GenericReader<C>,
    data_header: &DataHeader,
) -> Result<DetailedHeader> {
    let path = reader.path();
    let cols = data_header
        .find_nvt(NVT_COLS)
        .ok_or_else(|| CelError::MissingField {
            path: path.to_path_buf(),
            field: NVT_COLS.to_string(),
        })?
        .as_i32(path)?;
    let rows = data_header
        .find_nvt(NVT_ROWS)
        .ok_or_else(|| CelError::MissingField {
            path: path.to_path_buf(),
            field: NVT_ROWS.to_string(),
        })?
        .as_i32(path)?;

    let dat_header = match data_header
        .find_nvt(NVT_DAT_HEADER)
        .or_else(|| data_header.find_nvt(NVT_PARTIAL_DAT_HEADER))
    {
        Some(nvt) => nvt.as_string(path)?,
        None => String::new(),
    };

    let cdf_name = match cdf_name_from_dat_header(&dat_header) {
        Some(name) => name,
        None => data_header
            .find_nvt(NVT_ARRAY_TYPE)
            .ok_or_else(|| CelError::MissingField {
                path: path.to_path_buf(),
                field: format!("{NVT_DAT_HEADER} (.1sq token) or {NVT_ARRAY_TYPE}"),
            })?
            .as_string(path)?,
    };

    let algorithm = match data_header.find_nvt(NVT_ALGORITHM) {
        Some(nvt) => nvt.as_string(path)?,
        None => String::new(),
    };

    // Algorithm parameters are spread over individually named NVTs;
    // render them the way the text format writes its single line.
    let mut parameters = Vec::new();
    let mut corners = [(0, 0); 4];
    for nvt in &data_header.nvts {
        let Some(param) = nvt.name.strip_prefix(PARAM_PREFIX) else {
            continue;
        };
        match param {
            "GridULX" => corners[0].0 = nvt.as_i32(path)?,
            "GridULY" => corners[0].1 = nvt.as_i32(path)?,
            "GridURX" => corners[1].0 = nvt.as_i32(path)?,
            "GridURY" => corners[1].1 = nvt.as_i32(path)?,
            "GridLRX" => corners[2].0 = nvt.as_i32(path)?,
            "GridLRY" => corners[2].1 = nvt.as_i32(path)?,
            "GridLLX" => corners[3].0 = nvt.as_i32(path)?,
            "GridLLY" => corners[3].1 = nvt.as_i32(path)?,
            _ => {
                let value = nvt.as_string(path).unwrap_or_default();
                parameters.push(format!("{param}:{value}"));
            }
        }
    }

    let scan_date = match data_header.find_nvt(NVT_SCAN_DATE) {
        Some(nvt) => Some(nvt.as_string(path)?),
        None if !data_header.created.is_empty() => Some(data_header.created.clone()),
        None => None,
    };

    Ok(DetailedHeader {
        cdf_name,
        cols,
        rows,
        grid_corner_ul: corners[0],
        grid_corner_ur: corners[1],
        grid_corner_lr: corners[2],
        grid_corner_ll: corners[3],
        dat_header,
        algorithm,
        algorithm_parameters: parameters.join(";"),
        scan_date,
    })
}

/// Geometry and chip name for the batch consistency check.
pub(crate) fn read_check_info<C: SkipRead>(
    reader: &mut GenericReader<C>,
) -> Result<(i32, i32, String)> {
    let header = read_header(reader)?;
    Ok((header.cols, header.rows, header.cdf_name))
}

/// Read one of the scalar data sets (Intensity, StdDev or Pixel) for a
/// channel. Rows are already in linear cell order.
pub(crate) fn read_values<C: SkipRead>(
    reader: &mut GenericReader<C>,
    kind: ValueKind,
    channel: usize,
) -> Result<ProbeValues> {
    let (_, _group) = open_channel(reader, channel)?;
    let mut set = reader.read_data_set()?;
    for _ in 0..kind.data_set_index() {
        reader.skip_rows(&set)?;
        set = reader.read_data_set()?;
    }
    let data = reader.read_scalar_rows(&set)?;
    let cells_read = data.len();
    Ok(ProbeValues { data, cells_read })
}

/// Read the Outlier and Mask coordinate sets for a channel, skipping
/// the three scalar sets via their end offsets.
pub(crate) fn mask_outliers<C: SkipRead>(
    reader: &mut GenericReader<C>,
    channel: usize,
) -> Result<(CoordList, CoordList)> {
    let (_, _group) = open_channel(reader, channel)?;
    let mut set = reader.read_data_set()?;
    for _ in 0..3 {
        reader.skip_rows(&set)?;
        set = reader.read_data_set()?;
    }
    let outliers = reader.read_coord_rows(&set)?;
    reader.skip_rows(&set)?;
    let mask_set = reader.read_data_set()?;
    let masks = reader.read_coord_rows(&mask_set)?;
    Ok((masks, outliers))
}

/// Mark masked/outlier cells for a channel. The index stride is the
/// chip's row count from the data header.
pub(crate) fn apply_masks<C: SkipRead>(
    reader: &mut GenericReader<C>,
    values: &mut [f64],
    channel: usize,
    apply_mask: bool,
    apply_outlier: bool,
) -> Result<()> {
    if !apply_mask && !apply_outlier {
        return Ok(());
    }
    let (data_header, _group) = open_channel(reader, channel)?;
    let chip_rows = data_header
        .find_nvt(NVT_ROWS)
        .ok_or_else(|| CelError::MissingField {
            path: reader.path().to_path_buf(),
            field: NVT_ROWS.to_string(),
        })?
        .as_i32(reader.path())?;

    let mut set = reader.read_data_set()?;
    for _ in 0..3 {
        reader.skip_rows(&set)?;
        set = reader.read_data_set()?;
    }

    if apply_outlier {
        let outliers = reader.read_coord_rows(&set)?;
        let path = reader.path().to_path_buf();
        mark_cells(&path, values, &outliers, chip_rows, MISSING)?;
    }
    reader.skip_rows(&set)?;

    let mask_set = reader.read_data_set()?;
    if apply_mask {
        let masks = reader.read_coord_rows(&mask_set)?;
        let path = reader.path().to_path_buf();
        mark_cells(&path, values, &masks, chip_rows, MASKED)?;
    }
    Ok(())
}
