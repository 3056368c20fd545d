//! The caller-facing reader: classify a file once, then dispatch every
//! operation to the matching backend without re-sniffing.

use std::path::{Path, PathBuf};

use crate::error::{CelError, Result};
use crate::formats::generic::cel;
use crate::formats::{binary, generic, text};
use crate::header::{check_reference, ChipGeometry, DetailedHeader};
use crate::sniff::{classify, FormatKind};
use crate::values::{CoordList, ProbeValues, ValueKind};

/// A classified CEL file.
///
/// [`CelReader::open`] runs the format sniffer exactly once; every
/// subsequent call opens a fresh handle and reads with the backend the
/// sniffer selected. Readers hold no open file between calls, so they
/// are cheap to keep around, and separate instances can read different
/// files concurrently.
pub struct CelReader {
    path: PathBuf,
    kind: FormatKind,
}

impl CelReader {
    /// Classify `path` and build a reader for it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let kind = classify(&path)?;
        Ok(CelReader { path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The encoding the sniffer detected.
    pub fn kind(&self) -> FormatKind {
        self.kind
    }

    /// Read the detailed header record. Never touches the body.
    pub fn read_header(&self) -> Result<DetailedHeader> {
        match self.kind {
            FormatKind::Text => text::read_header(&mut text::open(&self.path)?),
            FormatKind::GzText => text::read_header(&mut text::open_gz(&self.path)?),
            FormatKind::Binary => binary::read_header(&self.path),
            FormatKind::Generic | FormatKind::GenericMulti => {
                cel::read_header(&mut generic::open_plain(&self.path)?)
            }
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => {
                cel::read_header(&mut generic::open_gz(&self.path)?)
            }
        }
    }

    /// Read one value per probe into a dense array indexed by
    /// `x + chip_rows * y`.
    ///
    /// `chip_rows` is the row stride for the text backends, normally
    /// the chip's own row count (a batch driver passes the reference
    /// geometry's); the binary and generic encodings carry their own.
    /// The text backends may return a partially filled array after a
    /// truncated body; check [`ProbeValues::is_complete`].
    pub fn read_values(&self, kind: ValueKind, chip_rows: i32) -> Result<ProbeValues> {
        match self.kind {
            FormatKind::Text => text::read_values(&mut text::open(&self.path)?, kind, chip_rows),
            FormatKind::GzText => {
                text::read_values(&mut text::open_gz(&self.path)?, kind, chip_rows)
            }
            FormatKind::Binary => binary::read_values(&self.path, kind),
            FormatKind::Generic | FormatKind::GenericMulti => {
                cel::read_values(&mut generic::open_plain(&self.path)?, kind, 0)
            }
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => {
                cel::read_values(&mut generic::open_gz(&self.path)?, kind, 0)
            }
        }
    }

    /// Extract the masked and outlier coordinate lists, in that order.
    pub fn mask_outliers(&self) -> Result<(CoordList, CoordList)> {
        match self.kind {
            FormatKind::Text => text::mask_outliers(&mut text::open(&self.path)?),
            FormatKind::GzText => text::mask_outliers(&mut text::open_gz(&self.path)?),
            FormatKind::Binary => binary::mask_outliers(&self.path),
            FormatKind::Generic | FormatKind::GenericMulti => {
                cel::mask_outliers(&mut generic::open_plain(&self.path)?, 0)
            }
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => {
                cel::mask_outliers(&mut generic::open_gz(&self.path)?, 0)
            }
        }
    }

    /// Overwrite flagged cells in `values`: masked cells with
    /// [`crate::MASKED`], outliers with [`crate::MISSING`]. Applying a
    /// second time writes the same sentinels again, so the operation is
    /// idempotent.
    pub fn apply_masks(
        &self,
        values: &mut [f64],
        chip_rows: i32,
        apply_mask: bool,
        apply_outlier: bool,
    ) -> Result<()> {
        match self.kind {
            FormatKind::Text => text::apply_masks(
                &mut text::open(&self.path)?,
                values,
                chip_rows,
                apply_mask,
                apply_outlier,
            ),
            FormatKind::GzText => text::apply_masks(
                &mut text::open_gz(&self.path)?,
                values,
                chip_rows,
                apply_mask,
                apply_outlier,
            ),
            FormatKind::Binary => binary::apply_masks(&self.path, values, apply_mask, apply_outlier),
            FormatKind::Generic | FormatKind::GenericMulti => cel::apply_masks(
                &mut generic::open_plain(&self.path)?,
                values,
                0,
                apply_mask,
                apply_outlier,
            ),
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => cel::apply_masks(
                &mut generic::open_gz(&self.path)?,
                values,
                0,
                apply_mask,
                apply_outlier,
            ),
        }
    }

    /// Verify this file against a reference chip name and geometry
    /// without reading its body: dimensions must match exactly, the
    /// chip name case-insensitively over the reference name's length.
    pub fn check_against(&self, ref_cdf_name: &str, ref_geometry: ChipGeometry) -> Result<()> {
        let (cols, rows, cdf_name) = match self.kind {
            FormatKind::Text => text::read_check_info(&mut text::open(&self.path)?)?,
            FormatKind::GzText => text::read_check_info(&mut text::open_gz(&self.path)?)?,
            FormatKind::Binary => binary::read_check_info(&self.path)?,
            FormatKind::Generic | FormatKind::GenericMulti => {
                cel::read_check_info(&mut generic::open_plain(&self.path)?)?
            }
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => {
                cel::read_check_info(&mut generic::open_gz(&self.path)?)?
            }
        };
        check_reference(
            &self.path,
            &cdf_name,
            ChipGeometry::new(cols, rows),
            ref_cdf_name,
            ref_geometry,
        )
    }

    /// Number of scan channels: the count of data groups holding an
    /// `Intensity` data set. The single-channel encodings are always 1.
    pub fn channel_count(&self) -> Result<usize> {
        match self.kind {
            FormatKind::Generic | FormatKind::GenericMulti => {
                cel::channel_count(&mut generic::open_plain(&self.path)?)
            }
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => {
                cel::channel_count(&mut generic::open_gz(&self.path)?)
            }
            _ => Ok(1),
        }
    }

    /// Name of a channel's data group (generic formats only).
    pub fn channel_name(&self, channel: usize) -> Result<String> {
        match self.kind {
            FormatKind::Generic | FormatKind::GenericMulti => {
                cel::channel_name(&mut generic::open_plain(&self.path)?, channel)
            }
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => {
                cel::channel_name(&mut generic::open_gz(&self.path)?, channel)
            }
            _ => Err(self.not_multichannel("channel_name")),
        }
    }

    /// Per-channel variant of [`Self::read_values`] (generic formats
    /// only).
    pub fn read_values_channel(&self, kind: ValueKind, channel: usize) -> Result<ProbeValues> {
        match self.kind {
            FormatKind::Generic | FormatKind::GenericMulti => {
                cel::read_values(&mut generic::open_plain(&self.path)?, kind, channel)
            }
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => {
                cel::read_values(&mut generic::open_gz(&self.path)?, kind, channel)
            }
            _ => Err(self.not_multichannel("read_values_channel")),
        }
    }

    /// Per-channel variant of [`Self::mask_outliers`] (generic formats
    /// only).
    pub fn mask_outliers_channel(&self, channel: usize) -> Result<(CoordList, CoordList)> {
        match self.kind {
            FormatKind::Generic | FormatKind::GenericMulti => {
                cel::mask_outliers(&mut generic::open_plain(&self.path)?, channel)
            }
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => {
                cel::mask_outliers(&mut generic::open_gz(&self.path)?, channel)
            }
            _ => Err(self.not_multichannel("mask_outliers_channel")),
        }
    }

    /// Per-channel variant of [`Self::apply_masks`] (generic formats
    /// only).
    pub fn apply_masks_channel(
        &self,
        values: &mut [f64],
        channel: usize,
        apply_mask: bool,
        apply_outlier: bool,
    ) -> Result<()> {
        match self.kind {
            FormatKind::Generic | FormatKind::GenericMulti => cel::apply_masks(
                &mut generic::open_plain(&self.path)?,
                values,
                channel,
                apply_mask,
                apply_outlier,
            ),
            FormatKind::GzGeneric | FormatKind::GzGenericMulti => cel::apply_masks(
                &mut generic::open_gz(&self.path)?,
                values,
                channel,
                apply_mask,
                apply_outlier,
            ),
            _ => Err(self.not_multichannel("apply_masks_channel")),
        }
    }

    fn not_multichannel(&self, operation: &'static str) -> CelError {
        CelError::Unsupported {
            path: self.path.clone(),
            operation,
        }
    }
}

/// Everything one CEL file records, read in a single call.
#[derive(Debug, Clone)]
pub struct CelFile {
    pub header: DetailedHeader,
    pub intensities: ProbeValues,
    pub stddev: ProbeValues,
    pub npixels: ProbeValues,
    pub masks: CoordList,
    pub outliers: CoordList,
}

impl CelFile {
    /// Read the header, all three value arrays and both coordinate
    /// lists of one file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let reader = CelReader::open(path)?;
        let header = reader.read_header()?;
        let chip_rows = header.rows;
        let (masks, outliers) = reader.mask_outliers()?;
        Ok(CelFile {
            intensities: reader.read_values(ValueKind::Intensity, chip_rows)?,
            stddev: reader.read_values(ValueKind::StdDev, chip_rows)?,
            npixels: reader.read_values(ValueKind::NPixels, chip_rows)?,
            masks,
            outliers,
            header,
        })
    }
}
