//! # celio - Affymetrix CEL file reader
//!
//! `celio` decodes Affymetrix CEL microarray files in every physical
//! encoding the scanners produced:
//!
//! - **Text** (`[CEL]`-marked ASCII sections) and its gzipped twin
//! - **Binary v4** (fixed little-endian layout, magic 64 / version 4)
//! - **Generic** (the self-describing Command Console container),
//!   plain or gzipped, single- or multi-channel
//!
//! All four produce the same things: a [`DetailedHeader`], three dense
//! probe-indexed arrays (intensity, standard deviation, pixel count)
//! and the masked/outlier coordinate lists. A probe at `(x, y)` lands
//! at linear index `x + chip_rows * y` in every array.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use celio::{CelReader, ValueKind};
//!
//! let reader = CelReader::open("scan.CEL")?;
//! println!("format: {}", reader.kind());
//!
//! let header = reader.read_header()?;
//! println!("{} ({}x{})", header.cdf_name, header.cols, header.rows);
//!
//! let mut values = reader.read_values(ValueKind::Intensity, header.rows)?;
//! reader.apply_masks(&mut values.data, header.rows, true, false)?;
//! # Ok::<(), celio::CelError>(())
//! ```
//!
//! ## Batches
//!
//! [`batch::read_batch`] reads many files into one column-major
//! matrix, validating every file's geometry and chip type against the
//! first file *before* any body is read - one mismatched file fails
//! the batch up front.
//!
//! ## Failure behavior
//!
//! Structural problems (missing section markers, short binary records,
//! truncated container fields, mismatched dimensions) are fatal
//! [`CelError`]s. The single soft case is a text `[INTENSITY]` body
//! that ends early: those reads succeed with a partially filled array
//! and [`ProbeValues::cells_read`] telling you how far they got.
//!
//! ## Architecture
//!
//! - [`sniff`]: format classification, run once per file
//! - `formats::text` / `formats::binary` / `formats::generic`: the
//!   per-encoding decoders behind [`CelReader`]'s dispatch
//! - [`batch`]: the validate-all-then-read-all driver

pub mod batch;
pub mod error;
mod formats;
pub mod header;
mod reader;
pub mod sniff;
mod values;

pub use error::{CelError, Result};
pub use header::{ChipGeometry, DetailedHeader};
pub use reader::{CelFile, CelReader};
pub use sniff::{classify, FormatKind};
pub use values::{cell_index, is_missing, CoordList, ProbeValues, ValueKind, MASKED, MISSING};
