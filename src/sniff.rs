//! Format classification.
//!
//! Each candidate encoding is probed on its own freshly opened handle,
//! in a fixed order: text, gzipped text, binary, generic, gzipped
//! generic. A probe that fails to open or reads short simply does not
//! match; it never prevents the next probe from running.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use serde::Serialize;

use crate::error::{CelError, Result};
use crate::formats::binary::{BINARY_MAGIC, BINARY_VERSION};
use crate::formats::generic::cel::{DATA_TYPE_INTENSITY, DATA_TYPE_MULTI_INTENSITY};
use crate::formats::generic::{self, cel};
use crate::formats::text::CEL_MARKER;

/// The physical encoding of a CEL file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormatKind {
    /// Plain text sections.
    Text,
    /// Gzip-compressed text.
    GzText,
    /// Little-endian binary, version 4.
    Binary,
    /// Generic container, single channel.
    Generic,
    /// Generic container, multiple channels.
    GenericMulti,
    /// Gzipped generic container, single channel.
    GzGeneric,
    /// Gzipped generic container, multiple channels.
    GzGenericMulti,
}

impl FormatKind {
    /// Whether this is one of the generic container variants.
    pub fn is_generic(self) -> bool {
        matches!(
            self,
            FormatKind::Generic
                | FormatKind::GenericMulti
                | FormatKind::GzGeneric
                | FormatKind::GzGenericMulti
        )
    }

    /// Whether the file can hold more than one scan channel.
    pub fn is_multichannel(self) -> bool {
        matches!(self, FormatKind::GenericMulti | FormatKind::GzGenericMulti)
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormatKind::Text => "text",
            FormatKind::GzText => "gzipped text",
            FormatKind::Binary => "binary (v4)",
            FormatKind::Generic => "generic",
            FormatKind::GenericMulti => "generic (multi-channel)",
            FormatKind::GzGeneric => "gzipped generic",
            FormatKind::GzGenericMulti => "gzipped generic (multi-channel)",
        };
        write!(f, "{name}")
    }
}

/// Classify a CEL file by its leading bytes.
///
/// Only an unopenable file, a gzip member with a non-deflate method, or
/// exhaustion of all five probes produce an error; everything else a
/// probe encounters (short reads, bad magic) just moves on to the next
/// probe.
pub fn classify(path: &Path) -> Result<FormatKind> {
    // Fail early with the open error; the probes would each hide it.
    File::open(path).map_err(|e| CelError::open(path, e))?;

    if probe_text(path) {
        return Ok(FormatKind::Text);
    }
    if let Some(method) = gzip_method(path) {
        // Deflate is the only method gzip actually assigns; anything
        // else cannot be decompressed here.
        if method != 8 {
            return Err(CelError::UnsupportedCompression {
                path: path.to_path_buf(),
                method,
            });
        }
        if probe_gz_text(path) {
            return Ok(FormatKind::GzText);
        }
    }
    if probe_binary(path) {
        return Ok(FormatKind::Binary);
    }
    match probe_generic(path) {
        Some(false) => return Ok(FormatKind::Generic),
        Some(true) => return Ok(FormatKind::GenericMulti),
        None => {}
    }
    match probe_gz_generic(path) {
        Some(false) => return Ok(FormatKind::GzGeneric),
        Some(true) => return Ok(FormatKind::GzGenericMulti),
        None => {}
    }
    Err(CelError::UnrecognizedFormat {
        path: path.to_path_buf(),
    })
}

fn first_line<R: Read>(reader: R) -> Option<String> {
    let mut line = String::new();
    let mut reader = BufReader::new(reader);
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

fn probe_text(path: &Path) -> bool {
    File::open(path)
        .ok()
        .and_then(first_line)
        .is_some_and(|line| line.starts_with(CEL_MARKER))
}

/// The compression-method byte of a gzip member, if the file is one.
fn gzip_method(path: &Path) -> Option<u8> {
    let mut file = File::open(path).ok()?;
    let mut magic = [0u8; 3];
    file.read_exact(&mut magic).ok()?;
    (magic[0] == 0x1f && magic[1] == 0x8b).then_some(magic[2])
}

fn probe_gz_text(path: &Path) -> bool {
    File::open(path)
        .ok()
        .map(GzDecoder::new)
        .and_then(first_line)
        .is_some_and(|line| line.starts_with(CEL_MARKER))
}

fn probe_binary(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut reader = BufReader::new(file);
    let magic = reader.read_i32::<LittleEndian>();
    let version = reader.read_i32::<LittleEndian>();
    matches!((magic, version), (Ok(BINARY_MAGIC), Ok(BINARY_VERSION)))
}

/// `Some(multichannel)` when the generic file and data headers parse
/// and the data-type identifier is one of the intensity kinds.
fn probe_generic(path: &Path) -> Option<bool> {
    let mut reader = generic::open_plain(path).ok()?;
    match_data_type(cel::sniff_data_type(&mut reader).ok()?)
}

fn probe_gz_generic(path: &Path) -> Option<bool> {
    let mut reader = generic::open_gz(path).ok()?;
    match_data_type(cel::sniff_data_type(&mut reader).ok()?)
}

fn match_data_type(data_type_id: String) -> Option<bool> {
    match data_type_id.as_str() {
        DATA_TYPE_INTENSITY => Some(false),
        DATA_TYPE_MULTI_INTENSITY => Some(true),
        _ => None,
    }
}
