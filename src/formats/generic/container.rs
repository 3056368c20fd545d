//! The self-describing "generic" (Command Console / Calvin) container.
//!
//! Layout: a small file header, then a data header carrying string
//! metadata and name/value/type (NVT) triplets, then a singly-linked
//! sequence of data groups, each holding positionally-ordered typed
//! data sets. Every data set records the absolute offset just past its
//! row block, so unwanted sets are skipped without parsing their rows.
//! All integers and floats are little-endian; strings come in narrow
//! (byte) and wide (u16 code unit) flavors.

use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{CelError, Result};
use crate::values::CoordList;

use super::cursor::SkipRead;

pub(crate) const GENERIC_MAGIC: u8 = 59;
pub(crate) const GENERIC_VERSION: u8 = 1;

/// MIME-like type descriptors used by NVT triplet values.
pub(crate) mod mime {
    pub(crate) const PLAIN: &str = "text/plain";
    pub(crate) const ASCII: &str = "text/ascii";
    pub(crate) const INT8: &str = "text/x-calvin-integer-8";
    pub(crate) const INT16: &str = "text/x-calvin-integer-16";
    pub(crate) const INT32: &str = "text/x-calvin-integer-32";
    pub(crate) const UINT8: &str = "text/x-calvin-unsigned-integer-8";
    pub(crate) const UINT16: &str = "text/x-calvin-unsigned-integer-16";
    pub(crate) const UINT32: &str = "text/x-calvin-unsigned-integer-32";
    pub(crate) const FLOAT: &str = "text/x-calvin-float";
}

/// File header: magic, version, how many data groups follow and where
/// the first one starts.
#[derive(Debug, Clone)]
pub(crate) struct FileHeader {
    #[allow(dead_code)]
    pub n_data_groups: i32,
    pub first_group_pos: u32,
}

/// One name/value/type triplet from a data header.
#[derive(Debug, Clone)]
pub(crate) struct NvtTriplet {
    pub name: String,
    pub value: Vec<u8>,
    pub mime: String,
}

impl NvtTriplet {
    /// Decode an integer-typed value (floats are truncated toward
    /// zero, matching a C cast).
    pub(crate) fn as_i32(&self, path: &Path) -> Result<i32> {
        let take = |n: usize| -> Result<&[u8]> {
            self.value.get(..n).ok_or_else(|| {
                CelError::corrupt(path, format!("NVT value {} shorter than its type", self.name))
            })
        };
        match self.mime.as_str() {
            mime::INT32 | mime::UINT32 => {
                let b = take(4)?;
                Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            mime::INT16 | mime::UINT16 => {
                let b = take(2)?;
                Ok(i16::from_le_bytes([b[0], b[1]]) as i32)
            }
            mime::INT8 => Ok(*take(1)?.first().unwrap_or(&0) as i8 as i32),
            mime::UINT8 => Ok(*take(1)?.first().unwrap_or(&0) as i32),
            mime::FLOAT => {
                let b = take(4)?;
                Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i32)
            }
            other => Err(CelError::parse(
                path,
                format!("integer NVT {}", self.name),
                other,
            )),
        }
    }

    /// Decode a textual value: `text/plain` holds u16 code units,
    /// `text/ascii` holds bytes. Trailing padding NULs are stripped.
    pub(crate) fn as_string(&self, path: &Path) -> Result<String> {
        match self.mime.as_str() {
            mime::PLAIN => {
                let units: Vec<u16> = self
                    .value
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .take_while(|&unit| unit != 0)
                    .collect();
                String::from_utf16(&units).map_err(|_| {
                    CelError::corrupt(path, format!("NVT value {} is not valid UTF-16", self.name))
                })
            }
            mime::ASCII => Ok(String::from_utf8_lossy(&self.value)
                .trim_end_matches('\0')
                .to_string()),
            other => Err(CelError::parse(
                path,
                format!("string NVT {}", self.name),
                other,
            )),
        }
    }
}

/// Data header: string metadata plus the NVT triplets. Parent headers
/// are counted but never parsed; groups are reached through the file
/// header's absolute offset instead.
#[derive(Debug, Clone)]
pub(crate) struct DataHeader {
    pub data_type_id: String,
    #[allow(dead_code)]
    pub guid: String,
    pub created: String,
    #[allow(dead_code)]
    pub locale: String,
    pub nvts: Vec<NvtTriplet>,
    #[allow(dead_code)]
    pub n_parents: i32,
}

impl DataHeader {
    pub(crate) fn find_nvt(&self, name: &str) -> Option<&NvtTriplet> {
        self.nvts.iter().find(|nvt| nvt.name == name)
    }
}

/// Data group descriptor. `next_group_pos == 0` ends the sibling walk.
#[derive(Debug, Clone)]
pub(crate) struct DataGroup {
    pub next_group_pos: u32,
    #[allow(dead_code)]
    pub first_set_pos: u32,
    pub n_data_sets: i32,
    pub name: String,
}

/// Declared type of one data set column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
    Text,
    WideText,
}

impl ColumnType {
    fn from_code(path: &Path, code: i8) -> Result<Self> {
        Ok(match code {
            0 => ColumnType::I8,
            1 => ColumnType::U8,
            2 => ColumnType::I16,
            3 => ColumnType::U16,
            4 => ColumnType::I32,
            5 => ColumnType::U32,
            6 => ColumnType::F32,
            7 => ColumnType::F64,
            8 => ColumnType::Text,
            9 => ColumnType::WideText,
            other => {
                return Err(CelError::corrupt(
                    path,
                    format!("unknown data set column type code {other}"),
                ))
            }
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ColumnMeta {
    #[allow(dead_code)]
    pub name: String,
    pub kind: ColumnType,
    pub size: i32,
}

/// Data set descriptor. Rows live at `data_pos`; `end_pos` is the
/// offset immediately after them, the format's skip mechanism.
#[derive(Debug, Clone)]
pub(crate) struct DataSetMeta {
    pub data_pos: u32,
    pub end_pos: u32,
    pub name: String,
    #[allow(dead_code)]
    pub nvts: Vec<NvtTriplet>,
    pub columns: Vec<ColumnMeta>,
    pub n_rows: u32,
}

impl DataSetMeta {
    fn row_size(&self) -> u64 {
        self.columns.iter().map(|c| c.size.max(0) as u64).sum()
    }
}

/// Cursor-based reader over a generic container stream.
pub(crate) struct GenericReader<C: SkipRead> {
    cursor: C,
    path: PathBuf,
}

impl<C: SkipRead> GenericReader<C> {
    pub(crate) fn new(cursor: C, path: &Path) -> Self {
        GenericReader {
            cursor,
            path: path.to_path_buf(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Forward skip to an absolute offset; failures mid-stream are
    /// truncation (gzip) or corruption (backward offset).
    pub(crate) fn skip_to(&mut self, offset: u64) -> Result<()> {
        self.cursor.skip_to(offset).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidInput {
                CelError::corrupt(&self.path, format!("offset {offset} does not advance"))
            } else {
                CelError::truncated(&self.path, format!("data at offset {offset}"))
            }
        })
    }

    fn truncated(&self, looking_for: &str) -> CelError {
        CelError::truncated(&self.path, looking_for)
    }

    fn read_u8(&mut self, what: &str) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| self.truncated(what))
    }

    fn read_i8(&mut self, what: &str) -> Result<i8> {
        self.cursor.read_i8().map_err(|_| self.truncated(what))
    }

    fn read_i32(&mut self, what: &str) -> Result<i32> {
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| self.truncated(what))
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| self.truncated(what))
    }

    /// Narrow string: i32 byte count + raw bytes.
    fn read_bytes_string(&mut self, what: &str) -> Result<Vec<u8>> {
        let len = self.read_i32(what)?;
        if len < 0 {
            return Err(CelError::corrupt(
                &self.path,
                format!("negative length for {what}"),
            ));
        }
        let mut bytes = vec![0u8; len as usize];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|_| self.truncated(what))?;
        Ok(bytes)
    }

    fn read_ascii_string(&mut self, what: &str) -> Result<String> {
        let bytes = self.read_bytes_string(what)?;
        Ok(String::from_utf8_lossy(&bytes)
            .trim_end_matches('\0')
            .to_string())
    }

    /// Wide string: i32 code-unit count + u16 units, decoded to narrow.
    fn read_wide_string(&mut self, what: &str) -> Result<String> {
        let len = self.read_i32(what)?;
        if len < 0 {
            return Err(CelError::corrupt(
                &self.path,
                format!("negative length for {what}"),
            ));
        }
        let mut units = Vec::with_capacity(len as usize);
        for _ in 0..len {
            units.push(
                self.cursor
                    .read_u16::<LittleEndian>()
                    .map_err(|_| self.truncated(what))?,
            );
        }
        while units.last() == Some(&0) {
            units.pop();
        }
        String::from_utf16(&units)
            .map_err(|_| CelError::corrupt(&self.path, format!("{what} is not valid UTF-16")))
    }

    pub(crate) fn read_file_header(&mut self) -> Result<FileHeader> {
        let magic = self.read_u8("file magic")?;
        if magic != GENERIC_MAGIC {
            return Err(CelError::NotACelFile {
                path: self.path.clone(),
            });
        }
        let version = self.read_u8("file version")?;
        if version != GENERIC_VERSION {
            return Err(CelError::corrupt(
                &self.path,
                format!("generic container version {version}, expected {GENERIC_VERSION}"),
            ));
        }
        let n_data_groups = self.read_i32("data group count")?;
        let first_group_pos = self.read_u32("first data group offset")?;
        Ok(FileHeader {
            n_data_groups,
            first_group_pos,
        })
    }

    fn read_nvt(&mut self) -> Result<NvtTriplet> {
        let name = self.read_wide_string("NVT name")?;
        let value = self.read_bytes_string("NVT value")?;
        let mime = self.read_wide_string("NVT type")?;
        Ok(NvtTriplet { name, value, mime })
    }

    pub(crate) fn read_data_header(&mut self) -> Result<DataHeader> {
        let data_type_id = self.read_ascii_string("data type identifier")?;
        let guid = self.read_ascii_string("file GUID")?;
        let created = self.read_wide_string("creation date")?;
        let locale = self.read_wide_string("locale")?;
        let n_nvt = self.read_i32("NVT count")?;
        let mut nvts = Vec::with_capacity(n_nvt.max(0) as usize);
        for _ in 0..n_nvt {
            nvts.push(self.read_nvt()?);
        }
        let n_parents = self.read_i32("parent header count")?;
        Ok(DataHeader {
            data_type_id,
            guid,
            created,
            locale,
            nvts,
            n_parents,
        })
    }

    pub(crate) fn read_data_group(&mut self) -> Result<DataGroup> {
        let next_group_pos = self.read_u32("next data group offset")?;
        let first_set_pos = self.read_u32("first data set offset")?;
        let n_data_sets = self.read_i32("data set count")?;
        let name = self.read_wide_string("data group name")?;
        Ok(DataGroup {
            next_group_pos,
            first_set_pos,
            n_data_sets,
            name,
        })
    }

    /// Read a data set descriptor, leaving the cursor just before the
    /// row block.
    pub(crate) fn read_data_set(&mut self) -> Result<DataSetMeta> {
        let data_pos = self.read_u32("data set data offset")?;
        let end_pos = self.read_u32("data set end offset")?;
        let name = self.read_wide_string("data set name")?;
        let n_nvt = self.read_i32("data set NVT count")?;
        let mut nvts = Vec::with_capacity(n_nvt.max(0) as usize);
        for _ in 0..n_nvt {
            nvts.push(self.read_nvt()?);
        }
        let n_cols = self.read_u32("data set column count")?;
        let mut columns = Vec::with_capacity(n_cols as usize);
        for _ in 0..n_cols {
            let name = self.read_wide_string("column name")?;
            let code = self.read_i8("column type")?;
            let kind = ColumnType::from_code(&self.path, code)?;
            let size = self.read_i32("column size")?;
            columns.push(ColumnMeta { name, kind, size });
        }
        let n_rows = self.read_u32("data set row count")?;
        Ok(DataSetMeta {
            data_pos,
            end_pos,
            name,
            nvts,
            columns,
            n_rows,
        })
    }

    /// Skip a data set's rows via its recorded end offset.
    pub(crate) fn skip_rows(&mut self, set: &DataSetMeta) -> Result<()> {
        self.skip_to(set.end_pos as u64)
    }

    fn read_column_value(&mut self, kind: ColumnType, what: &str) -> Result<f64> {
        Ok(match kind {
            ColumnType::I8 => self.read_i8(what)? as f64,
            ColumnType::U8 => self.read_u8(what)? as f64,
            ColumnType::I16 => self
                .cursor
                .read_i16::<LittleEndian>()
                .map_err(|_| self.truncated(what))? as f64,
            ColumnType::U16 => self
                .cursor
                .read_u16::<LittleEndian>()
                .map_err(|_| self.truncated(what))? as f64,
            ColumnType::I32 => self.read_i32(what)? as f64,
            ColumnType::U32 => self.read_u32(what)? as f64,
            ColumnType::F32 => self
                .cursor
                .read_f32::<LittleEndian>()
                .map_err(|_| self.truncated(what))? as f64,
            ColumnType::F64 => self
                .cursor
                .read_f64::<LittleEndian>()
                .map_err(|_| self.truncated(what))?,
            ColumnType::Text | ColumnType::WideText => {
                return Err(CelError::corrupt(
                    &self.path,
                    format!("{what}: string column where a numeric one was expected"),
                ))
            }
        })
    }

    /// Materialize the first column of every row as `f64`, skipping any
    /// trailing columns.
    pub(crate) fn read_scalar_rows(&mut self, set: &DataSetMeta) -> Result<Vec<f64>> {
        let column = set.columns.first().ok_or_else(|| {
            CelError::corrupt(&self.path, format!("data set {} has no columns", set.name))
        })?;
        let kind = column.kind;
        let rest = set.row_size() - column.size.max(0) as u64;
        let mut values = Vec::with_capacity(set.n_rows as usize);
        self.skip_to(set.data_pos as u64)?;
        for _ in 0..set.n_rows {
            values.push(self.read_column_value(kind, "data set row")?);
            if rest > 0 {
                let target = self.position() + rest;
                self.skip_to(target)?;
            }
        }
        Ok(values)
    }

    /// Materialize the first two columns of every row as i16
    /// coordinates (the Outlier and Mask set layout).
    pub(crate) fn read_coord_rows(&mut self, set: &DataSetMeta) -> Result<CoordList> {
        if set.columns.len() < 2 {
            return Err(CelError::corrupt(
                &self.path,
                format!("data set {} has no coordinate columns", set.name),
            ));
        }
        let (xk, yk) = (set.columns[0].kind, set.columns[1].kind);
        let rest: u64 = set.columns[2..].iter().map(|c| c.size.max(0) as u64).sum();
        let mut coords = CoordList::with_capacity(set.n_rows as usize);
        self.skip_to(set.data_pos as u64)?;
        for _ in 0..set.n_rows {
            let x = self.read_column_value(xk, "coordinate row")? as i16;
            let y = self.read_column_value(yk, "coordinate row")? as i16;
            coords.push(x, y);
            if rest > 0 {
                let target = self.position() + rest;
                self.skip_to(target)?;
            }
        }
        Ok(coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::generic::cursor::SliceCursor;
    use std::path::Path;

    fn wstring(s: &str) -> Vec<u8> {
        let units: Vec<u16> = s.encode_utf16().collect();
        let mut out = (units.len() as i32).to_le_bytes().to_vec();
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    fn reader_over(bytes: Vec<u8>) -> GenericReader<SliceCursor> {
        GenericReader::new(SliceCursor::new(bytes), Path::new("x.cel"))
    }

    #[test]
    fn file_header_checks_magic_and_version() {
        let mut bytes = vec![GENERIC_MAGIC, GENERIC_VERSION];
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&57u32.to_le_bytes());
        let header = reader_over(bytes).read_file_header().unwrap();
        assert_eq!(header.n_data_groups, 2);
        assert_eq!(header.first_group_pos, 57);

        let bad = vec![0u8, 1, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            reader_over(bad).read_file_header(),
            Err(CelError::NotACelFile { .. })
        ));
    }

    #[test]
    fn wide_strings_decode_and_strip_padding() {
        let mut bytes = wstring("Intensity");
        bytes.extend_from_slice(&wstring("pad\0\0"));
        let mut reader = reader_over(bytes);
        assert_eq!(reader.read_wide_string("s").unwrap(), "Intensity");
        assert_eq!(reader.read_wide_string("s").unwrap(), "pad");
    }

    #[test]
    fn nvt_integer_values_decode_per_mime_type() {
        let nvt = NvtTriplet {
            name: "affymetrix-cel-rows".to_string(),
            value: 2048i32.to_le_bytes().to_vec(),
            mime: mime::INT32.to_string(),
        };
        assert_eq!(nvt.as_i32(Path::new("x.cel")).unwrap(), 2048);

        let short = NvtTriplet {
            name: "rows".to_string(),
            value: vec![1],
            mime: mime::INT32.to_string(),
        };
        assert!(short.as_i32(Path::new("x.cel")).is_err());
    }

    #[test]
    fn nvt_plain_values_are_utf16() {
        let value: Vec<u8> = "Test3".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let nvt = NvtTriplet {
            name: "affymetrix-array-type".to_string(),
            value,
            mime: mime::PLAIN.to_string(),
        };
        assert_eq!(nvt.as_string(Path::new("x.cel")).unwrap(), "Test3");
    }

    #[test]
    fn data_set_descriptor_then_lazy_rows() {
        // One f32 column, two rows, laid out at known offsets.
        let name = wstring("Intensity");
        let col_name = wstring("Intensity");
        let desc_len = 4 + 4 + name.len() + 4 + 4 + (col_name.len() + 1 + 4) + 4;
        let data_pos = desc_len as u32;
        let end_pos = data_pos + 8;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&data_pos.to_le_bytes());
        bytes.extend_from_slice(&end_pos.to_le_bytes());
        bytes.extend_from_slice(&name);
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&col_name);
        bytes.push(6); // f32
        bytes.extend_from_slice(&4i32.to_le_bytes());
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&2.5f32.to_le_bytes());

        let mut reader = reader_over(bytes);
        let set = reader.read_data_set().unwrap();
        assert_eq!(set.name, "Intensity");
        assert_eq!(set.n_rows, 2);
        assert_eq!(set.columns.len(), 1);
        assert_eq!(set.columns[0].kind, ColumnType::F32);
        assert_eq!(set.data_pos, data_pos);

        let rows = reader.read_scalar_rows(&set).unwrap();
        assert_eq!(rows, vec![1.5, 2.5]);
        assert_eq!(reader.position(), end_pos as u64);
    }

    #[test]
    fn unknown_column_type_is_corruption() {
        assert!(matches!(
            ColumnType::from_code(Path::new("x.cel"), 42),
            Err(CelError::Corrupt { .. })
        ));
    }
}
