//! Synthetic CEL fixtures for the integration tests.
//!
//! Each builder produces a byte-exact file of one encoding so the
//! decoders can be exercised without shipping scanner output.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

/// Logical content shared by the text and binary builders.
#[derive(Clone)]
pub struct CelContent {
    pub cols: i32,
    pub rows: i32,
    pub chip: String,
    /// `(x, y, mean, stddev, npixels)` per cell, in file order.
    pub cells: Vec<(i32, i32, f64, f64, i32)>,
    pub masks: Vec<(i16, i16)>,
    pub outliers: Vec<(i16, i16)>,
}

impl CelContent {
    /// A 2x2 chip with distinct values per cell, one mask at (0,0) and
    /// one outlier at (1,1).
    pub fn sample_2x2() -> Self {
        CelContent {
            cols: 2,
            rows: 2,
            chip: "Test3".to_string(),
            // Values chosen to be exactly representable in f32 so the
            // text (f64) and binary (f32) renderings decode equal.
            cells: vec![
                (0, 0, 138.0, 15.5, 25),
                (1, 0, 11103.0, 930.75, 25),
                (0, 1, 87.0, 17.25, 25),
                (1, 1, 140.5, 18.75, 25),
            ],
            masks: vec![(0, 0)],
            outliers: vec![(1, 1)],
        }
    }

    pub fn dat_header(&self) -> String {
        format!(
            "[0..65534]  {0}:CLS=4733 RWS=4733 XIN=3  YIN=3  VE=17 {0}.1sq  6",
            self.chip
        )
    }
}

/// Render the text encoding with CRLF line endings.
pub fn text_cel(content: &CelContent) -> String {
    let mut out = String::new();
    out.push_str("[CEL]\r\nVersion=3\r\n\r\n[HEADER]\r\n");
    let _ = write!(out, "Cols={}\r\nRows={}\r\n", content.cols, content.rows);
    out.push_str("TotalX=2\r\nTotalY=2\r\nOffsetX=0\r\nOffsetY=0\r\n");
    out.push_str("GridCornerUL=229 235\r\nGridCornerUR=4450 246\r\n");
    out.push_str("GridCornerLR=4440 4470\r\nGridCornerLL=219 4459\r\n");
    out.push_str("Axis-invertX=0\r\nAxisInvertY=0\r\nswapXY=0\r\n");
    let _ = write!(out, "DatHeader={}\r\n", content.dat_header());
    out.push_str("Algorithm=Percentile\r\n");
    out.push_str("AlgorithmParameters=Percentile:75;CellMargin:2\r\n\r\n");

    out.push_str("[INTENSITY]\r\n");
    let _ = write!(out, "NumberCells={}\r\n", content.cells.len());
    out.push_str("CellHeader=X\tY\tMEAN\tSTDV\tNPIXELS\r\n");
    for (x, y, mean, sd, npix) in &content.cells {
        let _ = write!(out, "{x:>3}\t{y:>3}\t{mean}\t{sd}\t{npix:>3}\r\n");
    }
    out.push_str("\r\n[MASKS]\r\n");
    let _ = write!(out, "NumberCells={}\r\n", content.masks.len());
    out.push_str("CellHeader=X\tY\r\n");
    for (x, y) in &content.masks {
        let _ = write!(out, "{x}\t{y}\r\n");
    }
    out.push_str("\r\n[OUTLIERS]\r\n");
    let _ = write!(out, "NumberCells={}\r\n", content.outliers.len());
    out.push_str("CellHeader=X\tY\r\n");
    for (x, y) in &content.outliers {
        let _ = write!(out, "{x}\t{y}\r\n");
    }
    out
}

/// Render the binary v4 encoding.
pub fn binary_cel(content: &CelContent) -> Vec<u8> {
    let header_text = format!(
        "Cols={}\nRows={}\nTotalX={}\nTotalY={}\n\
         GridCornerUL=229 235\nGridCornerUR=4450 246\n\
         GridCornerLR=4440 4470\nGridCornerLL=219 4459\n\
         DatHeader={}\nAlgorithm=Percentile\n\
         AlgorithmParameters=Percentile:75;CellMargin:2\n",
        content.cols,
        content.rows,
        content.cols,
        content.rows,
        content.dat_header()
    );

    let mut out = Vec::new();
    out.extend_from_slice(&64i32.to_le_bytes());
    out.extend_from_slice(&4i32.to_le_bytes());
    out.extend_from_slice(&content.cols.to_le_bytes());
    out.extend_from_slice(&content.rows.to_le_bytes());
    out.extend_from_slice(&(content.cols * content.rows).to_le_bytes());
    for blob in [
        header_text.as_str(),
        "Percentile",
        "Percentile:75;CellMargin:2\n",
    ] {
        out.extend_from_slice(&(blob.len() as i32).to_le_bytes());
        out.extend_from_slice(blob.as_bytes());
    }
    out.extend_from_slice(&2i32.to_le_bytes()); // cell margin
    out.extend_from_slice(&(content.outliers.len() as u32).to_le_bytes());
    out.extend_from_slice(&(content.masks.len() as u32).to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes()); // subgrids

    // Cell records in row-major chip order regardless of the (x, y)
    // the text body would carry.
    let mut ordered = content.cells.clone();
    ordered.sort_by_key(|&(x, y, ..)| (y, x));
    for (_, _, mean, sd, npix) in &ordered {
        out.extend_from_slice(&(*mean as f32).to_le_bytes());
        out.extend_from_slice(&(*sd as f32).to_le_bytes());
        out.extend_from_slice(&(*npix as i16).to_le_bytes());
    }
    for (x, y) in &content.masks {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    for (x, y) in &content.outliers {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    out
}

/// Gzip arbitrary bytes the way scanner archives do.
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

pub fn write_file(path: &Path, bytes: &[u8]) {
    fs::write(path, bytes).expect("write fixture");
}

// ---------------------------------------------------------------------
// Generic (Command Console) container fixtures
// ---------------------------------------------------------------------

fn wstring(s: &str) -> Vec<u8> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let mut out = (units.len() as i32).to_le_bytes().to_vec();
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

fn string(bytes: &[u8]) -> Vec<u8> {
    let mut out = (bytes.len() as i32).to_le_bytes().to_vec();
    out.extend_from_slice(bytes);
    out
}

/// Encode a `text/plain` NVT value: UTF-16LE code units.
fn plain_value(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

pub struct Nvt {
    pub name: String,
    pub value: Vec<u8>,
    pub mime: String,
}

pub fn nvt_i32(name: &str, value: i32) -> Nvt {
    Nvt {
        name: name.to_string(),
        value: value.to_le_bytes().to_vec(),
        mime: "text/x-calvin-integer-32".to_string(),
    }
}

pub fn nvt_plain(name: &str, value: &str) -> Nvt {
    Nvt {
        name: name.to_string(),
        value: plain_value(value),
        mime: "text/plain".to_string(),
    }
}

/// One scan channel's worth of data sets.
pub struct Channel {
    pub name: String,
    pub intensities: Vec<f32>,
    pub stddev: Vec<f32>,
    pub npixels: Vec<i16>,
    pub outliers: Vec<(i16, i16)>,
    pub masks: Vec<(i16, i16)>,
}

impl Channel {
    pub fn from_content(name: &str, content: &CelContent) -> Self {
        let mut ordered = content.cells.clone();
        ordered.sort_by_key(|&(x, y, ..)| (y, x));
        Channel {
            name: name.to_string(),
            intensities: ordered.iter().map(|c| c.2 as f32).collect(),
            stddev: ordered.iter().map(|c| c.3 as f32).collect(),
            npixels: ordered.iter().map(|c| c.4 as i16).collect(),
            outliers: content.outliers.clone(),
            masks: content.masks.clone(),
        }
    }
}

fn scalar_rows_f32(values: &[f32]) -> Vec<Vec<u8>> {
    values.iter().map(|v| v.to_le_bytes().to_vec()).collect()
}

fn scalar_rows_i16(values: &[i16]) -> Vec<Vec<u8>> {
    values.iter().map(|v| v.to_le_bytes().to_vec()).collect()
}

fn coord_rows(coords: &[(i16, i16)]) -> Vec<Vec<u8>> {
    coords
        .iter()
        .map(|(x, y)| {
            let mut row = x.to_le_bytes().to_vec();
            row.extend_from_slice(&y.to_le_bytes());
            row
        })
        .collect()
}

/// Serialize one data set at absolute offset `start`, returning its
/// bytes and the offset just past its rows.
fn data_set(start: u32, name: &str, cols: &[(&str, i8, i32)], rows: &[Vec<u8>]) -> (Vec<u8>, u32) {
    let name_bytes = wstring(name);
    let col_bytes: Vec<u8> = cols
        .iter()
        .flat_map(|(cname, code, size)| {
            let mut c = wstring(cname);
            c.push(*code as u8);
            c.extend_from_slice(&size.to_le_bytes());
            c
        })
        .collect();
    let desc_len = 4 + 4 + name_bytes.len() + 4 + 4 + col_bytes.len() + 4;
    let rows_len: usize = rows.iter().map(Vec::len).sum();
    let data_pos = start + desc_len as u32;
    let end_pos = data_pos + rows_len as u32;

    let mut out = Vec::with_capacity(desc_len + rows_len);
    out.extend_from_slice(&data_pos.to_le_bytes());
    out.extend_from_slice(&end_pos.to_le_bytes());
    out.extend_from_slice(&name_bytes);
    out.extend_from_slice(&0i32.to_le_bytes()); // no set-level NVTs
    out.extend_from_slice(&(cols.len() as u32).to_le_bytes());
    out.extend_from_slice(&col_bytes);
    out.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    for row in rows {
        out.extend_from_slice(row);
    }
    (out, end_pos)
}

/// Serialize a channel's data group at absolute offset `start`.
fn data_group(start: u32, channel: &Channel, is_last: bool) -> Vec<u8> {
    let name_bytes = wstring(&channel.name);
    let header_len = 4 + 4 + 4 + name_bytes.len();
    let first_set_pos = start + header_len as u32;

    let coord_cols: &[(&str, i8, i32)] = &[("X", 2, 2), ("Y", 2, 2)];
    let intensity_col: &[(&str, i8, i32)] = &[("Intensity", 6, 4)];
    let stddev_col: &[(&str, i8, i32)] = &[("StdDev", 6, 4)];
    let pixel_col: &[(&str, i8, i32)] = &[("Pixel", 2, 2)];
    let sets: [(&str, Vec<Vec<u8>>, &[(&str, i8, i32)]); 5] = [
        ("Intensity", scalar_rows_f32(&channel.intensities), intensity_col),
        ("StdDev", scalar_rows_f32(&channel.stddev), stddev_col),
        ("Pixel", scalar_rows_i16(&channel.npixels), pixel_col),
        ("Outlier", coord_rows(&channel.outliers), coord_cols),
        ("Mask", coord_rows(&channel.masks), coord_cols),
    ];

    let mut set_bytes = Vec::new();
    let mut cursor = first_set_pos;
    for (name, rows, cols) in &sets {
        let (bytes, end) = data_set(cursor, name, cols, rows);
        set_bytes.extend_from_slice(&bytes);
        cursor = end;
    }

    let next_group_pos: u32 = if is_last { 0 } else { cursor };
    let mut out = Vec::with_capacity(header_len + set_bytes.len());
    out.extend_from_slice(&next_group_pos.to_le_bytes());
    out.extend_from_slice(&first_set_pos.to_le_bytes());
    out.extend_from_slice(&(sets.len() as i32).to_le_bytes());
    out.extend_from_slice(&name_bytes);
    out.extend_from_slice(&set_bytes);
    out
}

/// Serialize a complete generic CEL container.
pub fn generic_cel(data_type_id: &str, nvts: &[Nvt], channels: &[Channel]) -> Vec<u8> {
    let mut data_header = Vec::new();
    data_header.extend_from_slice(&string(data_type_id.as_bytes()));
    data_header.extend_from_slice(&string(b"0000-0000-0000-0000"));
    data_header.extend_from_slice(&wstring("2007-09-13T11:31:40Z"));
    data_header.extend_from_slice(&wstring("en-US"));
    data_header.extend_from_slice(&(nvts.len() as i32).to_le_bytes());
    for nvt in nvts {
        data_header.extend_from_slice(&wstring(&nvt.name));
        data_header.extend_from_slice(&string(&nvt.value));
        data_header.extend_from_slice(&wstring(&nvt.mime));
    }
    data_header.extend_from_slice(&0i32.to_le_bytes()); // no parent headers

    let first_group_pos = (10 + data_header.len()) as u32;
    let mut out = Vec::new();
    out.push(59u8);
    out.push(1u8);
    out.extend_from_slice(&(channels.len() as i32).to_le_bytes());
    out.extend_from_slice(&first_group_pos.to_le_bytes());
    out.extend_from_slice(&data_header);

    let mut cursor = first_group_pos;
    for (i, channel) in channels.iter().enumerate() {
        let bytes = data_group(cursor, channel, i + 1 == channels.len());
        cursor += bytes.len() as u32;
        out.extend_from_slice(&bytes);
    }
    out
}

/// The standard NVT block for a generic CEL fixture.
pub fn generic_nvts(content: &CelContent) -> Vec<Nvt> {
    vec![
        nvt_i32("affymetrix-cel-rows", content.rows),
        nvt_i32("affymetrix-cel-cols", content.cols),
        nvt_plain("affymetrix-partial-dat-header", &content.dat_header()),
        nvt_plain("affymetrix-array-type", &content.chip),
        nvt_plain("affymetrix-algorithm-name", "Percentile"),
        nvt_i32("affymetrix-algorithm-param-GridULX", 229),
        nvt_i32("affymetrix-algorithm-param-GridULY", 235),
        nvt_i32("affymetrix-algorithm-param-GridURX", 4450),
        nvt_i32("affymetrix-algorithm-param-GridURY", 246),
        nvt_i32("affymetrix-algorithm-param-GridLRX", 4440),
        nvt_i32("affymetrix-algorithm-param-GridLRY", 4470),
        nvt_i32("affymetrix-algorithm-param-GridLLX", 219),
        nvt_i32("affymetrix-algorithm-param-GridLLY", 4459),
        nvt_plain("affymetrix-algorithm-param-Percentile", "75"),
        nvt_plain("affymetrix-scan-date", "2007-09-13T11:31:40Z"),
    ]
}

/// A complete single-channel generic fixture for `content`.
pub fn generic_single(content: &CelContent) -> Vec<u8> {
    generic_cel(
        "affymetrix-calvin-intensity",
        &generic_nvts(content),
        &[Channel::from_content("Default Group", content)],
    )
}

/// A multi-channel generic fixture with one group per channel name.
pub fn generic_multi(content: &CelContent, channel_names: &[&str]) -> Vec<u8> {
    let channels: Vec<Channel> = channel_names
        .iter()
        .map(|name| Channel::from_content(name, content))
        .collect();
    generic_cel(
        "affymetrix-calvin-multi-intensity",
        &generic_nvts(content),
        &channels,
    )
}
