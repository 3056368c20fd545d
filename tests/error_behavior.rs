//! Failure-mode contracts: what is fatal, what is a soft short read.

mod common;

use celio::{CelError, CelReader, ValueKind};
use common::CelContent;
use tempfile::tempdir;

#[test]
fn text_truncated_mid_body_is_a_short_read() {
    let dir = tempdir().unwrap();
    let content = CelContent::sample_2x2();
    let text = common::text_cel(&content);

    // Cut after the second body line: the [INTENSITY], NumberCells and
    // CellHeader lines plus two records.
    let marker = text.find("[INTENSITY]").unwrap();
    let mut cut = marker;
    for _ in 0..5 {
        cut = text[cut..].find("\r\n").unwrap() + cut + 2;
    }
    let path = dir.path().join("short.CEL");
    common::write_file(&path, text[..cut].as_bytes());

    let reader = CelReader::open(&path).unwrap();
    let values = reader.read_values(ValueKind::Intensity, 2).unwrap();
    assert!(!values.is_complete());
    assert_eq!(values.cells_read, 2);
    assert!(values.cells_read < 4);
    assert_eq!(values.data[0], 138.0);
    assert_eq!(values.data[1], 11103.0);
    assert_eq!(values.data[3], 0.0);
}

#[test]
fn text_missing_header_section_is_truncation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("noheader.CEL");
    common::write_file(&path, b"[CEL]\r\nVersion=3\r\n");

    let reader = CelReader::open(&path).unwrap();
    let err = reader.read_values(ValueKind::Intensity, 2).unwrap_err();
    assert!(matches!(err, CelError::TruncatedFile { .. }));
    let err = reader.read_header().unwrap_err();
    assert!(matches!(err, CelError::TruncatedFile { .. }));
}

#[test]
fn gz_text_truncated_mid_body_is_a_short_read() {
    let dir = tempdir().unwrap();
    let content = CelContent::sample_2x2();
    let text = common::text_cel(&content);
    let marker = text.find("[MASKS]").unwrap();
    let path = dir.path().join("short.CEL.gz");
    common::write_file(&path, &common::gzip(text[..marker - 10].as_bytes()));

    let reader = CelReader::open(&path).unwrap();
    let values = reader.read_values(ValueKind::Intensity, 2).unwrap();
    // All four body lines survive the cut; the masks section does not.
    assert!(values.is_complete());
    assert!(matches!(
        reader.mask_outliers().unwrap_err(),
        CelError::TruncatedFile { .. }
    ));
}

#[test]
fn binary_cell_count_mismatch_is_fatal_before_rows() {
    let dir = tempdir().unwrap();
    let content = CelContent::sample_2x2();
    let mut bytes = common::binary_cel(&content);
    bytes[16..20].copy_from_slice(&9i32.to_le_bytes());
    let path = dir.path().join("baddims.CEL");
    common::write_file(&path, &bytes);

    let reader = CelReader::open(&path).unwrap();
    let err = reader.read_values(ValueKind::Intensity, 2).unwrap_err();
    assert!(matches!(err, CelError::DimensionMismatch { .. }));
}

#[test]
fn binary_truncated_rows_are_corruption() {
    let dir = tempdir().unwrap();
    let content = CelContent::sample_2x2();
    let mut bytes = common::binary_cel(&content);
    bytes.truncate(bytes.len() - 20);
    let path = dir.path().join("corrupt.CEL");
    common::write_file(&path, &bytes);

    let reader = CelReader::open(&path).unwrap();
    let err = reader.read_values(ValueKind::Intensity, 2).unwrap_err();
    assert!(matches!(err, CelError::CorruptBinaryRecord { .. }));
}

#[test]
fn generic_truncated_header_is_truncation() {
    let dir = tempdir().unwrap();
    let content = CelContent::sample_2x2();
    let mut bytes = common::generic_single(&content);
    bytes.truncate(40);
    let path = dir.path().join("cut.CEL");
    common::write_file(&path, &bytes);

    // The sniffer cannot classify a generic file whose data header is
    // gone, so this surfaces as an unrecognized format.
    assert!(matches!(
        celio::classify(&path),
        Err(CelError::UnrecognizedFormat { .. })
    ));
}

#[test]
fn generic_truncated_rows_are_truncation() {
    let dir = tempdir().unwrap();
    let content = CelContent::sample_2x2();
    let mut bytes = common::generic_single(&content);
    bytes.truncate(bytes.len() - 6);
    let path = dir.path().join("cutrows.CEL");
    common::write_file(&path, &bytes);

    let reader = CelReader::open(&path).unwrap();
    let err = reader.mask_outliers().unwrap_err();
    assert!(matches!(err, CelError::TruncatedFile { .. }));
}

#[test]
fn channel_ops_refused_for_single_channel_encodings() {
    let dir = tempdir().unwrap();
    let content = CelContent::sample_2x2();
    let path = dir.path().join("bin.CEL");
    common::write_file(&path, &common::binary_cel(&content));

    let reader = CelReader::open(&path).unwrap();
    assert_eq!(reader.channel_count().unwrap(), 1);
    assert!(matches!(
        reader.channel_name(0).unwrap_err(),
        CelError::Unsupported { .. }
    ));
}
