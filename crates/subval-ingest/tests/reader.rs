//! Tests for the tab-separated row reader.

use std::fs;

use subval_ingest::{IngestError, TsvReader, read_header};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write file");
    path
}

#[test]
fn skips_header_and_blank_lines() {
    let dir = TempDir::new().expect("temp dir");
    let path = write(
        &dir,
        "donor.txt",
        "donor_id\tdonor_sex\nD1\tmale\n\nD2\tfemale\n\t\nD3\t\n",
    );

    let reader = TsvReader::open(&path).expect("open");
    assert_eq!(reader.header(), ["donor_id", "donor_sex"]);
    let rows: Vec<_> = reader.map(|row| row.expect("row")).collect();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].line, 2);
    assert_eq!(rows[1].line, 4);
    assert_eq!(rows[2].line, 6);
    assert_eq!(rows[1].field(0), Some("D2"));
    assert_eq!(rows[2].field(1), Some(""));
}

#[test]
fn quotes_are_literal_and_rows_may_be_ragged() {
    let dir = TempDir::new().expect("temp dir");
    let path = write(&dir, "sample.txt", "a\tb\tc\n\"x\ty\nonly\n");

    let rows: Vec<_> = TsvReader::open(&path)
        .expect("open")
        .map(|row| row.expect("row"))
        .collect();

    assert_eq!(rows[0].fields, vec!["\"x".to_string(), "y".to_string()]);
    assert_eq!(rows[1].fields, vec!["only".to_string()]);
    assert_eq!(rows[1].field(2), None);
}

#[test]
fn counts_rows_and_finds_columns() {
    let dir = TempDir::new().expect("temp dir");
    let path = write(&dir, "specimen.txt", "donor_id\tspecimen_id\nD1\tS1\nD1\tS2\n");

    let mut reader = TsvReader::open(&path).expect("open").with_log_threshold(1);
    assert_eq!(reader.column_index("specimen_id"), Some(1));
    assert_eq!(reader.column_index("missing"), None);
    for row in reader.by_ref() {
        row.expect("row");
    }
    assert_eq!(reader.rows_read(), 2);
}

#[test]
fn header_only_file_yields_no_rows() {
    let dir = TempDir::new().expect("temp dir");
    let path = write(&dir, "donor.txt", "donor_id\n");
    assert_eq!(read_header(&path).expect("header"), vec!["donor_id".to_string()]);
    assert_eq!(TsvReader::open(&path).expect("open").count(), 0);
}

#[test]
fn missing_file_is_an_open_error() {
    let dir = TempDir::new().expect("temp dir");
    let result = TsvReader::open(&dir.path().join("nope.txt"));
    assert!(matches!(result, Err(IngestError::FileOpen { .. })));
}
