//! Tests for file-backed sources.

use std::fs;

use recmap_ingest::{IngestError, open_delimited, open_lines, open_xml};
use recmap_model::{StandardMappings, TableDefinition, Value};
use tempfile::TempDir;

#[test]
fn delimited_file_uses_table_delimiter() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("visits.psv");
    fs::write(&path, "one|two\nCARROT|POTATO\n").unwrap();
    let definition = TableDefinition::from_yaml_str_with(
        "{ klass: K, delimiter: '|', columns: [{ column: one }, { column: two }] }",
        &StandardMappings::new(),
    )
    .unwrap();

    let rows: Vec<Vec<Value>> = open_delimited(&path, &definition)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1], vec![Value::from("CARROT"), Value::from("POTATO")]);
}

#[test]
fn line_file_streams_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("letters.txt");
    fs::write(&path, "Dear Dr\r\nregards\r\n").unwrap();
    let lines: Vec<String> = open_lines(&path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(lines, vec!["Dear Dr", "regards"]);
}

#[test]
fn xml_file_yields_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("export.xml");
    fs::write(&path, "<Export><Record><Name>Ann</Name></Record></Export>").unwrap();
    let records: Vec<_> = open_xml(&path, "Export/Record")
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].inner_text(), "Ann");
}

#[test]
fn missing_files_are_reported() {
    let dir = TempDir::new().unwrap();
    let err = open_lines(&dir.path().join("absent.txt")).err().unwrap();
    assert!(matches!(err, IngestError::FileNotFound { .. }));
}
