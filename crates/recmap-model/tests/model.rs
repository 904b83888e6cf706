//! Tests for recmap-model definitions.

use chrono::NaiveDate;
use recmap_model::{
    CleanRule, Composition, ConfigError, FieldTransform, Layout, LineSelector, MappingDocument,
    RowIdentifier, StandardMappings, TableDefinition, Value,
};

const STANDARD: &str = r#"
postcode:
  klass: Patient
  mappings:
    - field: postcode
      clean: postcode
      priority: 1
"#;

const DOCUMENT: &str = r#"
- canonical_name: patients
  filename_pattern: /\.csv\z/i
  header_lines: 1
  footer_lines: 1
  row_identifier: index
  columns:
    - column: Surname
      klass: Patient
      mappings:
        - { field: surname, clean: name }
    - column: Postcode
      standard_mapping: postcode
      mappings:
        - { field: postcode_raw }
    - column: Admitted
      klass: [Patient, [Admission]]
      mappings:
        - { field: admitted, format: "%d/%m/%Y" }
- canonical_name: pathology
  filename_pattern: /\.txt\z/
  klass: Pathology
  non_tabular_row:
    start_line_pattern: /^-{6}$/
    capture_start_line: false
  columns:
    - column: specimen
      non_tabular_cell:
        lines: { in: ['^Specimen', '^Report'], exclusive: true }
        capture: '^\s*(.*)$'
"#;

fn document() -> MappingDocument {
    let registry = StandardMappings::from_yaml_str(STANDARD).unwrap();
    MappingDocument::from_yaml_str_with(DOCUMENT, &registry).unwrap()
}

#[test]
fn document_tables_are_selected_by_filename() {
    let doc = document();
    assert_eq!(doc.len(), 2);
    let patients = doc.find("/incoming/PATIENTS.CSV", None).unwrap();
    assert_eq!(patients.canonical_name.as_deref(), Some("patients"));
    assert_eq!(patients.row_identifier, Some(RowIdentifier::Index));
    let pathology = doc.find("path.txt", None).unwrap();
    assert!(matches!(pathology.layout, Layout::NonTabular(_)));
    assert!(doc.find("notes.pdf", None).is_none());
}

#[test]
fn standard_mapping_is_merged_into_column() {
    let doc = document();
    let postcode = &doc.tables()[0].columns[1];
    assert_eq!(postcode.name(), "Postcode");
    assert_eq!(postcode.klass, vec!["Patient"]);
    assert_eq!(postcode.standard_mapping.as_deref(), Some("postcode"));
    let fields: Vec<_> = postcode.mappings.iter().map(|m| m.field.as_str()).collect();
    assert_eq!(fields, vec!["postcode", "postcode_raw"]);
    assert!(matches!(
        postcode.mappings[0].transform,
        FieldTransform::Clean(ref rules) if rules == &[CleanRule::Postcode]
    ));
    assert_eq!(
        postcode.mappings[0].composition,
        Composition::Ranked { priority: 1 }
    );
}

#[test]
fn non_tabular_cell_is_parsed() {
    let doc = document();
    let column = &doc.tables()[1].columns[0];
    let cell = column.non_tabular_cell.as_ref().unwrap();
    assert!(matches!(cell.lines, LineSelector::Between { exclusive: true, .. }));
    assert_eq!(cell.join, "\n");
}

#[test]
fn nested_klass_is_flattened() {
    let doc = document();
    assert_eq!(doc.tables()[0].klasses(), vec!["Patient", "Admission"]);
}

#[test]
fn missing_capture_is_a_configuration_error() {
    let err = TableDefinition::from_yaml_str_with(
        r#"
klass: K
non_tabular_row: { start_line_pattern: '^START' }
columns:
  - column: a
    non_tabular_cell: { lines: 0 }
"#,
        &StandardMappings::new(),
    )
    .unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"non-tabular column 'a' is missing its capture rule");
}

#[test]
fn unknown_standard_mapping_is_reported() {
    let err = TableDefinition::from_yaml_str_with(
        "{ columns: [{ column: a, standard_mapping: nhs }] }",
        &StandardMappings::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownStandardMapping { name } if name == "nhs"));
}

#[test]
fn values_serialize_as_plain_json() {
    let values = vec![
        Value::Null,
        Value::from("text"),
        Value::from(42_i64),
        Value::from(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
        Value::List(vec![Value::from("a"), Value::from("b")]),
    ];
    let json = serde_json::to_string(&values).unwrap();
    assert_eq!(json, r#"[null,"text",42,"2024-02-29",["a","b"]]"#);
}
