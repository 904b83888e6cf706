//! Table definitions and mapping documents.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value as YamlValue;

use crate::error::{ConfigError, Result};
use crate::mapping::{ColumnMapping, validate_priorities};
use crate::non_tabular::{NonTabularRow, RawNonTabularRow};
use crate::pattern::Pattern;
use crate::standard::{self, StandardMappings};

/// Every key a table definition may use.
pub const TABLE_OPTIONS: &[&str] = &[
    "canonical_name",
    "columns",
    "delimiter",
    "encoding",
    "filename_pattern",
    "footer_lines",
    "format",
    "header_lines",
    "klass",
    "liberal_parsing",
    "non_tabular_row",
    "row_identifier",
    "significant_mapped_fields",
    "tablename_pattern",
    "xml_record_xpath",
];

/// Identifier attached to every emitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowIdentifier {
    /// The 0-based source row (or record) index.
    Index,
    /// A fresh random identifier per emitted record.
    Uuid,
}

/// Physical layout of the source, derived from which options are present.
#[derive(Debug, Clone)]
pub enum Layout {
    Tabular,
    NonTabular(NonTabularRow),
    Xml { record_xpath: String },
}

impl Layout {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tabular => "tabular",
            Self::NonTabular(_) => "non-tabular",
            Self::Xml { .. } => "xml",
        }
    }
}

/// One validated, immutable table mapping.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub columns: Vec<ColumnMapping>,
    pub header_lines: usize,
    pub footer_lines: usize,
    /// Table-level klass; when set, every column feeds it.
    pub klass: Option<String>,
    pub filename_pattern: Option<Pattern>,
    pub tablename_pattern: Option<Pattern>,
    pub canonical_name: Option<String>,
    pub format: Option<String>,
    pub delimiter: u8,
    pub encoding: Option<String>,
    pub liberal_parsing: bool,
    pub row_identifier: Option<RowIdentifier>,
    pub significant_mapped_fields: Vec<String>,
    pub layout: Layout,
}

#[derive(Debug, Deserialize)]
struct RawTableDefinition {
    #[serde(default)]
    columns: Vec<YamlValue>,
    #[serde(default)]
    header_lines: usize,
    #[serde(default)]
    footer_lines: usize,
    klass: Option<String>,
    filename_pattern: Option<String>,
    tablename_pattern: Option<String>,
    canonical_name: Option<String>,
    format: Option<String>,
    delimiter: Option<String>,
    encoding: Option<String>,
    #[serde(default)]
    liberal_parsing: bool,
    row_identifier: Option<RowIdentifier>,
    #[serde(default)]
    significant_mapped_fields: Vec<String>,
    non_tabular_row: Option<RawNonTabularRow>,
    xml_record_xpath: Option<String>,
}

impl TableDefinition {
    /// Parses a single table using the process-wide standard mappings.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_yaml_str_with(yaml, standard::global())
    }

    pub fn from_yaml_str_with(yaml: &str, registry: &StandardMappings) -> Result<Self> {
        Self::from_yaml_value(serde_yaml::from_str(yaml)?, registry)
    }

    pub fn from_yaml_value(value: YamlValue, registry: &StandardMappings) -> Result<Self> {
        let YamlValue::Mapping(options) = &value else {
            return Err(ConfigError::InvalidDocument);
        };
        for key in options.keys() {
            let key = key.as_str().unwrap_or_default();
            if !TABLE_OPTIONS.contains(&key) {
                return Err(ConfigError::UnknownOption {
                    key: key.to_string(),
                    context: "table".to_string(),
                });
            }
        }
        let raw: RawTableDefinition = serde_yaml::from_value(value)?;
        let columns = raw
            .columns
            .into_iter()
            .map(|column| ColumnMapping::from_yaml_value(column, registry))
            .collect::<Result<Vec<_>>>()?;

        let layout = match (raw.non_tabular_row, raw.xml_record_xpath) {
            (Some(row), _) => Layout::NonTabular(NonTabularRow::try_from(row)?),
            (None, Some(record_xpath)) => Layout::Xml { record_xpath },
            (None, None) => Layout::Tabular,
        };

        let definition = Self {
            columns,
            header_lines: raw.header_lines,
            footer_lines: raw.footer_lines,
            klass: raw.klass.filter(|klass| !klass.trim().is_empty()),
            filename_pattern: raw.filename_pattern.as_deref().map(Pattern::parse).transpose()?,
            tablename_pattern: raw.tablename_pattern.as_deref().map(Pattern::parse).transpose()?,
            canonical_name: raw.canonical_name,
            format: raw.format,
            delimiter: parse_delimiter(raw.delimiter.as_deref())?,
            encoding: raw.encoding,
            liberal_parsing: raw.liberal_parsing,
            row_identifier: raw.row_identifier,
            significant_mapped_fields: raw.significant_mapped_fields,
            layout,
        };
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<()> {
        if self.klass.is_none()
            && let Some(column) = self
                .columns
                .iter()
                .find(|column| !column.do_not_capture && column.klass.is_empty())
        {
            return Err(ConfigError::MissingKlass {
                column: column.name().to_string(),
            });
        }
        validate_priorities(&self.columns)?;
        if let Layout::NonTabular(_) = self.layout
            && let Some(column) = self
                .columns
                .iter()
                .find(|column| !column.do_not_capture && column.non_tabular_cell.is_none())
        {
            return Err(ConfigError::MissingLines {
                column: column.name().to_string(),
            });
        }
        Ok(())
    }

    /// Whether this table applies to the given file and (optional) table name.
    ///
    /// Only the basename of `filename` is compared. An absent pattern matches
    /// anything.
    pub fn matches(&self, filename: &str, tablename: Option<&str>) -> bool {
        let basename = Path::new(filename)
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| filename.into());
        let filename_ok = self
            .filename_pattern
            .as_ref()
            .is_none_or(|pattern| pattern.matches(&basename));
        let tablename_ok = match (&self.tablename_pattern, tablename) {
            (None, _) => true,
            (Some(pattern), Some(name)) => pattern.matches(name),
            (Some(_), None) => false,
        };
        filename_ok && tablename_ok
    }

    /// Distinct klass names in first-seen order.
    pub fn klasses(&self) -> Vec<String> {
        if let Some(klass) = &self.klass {
            return vec![klass.clone()];
        }
        let mut names: Vec<String> = Vec::new();
        for column in self.columns.iter().filter(|column| !column.do_not_capture) {
            for klass in &column.klass {
                if !names.contains(klass) {
                    names.push(klass.clone());
                }
            }
        }
        names
    }

    /// Display name: `canonical_name`, else the filename pattern, else the layout.
    pub fn display_name(&self) -> String {
        self.canonical_name
            .clone()
            .or_else(|| self.filename_pattern.as_ref().map(ToString::to_string))
            .unwrap_or_else(|| self.layout.name().to_string())
    }
}

fn parse_delimiter(raw: Option<&str>) -> Result<u8> {
    let Some(raw) = raw else {
        return Ok(b',');
    };
    let raw = if raw == "\\t" { "\t" } else { raw };
    match raw.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(ConfigError::InvalidOption {
            key: "delimiter".to_string(),
            reason: format!("expected a single ASCII character, got '{raw}'"),
        }),
    }
}

/// All tables from one YAML mapping document.
#[derive(Debug, Clone, Default)]
pub struct MappingDocument {
    tables: Vec<TableDefinition>,
}

impl MappingDocument {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::from_yaml_str_with(yaml, standard::global())
    }

    /// Accepts either one table or a list of tables.
    pub fn from_yaml_str_with(yaml: &str, registry: &StandardMappings) -> Result<Self> {
        let tables = match serde_yaml::from_str(yaml)? {
            YamlValue::Sequence(items) => items
                .into_iter()
                .map(|item| TableDefinition::from_yaml_value(item, registry))
                .collect::<Result<Vec<_>>>()?,
            table @ YamlValue::Mapping(_) => vec![TableDefinition::from_yaml_value(table, registry)?],
            _ => return Err(ConfigError::InvalidDocument),
        };
        tracing::debug!(tables = tables.len(), "mapping document loaded");
        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    /// First table matching the file and table name.
    pub fn find(&self, filename: &str, tablename: Option<&str>) -> Option<&TableDefinition> {
        self.tables
            .iter()
            .find(|table| table.matches(filename, tablename))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(yaml: &str) -> Result<TableDefinition> {
        TableDefinition::from_yaml_str_with(yaml, &StandardMappings::new())
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = table("{ columns: [], colour: blue }").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOption { key, .. } if key == "colour"));
    }

    #[test]
    fn layout_is_derived_from_options() {
        let t = table("{ columns: [] }").unwrap();
        assert!(matches!(t.layout, Layout::Tabular));
        let t = table("{ columns: [], xml_record_xpath: 'root/record' }").unwrap();
        assert!(matches!(t.layout, Layout::Xml { .. }));
        let t = table("{ columns: [], non_tabular_row: { start_line_pattern: '^-+$' } }").unwrap();
        assert!(matches!(t.layout, Layout::NonTabular(_)));
    }

    #[test]
    fn capturing_column_needs_klass() {
        let err = table("{ columns: [{ column: a }] }").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKlass { column } if column == "a"));
        assert!(table("{ klass: K, columns: [{ column: a }] }").is_ok());
        assert!(table("{ columns: [{ column: a, do_not_capture: true }] }").is_ok());
    }

    #[test]
    fn non_tabular_columns_need_cells() {
        let err = table(
            "{ klass: K, non_tabular_row: { start_line_pattern: x }, columns: [{ column: a }] }",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingLines { .. }));
    }

    #[test]
    fn matches_on_basename_and_tablename() {
        let t = table(r"{ filename_pattern: '/\A[A-Z]+\.csv\z/i', tablename_pattern: sheet1 }")
            .unwrap();
        assert!(t.matches("/data/in/PATIENTS.csv", Some("sheet1")));
        assert!(!t.matches("/data/in/PATIENTS.csv", Some("sheet2")));
        assert!(!t.matches("/data/in/PATIENTS.csv", None));
        assert!(!t.matches("patients_2.csv", Some("sheet1")));
    }

    #[test]
    fn delimiter_must_be_one_byte() {
        assert_eq!(table("{ delimiter: '|' }").unwrap().delimiter, b'|');
        assert_eq!(table(r"{ delimiter: '\t' }").unwrap().delimiter, b'\t');
        assert!(matches!(
            table("{ delimiter: '||' }"),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn document_accepts_one_table_or_many() {
        let registry = StandardMappings::new();
        let one = MappingDocument::from_yaml_str_with("{ klass: K }", &registry).unwrap();
        assert_eq!(one.len(), 1);
        let many = MappingDocument::from_yaml_str_with(
            "[{ klass: A, filename_pattern: a.csv }, { klass: B }]",
            &registry,
        )
        .unwrap();
        assert_eq!(many.find("b.csv", None).unwrap().klass.as_deref(), Some("B"));
        assert!(matches!(
            MappingDocument::from_yaml_str_with("42", &registry),
            Err(ConfigError::InvalidDocument)
        ));
    }
}
