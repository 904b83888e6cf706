//! Tabular orchestration: header and footer handling, per-klass masking.

use std::collections::{BTreeMap, VecDeque};
use std::iter::FusedIterator;

use recmap_map::{Attributes, Mapper, SKIP_FIELD};
use recmap_model::{Layout, RowIdentifier, TableDefinition, Value};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{CoreError, Result, SourceError};
use crate::footer::FooterBuffer;
use crate::keyed::KeyedRows;
use crate::mask::{MaskedMapping, masked_mappings};
use crate::notify::{Notifier, Progress};
use crate::record::MappedRecord;

/// Attribute carrying the configured row identifier.
pub const ROW_IDENTIFIER_FIELD: &str = "row_identifier";

/// An immutable, ready-to-run tabular mapping.
///
/// All per-run state lives in [`TableRun`], so one `Table` can drive any
/// number of runs, including concurrent ones on separate threads.
#[derive(Debug, Clone)]
pub struct Table {
    definition: TableDefinition,
    masked: Vec<MaskedMapping>,
    mapper: Mapper,
}

impl Table {
    pub fn new(definition: TableDefinition) -> Self {
        let masked = masked_mappings(&definition.columns, definition.klass.as_deref());
        Self {
            definition,
            masked,
            mapper: Mapper::new(),
        }
    }

    /// Builds a table for a tabular definition.
    pub fn tabular(definition: TableDefinition) -> Result<Self> {
        if !matches!(definition.layout, Layout::Tabular) {
            return Err(CoreError::WrongLayout {
                expected: Layout::Tabular.name(),
                actual: definition.layout.name(),
            });
        }
        Ok(Self::new(definition))
    }

    pub fn with_mapper(mut self, mapper: Mapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn masked_mappings(&self) -> &[MaskedMapping] {
        &self.masked
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    /// See [`TableDefinition::matches`].
    pub fn matches(&self, filename: &str, tablename: Option<&str>) -> bool {
        self.definition.matches(filename, tablename)
    }

    /// Transforms rows from an infallible source.
    pub fn transform<I>(&self, rows: I) -> TableRun<'_, impl Iterator<Item = Result<Vec<Value>>>>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        TableRun::new(self, rows.into_iter().map(Ok))
    }

    /// Transforms rows from a fallible source. A source error ends the run.
    pub fn try_transform<I, E>(
        &self,
        rows: I,
    ) -> TableRun<'_, impl Iterator<Item = Result<Vec<Value>>>>
    where
        I: IntoIterator<Item = std::result::Result<Vec<Value>, E>>,
        E: Into<SourceError>,
    {
        TableRun::new(
            self,
            rows.into_iter()
                .map(|row| row.map_err(|err| CoreError::Source(err.into()))),
        )
    }

    /// Transforms string-keyed rows by placing each value under the column of
    /// the same name. Keys without a column end the run with
    /// [`CoreError::UnmappedKeys`].
    pub fn transform_keyed<I>(
        &self,
        rows: I,
    ) -> TableRun<'_, impl Iterator<Item = Result<Vec<Value>>>>
    where
        I: IntoIterator<Item = BTreeMap<String, Value>>,
    {
        TableRun::new(self, KeyedRows::new(&self.definition.columns, rows.into_iter()))
    }

    /// Maps one data row to a record per klass.
    pub fn transform_line(&self, row: &[Value], index: usize) -> Result<Vec<MappedRecord>> {
        self.records_for(row, &self.masked, index)
    }

    /// Maps one row through the given masks, applying skip rules and the row
    /// identifier.
    pub(crate) fn records_for(
        &self,
        row: &[Value],
        masked: &[MaskedMapping],
        index: usize,
    ) -> Result<Vec<MappedRecord>> {
        let mut records = Vec::with_capacity(masked.len());
        for (klass, columns) in masked {
            let mut attributes = self.mapper.map_row(row, columns)?;
            if self.lacks_significant_fields(&attributes) {
                attributes.insert(SKIP_FIELD, "true");
            }
            if attributes.skip() {
                trace!(klass = %klass, index, "record skipped");
                continue;
            }
            match self.definition.row_identifier {
                Some(RowIdentifier::Index) => {
                    attributes.insert(ROW_IDENTIFIER_FIELD, i64::try_from(index).unwrap_or(i64::MAX));
                }
                Some(RowIdentifier::Uuid) => {
                    attributes.insert(ROW_IDENTIFIER_FIELD, Uuid::new_v4().to_string());
                }
                None => {}
            }
            records.push(MappedRecord {
                klass: klass.clone(),
                attributes,
                index,
            });
        }
        Ok(records)
    }

    fn lacks_significant_fields(&self, attributes: &Attributes) -> bool {
        let significant = &self.definition.significant_mapped_fields;
        !significant.is_empty()
            && significant
                .iter()
                .all(|field| attributes.get(field).is_none_or(Value::is_blank))
    }

    /// Error for a header that never matched, comparing the best guess
    /// against the expected column names.
    fn header_error(&self, guess: &[String]) -> CoreError {
        let columns = &self.definition.columns;
        let expected: Vec<String> = columns
            .iter()
            .map(|column| column.name().to_lowercase())
            .collect();
        let unexpected: Vec<String> = guess
            .iter()
            .filter(|cell| !columns.iter().any(|column| column.column.matches_ignore_case(cell)))
            .map(|cell| cell.to_lowercase())
            .collect();
        let missing: Vec<String> = columns
            .iter()
            .filter(|column| !guess.iter().any(|cell| column.column.matches_ignore_case(cell)))
            .map(|column| column.name().to_lowercase())
            .collect();

        let mut message = String::from("Header is not valid!");
        if missing.is_empty() && unexpected.is_empty() {
            message.push_str(" (out of order)");
        } else {
            if !missing.is_empty() {
                message.push_str(&format!(" missing: {missing:?}"));
            }
            if !unexpected.is_empty() {
                message.push_str(&format!(" unexpected: {unexpected:?}"));
            }
        }
        debug!(?expected, ?guess, "header rejected");
        CoreError::HeaderInvalid { message }
    }

    fn header_matches(&self, cells: &[String]) -> bool {
        cells.len() == self.definition.columns.len()
            && self
                .definition
                .columns
                .iter()
                .zip(cells)
                .all(|(column, cell)| column.column.matches_ignore_case(cell))
    }
}

/// One pass over a row source.
///
/// Yields records in source order. The first error ends the run.
pub struct TableRun<'a, I> {
    table: &'a Table,
    rows: FooterBuffer<I, Vec<Value>>,
    row_index: usize,
    header_valid: bool,
    header_guess: Vec<String>,
    pending: VecDeque<MappedRecord>,
    progress: Progress<'a>,
    done: bool,
}

impl<'a, I> TableRun<'a, I>
where
    I: Iterator<Item = Result<Vec<Value>>>,
{
    fn new(table: &'a Table, rows: I) -> Self {
        Self {
            table,
            rows: FooterBuffer::new(rows, table.definition.footer_lines),
            row_index: 0,
            header_valid: table.definition.header_lines == 0,
            header_guess: Vec::new(),
            pending: VecDeque::new(),
            progress: Progress::new(),
            done: false,
        }
    }

    /// Attaches a notifier to this run.
    pub fn with_notifier(mut self, notifier: impl Notifier + 'a) -> Self {
        self.progress.attach(Box::new(notifier));
        self
    }

    /// Whether the header rows matched the expected columns.
    pub fn header_valid(&self) -> bool {
        self.header_valid
    }

    /// Rows consumed so far, header rows included.
    pub fn row_index(&self) -> usize {
        self.row_index
    }

    fn consider_header(&mut self, row: &[Value]) {
        let cells: Vec<String> = row.iter().map(Value::to_raw_string).collect();
        if self.table.header_matches(&cells) {
            self.header_valid = true;
        }
        if cells.iter().any(|cell| !cell.trim().is_empty()) {
            self.header_guess = cells;
        }
    }

    fn finish(&mut self) {
        self.done = true;
        let header_lines = self.table.definition.header_lines;
        if self.row_index < header_lines {
            warn!(
                rows = self.row_index,
                header_lines, "source ended before the header was complete"
            );
        }
        self.progress.finish();
        debug!(
            rows = self.row_index,
            records = self.progress.count(),
            "table run finished"
        );
    }

    fn fail(&mut self, err: CoreError) -> Option<Result<MappedRecord>> {
        self.done = true;
        self.pending.clear();
        self.progress.abandon();
        Some(Err(err))
    }
}

impl<I> Iterator for TableRun<'_, I>
where
    I: Iterator<Item = Result<Vec<Value>>>,
{
    type Item = Result<MappedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                self.progress.record();
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            if self.row_index == 0 {
                self.progress.start();
                debug!(
                    table = %self.table.definition.display_name(),
                    header_lines = self.table.definition.header_lines,
                    footer_lines = self.table.definition.footer_lines,
                    "table run started"
                );
            }
            let row = match self.rows.next() {
                None => {
                    self.finish();
                    return None;
                }
                Some(Err(err)) => return self.fail(err),
                Some(Ok(row)) => row,
            };

            let index = self.row_index;
            self.row_index += 1;
            let header_lines = self.table.definition.header_lines;
            if index < header_lines {
                self.consider_header(&row);
                if self.row_index == header_lines && !self.header_valid {
                    let err = self.table.header_error(&self.header_guess);
                    return self.fail(err);
                }
                continue;
            }

            match self.table.transform_line(&row, index) {
                Ok(records) => self.pending.extend(records),
                Err(err) => return self.fail(err),
            }
        }
    }
}

impl<I> FusedIterator for TableRun<'_, I> where I: Iterator<Item = Result<Vec<Value>>> {}

impl<I> std::fmt::Debug for TableRun<'_, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRun")
            .field("row_index", &self.row_index)
            .field("header_valid", &self.header_valid)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use recmap_model::StandardMappings;

    use super::*;

    fn table(yaml: &str) -> Table {
        Table::new(TableDefinition::from_yaml_str_with(yaml, &StandardMappings::new()).unwrap())
    }

    fn rows(rows: &[&[&str]]) -> Vec<Vec<Value>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| Value::from(*cell)).collect())
            .collect()
    }

    #[test]
    fn header_row_is_consumed_and_indices_kept() {
        let t = table("{ klass: K, header_lines: 1, columns: [{ column: one }, { column: two }] }");
        let out: Vec<_> = t
            .transform(rows(&[&["ONE", "TWO"], &["CARROT", "POTATO"], &["BACON", "SAUSAGE"]]))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].klass, "K");
        assert_eq!(out[0].index, 1);
        assert_eq!(out[0].attributes.rawtext["one"], "CARROT");
        assert_eq!(out[1].attributes.rawtext["two"], "SAUSAGE");
        assert_eq!(out[1].index, 2);
    }

    #[test]
    fn header_valid_is_tracked_per_run() {
        let t = table("{ klass: K, header_lines: 2, columns: [{ column: one }] }");
        let mut run = t.transform(rows(&[&["title"], &["One"], &["x"]]));
        assert!(!run.header_valid());
        assert!(run.next().unwrap().is_ok());
        assert!(run.header_valid());
        assert!(run.next().is_none());
    }

    #[test]
    fn missing_and_unexpected_columns_are_named() {
        let t = table("{ klass: K, header_lines: 1, columns: [{ column: one }, { column: two }] }");
        let err = t
            .transform(rows(&[&["one", "three"], &["a", "b"]]))
            .next()
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Header is not valid! missing: ["two"] unexpected: ["three"]"#
        );
    }

    #[test]
    fn upper_case_regex_columns_validate_the_header() {
        let t = table(r"{ klass: K, header_lines: 1, columns: [{ column: '/^NHS/' }, { column: '/^sur/' }] }");
        let mut run = t.transform(rows(&[&["NHS No", "SURNAME"], &["123", "SMITH"]]));
        assert!(run.next().unwrap().is_ok());
        assert!(run.header_valid());
    }

    #[test]
    fn run_fuses_after_error() {
        let t = table("{ klass: K, columns: [{ column: one }] }");
        let mut run = t.transform(rows(&[&["a", "b"], &["c"]]));
        assert!(matches!(run.next(), Some(Err(CoreError::Map(_)))));
        assert!(run.next().is_none());
    }

    #[test]
    fn row_identifier_index_is_attached() {
        let t = table("{ klass: K, row_identifier: index, columns: [{ column: one }] }");
        let out: Vec<_> = t.transform(rows(&[&["a"], &["b"]])).map(|r| r.unwrap()).collect();
        assert_eq!(out[1].attributes.get(ROW_IDENTIFIER_FIELD), Some(&Value::Integer(1)));
    }

    #[test]
    fn row_identifier_uuid_is_unique_per_record() {
        let t = table(
            "{ row_identifier: uuid, columns: [{ column: one, klass: [A, B], mappings: [{ field: one }] }] }",
        );
        let out: Vec<_> = t.transform(rows(&[&["a"]])).map(|r| r.unwrap()).collect();
        assert_eq!(out.len(), 2);
        let first = out[0].attributes.get(ROW_IDENTIFIER_FIELD).unwrap();
        let second = out[1].attributes.get(ROW_IDENTIFIER_FIELD).unwrap();
        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first.to_string()).is_ok());
    }

    #[test]
    fn significant_fields_skip_empty_records() {
        let t = table(
            r#"
klass: K
significant_mapped_fields: [surname]
columns:
  - { column: surname, mappings: [{ field: surname }] }
  - { column: note, mappings: [{ field: note }] }
"#,
        );
        let out: Vec<_> = t
            .transform(rows(&[&["", "orphan"], &["SMITH", ""]]))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 1);
    }

    #[test]
    fn source_errors_end_the_run() {
        let t = table("{ klass: K, columns: [{ column: one }] }");
        let source: Vec<std::result::Result<Vec<Value>, std::io::Error>> = vec![
            Ok(vec![Value::from("a")]),
            Err(std::io::Error::other("disk on fire")),
            Ok(vec![Value::from("b")]),
        ];
        let out: Vec<_> = t.try_transform(source).collect();
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(matches!(&out[1], Err(CoreError::Source(err)) if err.to_string() == "disk on fire"));
    }

    #[test]
    fn wrong_layout_is_rejected() {
        let definition = TableDefinition::from_yaml_str_with(
            "{ xml_record_xpath: a/b, columns: [] }",
            &StandardMappings::new(),
        )
        .unwrap();
        assert!(matches!(
            Table::tabular(definition),
            Err(CoreError::WrongLayout { actual: "xml", .. })
        ));
    }
}
