//! Record reassembly for free-text line streams.
//!
//! Lines are scanned with a two-state machine (outside a record, inside a
//! record) driven by the start and end line patterns. Each completed record
//! is tabulated into one row and mapped by the embedded [`Table`].

mod line;
mod record;

use std::collections::VecDeque;
use std::iter::FusedIterator;

use recmap_map::Mapper;
use recmap_model::{Layout, NonTabularRow, TableDefinition};
use tracing::{debug, trace};

pub use line::Line;
pub use record::Record;

use crate::error::{CoreError, Result, SourceError};
use crate::notify::{Notifier, Progress};
use crate::record::MappedRecord;
use crate::table::Table;

use line::RemovedLines;

/// A non-tabular mapping ready to run.
#[derive(Debug, Clone)]
pub struct NonTabularTable {
    table: Table,
    row: NonTabularRow,
}

impl NonTabularTable {
    pub fn new(definition: TableDefinition) -> Result<Self> {
        let Layout::NonTabular(row) = &definition.layout else {
            return Err(CoreError::WrongLayout {
                expected: "non-tabular",
                actual: definition.layout.name(),
            });
        };
        let row = row.clone();
        Ok(Self {
            table: Table::new(definition),
            row,
        })
    }

    pub fn with_mapper(mut self, mapper: Mapper) -> Self {
        self.table = self.table.with_mapper(mapper);
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn definition(&self) -> &TableDefinition {
        self.table.definition()
    }

    /// Reassembles and maps records from an infallible line source.
    pub fn transform<I>(&self, lines: I) -> NonTabularRun<'_, impl Iterator<Item = Result<String>>>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        NonTabularRun::new(self, lines.into_iter().map(|line| Ok(line.into())))
    }

    /// Reassembles and maps records from a fallible line source.
    pub fn try_transform<I, E>(
        &self,
        lines: I,
    ) -> NonTabularRun<'_, impl Iterator<Item = Result<String>>>
    where
        I: IntoIterator<Item = std::result::Result<String, E>>,
        E: Into<SourceError>,
    {
        NonTabularRun::new(
            self,
            lines
                .into_iter()
                .map(|line| line.map_err(|err| CoreError::Source(err.into()))),
        )
    }
}

type NumberedLines<S> = std::iter::Map<
    std::iter::Enumerate<S>,
    fn((usize, Result<String>)) -> Result<Line>,
>;

fn number_line((index, text): (usize, Result<String>)) -> Result<Line> {
    text.map(|text| Line::new(text, index))
}

/// One pass of the record-boundary state machine over a line source.
pub struct NonTabularRun<'a, S>
where
    S: Iterator<Item = Result<String>>,
{
    table: &'a NonTabularTable,
    lines: RemovedLines<'a, NumberedLines<S>>,
    in_record: bool,
    current: Option<Record>,
    records: usize,
    removed: usize,
    uncaptured: usize,
    pending: VecDeque<MappedRecord>,
    progress: Progress<'a>,
    started: bool,
    done: bool,
}

impl<'a, S> NonTabularRun<'a, S>
where
    S: Iterator<Item = Result<String>>,
{
    fn new(table: &'a NonTabularTable, source: S) -> Self {
        let numbered: NumberedLines<S> = source.enumerate().map(number_line);
        let in_record = table.row.start_in_a_record;
        Self {
            table,
            lines: RemovedLines::new(numbered, &table.row.remove_lines),
            in_record,
            current: in_record.then(Record::new),
            records: 0,
            removed: 0,
            uncaptured: 0,
            pending: VecDeque::new(),
            progress: Progress::new(),
            started: false,
            done: false,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'a) -> Self {
        self.progress.attach(Box::new(notifier));
        self
    }

    /// Records tabulated so far.
    pub fn records(&self) -> usize {
        self.records
    }

    fn scan(&mut self, line: Line) -> Result<()> {
        let table = self.table;
        let row = &table.row;
        if row.start_line_pattern.is_match(&line.text) {
            if row.end_line_pattern.is_some() && self.in_record {
                return Err(CoreError::RecordBoundary {
                    line: line.absolute_line,
                });
            }
            if let Some(record) = self.current.take() {
                self.emit(record)?;
            }
            let mut record = Record::new();
            if row.capture_start_line {
                record.push(line);
            }
            self.current = Some(record);
            self.in_record = true;
        } else if row
            .end_line_pattern
            .as_ref()
            .is_some_and(|end| end.is_match(&line.text))
        {
            if self.in_record {
                let mut record = self.current.take().unwrap_or_default();
                if row.capture_end_line {
                    record.push(line);
                }
                self.emit(record)?;
            } else {
                self.uncaptured += 1;
            }
            self.in_record = false;
        } else if self.in_record {
            self.current.get_or_insert_with(Record::new).push(line);
        } else {
            self.uncaptured += 1;
        }
        Ok(())
    }

    fn emit(&mut self, mut record: Record) -> Result<()> {
        let table = self.table;
        let cells = record.tabulate(&table.definition().columns);
        self.uncaptured += record.uncaptured();
        let index = self.records;
        self.records += 1;
        trace!(index, lines = record.len(), "record tabulated");
        let mapped = table.table.transform_line(&cells, index)?;
        self.pending.extend(mapped);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.done = true;
        if let Some(record) = self.current.take() {
            if self.table.row.end_in_a_record {
                self.emit(record)?;
            } else {
                self.uncaptured += record.discard().len();
            }
        }
        self.in_record = false;
        trace!(
            uncaptured = self.uncaptured,
            removed = self.removed,
            "lines outside any captured field"
        );
        debug!(records = self.records, "non-tabular run finished");
        Ok(())
    }

    fn fail(&mut self, err: CoreError) -> Option<Result<MappedRecord>> {
        self.done = true;
        self.pending.clear();
        self.progress.abandon();
        self.current = None;
        Some(Err(err))
    }
}

impl<S> Iterator for NonTabularRun<'_, S>
where
    S: Iterator<Item = Result<String>>,
{
    type Item = Result<MappedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                self.progress.record();
                return Some(Ok(record));
            }
            if self.done {
                self.progress.finish();
                return None;
            }
            if !self.started {
                self.started = true;
                self.progress.start();
                debug!(table = %self.table.definition().display_name(), "non-tabular run started");
            }
            match self.lines.next() {
                None => {
                    if let Err(err) = self.finish() {
                        return self.fail(err);
                    }
                }
                Some(Err(err)) => return self.fail(err),
                Some(Ok(line)) if line.removed => self.removed += 1,
                Some(Ok(line)) => {
                    if let Err(err) = self.scan(line) {
                        return self.fail(err);
                    }
                }
            }
        }
    }
}

impl<S> FusedIterator for NonTabularRun<'_, S> where S: Iterator<Item = Result<String>> {}

impl<S> std::fmt::Debug for NonTabularRun<'_, S>
where
    S: Iterator<Item = Result<String>>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonTabularRun")
            .field("in_record", &self.in_record)
            .field("records", &self.records)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use recmap_model::StandardMappings;

    use super::*;

    fn table(yaml: &str) -> NonTabularTable {
        NonTabularTable::new(
            TableDefinition::from_yaml_str_with(yaml, &StandardMappings::new()).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn end_pattern_closes_records() {
        let t = table(
            r#"
klass: Report
non_tabular_row:
  start_line_pattern: '^START$'
  end_line_pattern: '^END$'
columns:
  - column: body
    non_tabular_cell: { lines: '0..-1', capture: '(.*)', join: ' ' }
"#,
        );
        let out: Vec<_> = t
            .transform(["noise", "START", "a", "b", "END", "noise", "START", "c", "END"])
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].attributes.rawtext["body"], "a b");
        assert_eq!(out[1].attributes.rawtext["body"], "c");
        assert_eq!(out[1].index, 1);
    }

    #[test]
    fn start_before_end_is_fatal() {
        let t = table(
            r#"
klass: Report
non_tabular_row:
  start_line_pattern: '^START$'
  end_line_pattern: '^END$'
columns:
  - column: body
    non_tabular_cell: { lines: 0, capture: '(.*)' }
"#,
        );
        let mut run = t.transform(["START", "a", "START", "b", "END"]);
        let err = run.next().unwrap().unwrap_err();
        assert!(matches!(err, CoreError::RecordBoundary { line: 2 }));
        assert!(run.next().is_none());
    }

    #[test]
    fn captured_boundary_lines_join_the_record() {
        let t = table(
            r#"
klass: Report
non_tabular_row:
  start_line_pattern: '^START (\d+)$'
  end_line_pattern: '^END$'
  capture_start_line: true
  capture_end_line: true
columns:
  - column: id
    non_tabular_cell: { lines: 0, capture: '^START (\d+)$' }
  - column: last
    non_tabular_cell: { lines: -1, capture: '(.*)' }
"#,
        );
        let out: Vec<_> = t
            .transform(["START 7", "x", "END"])
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(out[0].attributes.rawtext["id"], "7");
        assert_eq!(out[0].attributes.rawtext["last"], "END");
    }

    #[test]
    fn wrong_layout_is_rejected() {
        let definition =
            TableDefinition::from_yaml_str_with("{ klass: K }", &StandardMappings::new()).unwrap();
        assert!(matches!(
            NonTabularTable::new(definition),
            Err(CoreError::WrongLayout { actual: "tabular", .. })
        ));
    }
}
