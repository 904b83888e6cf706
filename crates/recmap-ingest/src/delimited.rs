//! Delimited text rows.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ByteRecordsIntoIter, ReaderBuilder};
use recmap_model::{TableDefinition, Value};
use tracing::debug;

use crate::error::{IngestError, Result};

const BOM: char = '\u{feff}';

/// Streams every row of a delimited file as text cells.
///
/// Header rows are returned like any other row; the transformer decides
/// what they mean. Rows may differ in length, and invalid UTF-8 is replaced
/// rather than rejected.
pub struct DelimitedRows<R> {
    records: ByteRecordsIntoIter<R>,
    first: bool,
}

impl<R: Read> DelimitedRows<R> {
    pub fn new(reader: R, delimiter: u8) -> Self {
        let records = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader)
            .into_byte_records();
        Self {
            records,
            first: true,
        }
    }

    /// Reader configured from a table's `delimiter`.
    pub fn for_definition(reader: R, definition: &TableDefinition) -> Self {
        Self::new(reader, definition.delimiter)
    }

    fn cells(&mut self, record: &ByteRecord) -> Vec<Value> {
        let first = std::mem::take(&mut self.first);
        record
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let text = String::from_utf8_lossy(field);
                if first && i == 0 {
                    Value::Text(text.trim_start_matches(BOM).to_string())
                } else {
                    Value::Text(text.into_owned())
                }
            })
            .collect()
    }
}

impl<R: Read> Iterator for DelimitedRows<R> {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.records.next()? {
            Ok(record) => Some(Ok(self.cells(&record))),
            Err(err) => Some(Err(IngestError::Csv(err))),
        }
    }
}

/// Opens a delimited file for the given table.
pub fn open_delimited(path: &Path, definition: &TableDefinition) -> Result<DelimitedRows<File>> {
    let file = File::open(path).map_err(|err| IngestError::open(path, err))?;
    debug!(
        path = %path.display(),
        delimiter = %char::from(definition.delimiter),
        "opened delimited source"
    );
    Ok(DelimitedRows::for_definition(file, definition))
}
