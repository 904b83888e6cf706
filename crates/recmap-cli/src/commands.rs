use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use recmap_core::{MappedRecord, Notifier, TableTransformer};
use recmap_ingest::{open_delimited, open_lines, open_xml};
use recmap_model::{MappingDocument, StandardMappings, TableDefinition, standard};
use tracing::{debug, info, info_span, warn};

use crate::types::{TableSummary, TransformOptions, TransformSummary};

/// Loads a mapping document, registering standard mappings first when a
/// file is given.
pub fn load_document(mapping: &Path, standard_mappings: Option<&Path>) -> Result<MappingDocument> {
    if let Some(path) = standard_mappings {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("read standard mappings: {}", path.display()))?;
        let registry = StandardMappings::from_yaml_str(&yaml)
            .with_context(|| format!("parse standard mappings: {}", path.display()))?;
        debug!(count = registry.len(), "standard mappings loaded");
        standard::configure(registry).context("register standard mappings")?;
    }
    let yaml = fs::read_to_string(mapping)
        .with_context(|| format!("read mapping: {}", mapping.display()))?;
    MappingDocument::from_yaml_str(&yaml)
        .with_context(|| format!("parse mapping: {}", mapping.display()))
}

/// Summarises every table of a mapping document.
pub fn run_check(mapping: &Path, standard_mappings: Option<&Path>) -> Result<Vec<TableSummary>> {
    let document = load_document(mapping, standard_mappings)?;
    Ok(document.tables().iter().map(summarize).collect())
}

fn summarize(definition: &TableDefinition) -> TableSummary {
    let klasses = match &definition.klass {
        Some(klass) => vec![klass.clone()],
        None => definition.klasses(),
    };
    TableSummary {
        name: definition.display_name(),
        layout: definition.layout.name(),
        klasses,
        columns: definition.columns.len(),
        header_lines: definition.header_lines,
        footer_lines: definition.footer_lines,
    }
}

/// Transforms one input file, writing a JSON line per record to `out`.
pub fn run_transform<W: Write>(options: &TransformOptions, out: &mut W) -> Result<TransformSummary> {
    let document = load_document(&options.mapping, options.standard_mappings.as_deref())?;
    let filename = options.input.to_string_lossy();
    let definition = document
        .find(&filename, options.tablename.as_deref())
        .ok_or_else(|| anyhow!("no table in {} matches {filename}", options.mapping.display()))?
        .clone();
    let name = definition.display_name();
    let span = info_span!("transform", table = %name);
    let _guard = span.enter();
    warn_on_encoding(&definition);

    let started = Instant::now();
    let layout = definition.layout.name();
    let notifier = LogNotifier::new(&name);
    let input = options.input.as_path();
    let records = match TableTransformer::from_definition(definition)? {
        TableTransformer::Tabular(table) => {
            let rows = open_delimited(input, table.definition())?;
            write_records(table.try_transform(rows).with_notifier(notifier), out)?
        }
        TableTransformer::NonTabular(table) => {
            let lines = open_lines(input)?;
            write_records(table.try_transform(lines).with_notifier(notifier), out)?
        }
        TableTransformer::Xml(table) => {
            let elements = open_xml(input, table.record_xpath())?;
            write_records(table.try_transform(elements).with_notifier(notifier), out)?
        }
    };
    out.flush().context("flush output")?;
    info!(
        records,
        elapsed_ms = started.elapsed().as_millis(),
        "transform complete"
    );
    Ok(TransformSummary {
        table: name,
        layout,
        records,
    })
}

/// Writes each record as one JSON line. The first failed record ends the
/// run with its error.
pub fn write_records<I, W>(records: I, out: &mut W) -> Result<usize>
where
    I: Iterator<Item = recmap_core::Result<MappedRecord>>,
    W: Write,
{
    let mut count = 0;
    for record in records {
        let record = record.context("transform failed")?;
        serde_json::to_writer(&mut *out, &record).context("write record")?;
        out.write_all(b"\n").context("write record")?;
        count += 1;
    }
    Ok(count)
}

fn warn_on_encoding(definition: &TableDefinition) {
    if let Some(encoding) = &definition.encoding {
        let normalized = encoding.to_lowercase().replace(['-', '_'], "");
        if !matches!(normalized.as_str(), "utf8" | "bomutf8" | "ascii" | "usascii") {
            warn!(
                encoding = %encoding,
                "source is decoded as UTF-8; invalid sequences are replaced"
            );
        }
    }
}

/// Reports run progress through `tracing`.
struct LogNotifier {
    table: String,
}

impl LogNotifier {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
        }
    }
}

impl Notifier for LogNotifier {
    fn started(&mut self) {
        debug!(table = %self.table, "reading source");
    }

    fn processed(&mut self, count: usize) {
        info!(table = %self.table, records = count, "records processed");
    }

    fn finished(&mut self) {
        debug!(table = %self.table, "source exhausted");
    }
}
