//! XML record mapping with repeating-section augmentation.
//!
//! Each record element is checked against the declared column xpaths. Leaves
//! that only differ from a declared path by position predicates get a
//! synthesized column (see [`augment_column`]); anything left over ends the
//! run with [`CoreError::UnmappedXpath`]. Augmented columns and klass masks
//! are rebuilt for every element.

mod augment;
mod xpath;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::iter::FusedIterator;

use recmap_map::Mapper;
use recmap_model::{ColumnMapping, Layout, TableDefinition, Value, XmlElement};
use tracing::{debug, trace};

pub use augment::augment_column;
pub use xpath::{
    column_xpath, container_count, mappable_xpaths, predicate_tokens, resolve_cell,
    strip_predicates,
};

use crate::error::{CoreError, Result, SourceError};
use crate::mask::{MaskedMapping, masked_mappings};
use crate::notify::{Notifier, Progress};
use crate::record::MappedRecord;
use crate::table::Table;

/// An XML mapping ready to run.
#[derive(Debug, Clone)]
pub struct XmlTable {
    table: Table,
    record_xpath: String,
    /// Declared column xpaths, plus the element paths of attribute columns.
    known: BTreeSet<String>,
    /// Declared column xpath to column position.
    templates: BTreeMap<String, usize>,
}

impl XmlTable {
    pub fn new(definition: TableDefinition) -> Result<Self> {
        let Layout::Xml { record_xpath } = &definition.layout else {
            return Err(CoreError::WrongLayout {
                expected: "xml",
                actual: definition.layout.name(),
            });
        };
        let record_xpath = record_xpath.clone();
        let mut known = BTreeSet::new();
        let mut templates = BTreeMap::new();
        for (position, column) in definition.columns.iter().enumerate() {
            let xpath = column_xpath(column);
            if column.xml_cell.as_ref().is_some_and(|cell| cell.attribute.is_some()) {
                let (element, _) = xpath::split_attribute(&xpath);
                known.insert(element.to_string());
            }
            known.insert(xpath.clone());
            templates.entry(xpath).or_insert(position);
        }
        Ok(Self {
            table: Table::new(definition),
            record_xpath,
            known,
            templates,
        })
    }

    pub fn with_mapper(mut self, mapper: Mapper) -> Self {
        self.table = self.table.with_mapper(mapper);
        self
    }

    pub fn definition(&self) -> &TableDefinition {
        self.table.definition()
    }

    /// Path of the record elements within the source document.
    pub fn record_xpath(&self) -> &str {
        &self.record_xpath
    }

    /// Maps record elements from an infallible source.
    pub fn transform<I>(&self, elements: I) -> XmlRun<'_, impl Iterator<Item = Result<XmlElement>>>
    where
        I: IntoIterator<Item = XmlElement>,
    {
        XmlRun::new(self, elements.into_iter().map(Ok))
    }

    /// Maps record elements from a fallible source. A source error ends the
    /// run.
    pub fn try_transform<I, E>(
        &self,
        elements: I,
    ) -> XmlRun<'_, impl Iterator<Item = Result<XmlElement>>>
    where
        I: IntoIterator<Item = std::result::Result<XmlElement, E>>,
        E: Into<SourceError>,
    {
        XmlRun::new(
            self,
            elements
                .into_iter()
                .map(|element| element.map_err(|err| CoreError::Source(err.into()))),
        )
    }

    /// Augments, masks and maps a single record element.
    pub fn transform_element(&self, element: &XmlElement, index: usize) -> Result<Vec<MappedRecord>> {
        let columns = self.augmented_columns(element, index)?;
        let row: Vec<Value> = columns
            .iter()
            .map(|column| {
                if column.do_not_capture {
                    Value::Null
                } else {
                    resolve_cell(element, &column_xpath(column))
                }
            })
            .collect();
        let masked = element_masks(&columns, self.definition().klass.as_deref());
        self.table.records_for(&row, &masked, index)
    }

    /// The declared columns plus one synthesized column per repeated
    /// instance. Templates that were expanded become placeholders.
    pub fn augmented_columns(&self, element: &XmlElement, index: usize) -> Result<Vec<ColumnMapping>> {
        let declared = &self.definition().columns;
        let mut columns = declared.clone();
        let mut expanded = BTreeSet::new();
        let mut unmapped = Vec::new();

        for xpath in mappable_xpaths(element) {
            if self.known.contains(&xpath) {
                continue;
            }
            let stripped = strip_predicates(&xpath);
            if let Some(&position) = self.templates.get(&stripped) {
                let template = &declared[position];
                if template.do_not_capture {
                    continue;
                }
                let new_record = self.needs_new_record(template, element, &xpath);
                trace!(xpath = %xpath, template = %stripped, new_record, "column augmented");
                columns.push(augment_column(template, &xpath, new_record));
                expanded.insert(position);
            } else if !self.known.contains(&stripped) {
                unmapped.push(xpath);
            }
        }
        if !unmapped.is_empty() {
            return Err(CoreError::UnmappedXpath {
                index,
                xpaths: unmapped,
            });
        }
        for position in expanded {
            columns[position] = ColumnMapping::placeholder();
        }
        Ok(columns)
    }

    fn needs_new_record(&self, template: &ColumnMapping, element: &XmlElement, xpath: &str) -> bool {
        self.definition().klass.is_none()
            && template
                .xml_cell
                .as_ref()
                .and_then(|cell| cell.build_new_record)
                != Some(false)
            && container_count(element, xpath) > 1
    }
}

/// Klass masks for one element's columns.
///
/// A base klass is dropped when a numbered variant (`Klass#n`) exists,
/// unless one of its columns is flagged `keep_klass`.
pub fn element_masks(columns: &[ColumnMapping], table_klass: Option<&str>) -> Vec<MaskedMapping> {
    let mut masks = masked_mappings(columns, table_klass);
    if table_klass.is_some() {
        return masks;
    }
    let names: Vec<String> = masks.iter().map(|(klass, _)| klass.clone()).collect();
    masks.retain(|(klass, masked)| {
        let numbered = names.iter().any(|name| {
            name.strip_prefix(klass.as_str())
                .is_some_and(|rest| rest.starts_with('#'))
        });
        !numbered || masked.iter().any(ColumnMapping::keep_klass)
    });
    masks
}

/// One pass over a stream of record elements.
pub struct XmlRun<'a, S> {
    table: &'a XmlTable,
    elements: S,
    element_index: usize,
    pending: VecDeque<MappedRecord>,
    progress: Progress<'a>,
    done: bool,
}

impl<'a, S> XmlRun<'a, S>
where
    S: Iterator<Item = Result<XmlElement>>,
{
    fn new(table: &'a XmlTable, elements: S) -> Self {
        Self {
            table,
            elements,
            element_index: 0,
            pending: VecDeque::new(),
            progress: Progress::new(),
            done: false,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'a) -> Self {
        self.progress.attach(Box::new(notifier));
        self
    }

    /// Elements consumed so far.
    pub fn element_index(&self) -> usize {
        self.element_index
    }

    fn fail(&mut self, err: CoreError) -> Option<Result<MappedRecord>> {
        self.done = true;
        self.pending.clear();
        self.progress.abandon();
        Some(Err(err))
    }
}

impl<S> Iterator for XmlRun<'_, S>
where
    S: Iterator<Item = Result<XmlElement>>,
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
            if self.element_index == 0 {
                self.progress.start();
                debug!(
                    table = %self.table.definition().display_name(),
                    record_xpath = %self.table.record_xpath,
                    "xml run started"
                );
            }
            let element = match self.elements.next() {
                None => {
                    self.done = true;
                    self.progress.finish();
                    debug!(elements = self.element_index, "xml run finished");
                    return None;
                }
                Some(Err(err)) => return self.fail(err),
                Some(Ok(element)) => element,
            };
            let index = self.element_index;
            self.element_index += 1;
            match self.table.transform_element(&element, index) {
                Ok(records) => self.pending.extend(records),
                Err(err) => return self.fail(err),
            }
        }
    }
}

impl<S> FusedIterator for XmlRun<'_, S> where S: Iterator<Item = Result<XmlElement>> {}

impl<S> std::fmt::Debug for XmlRun<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlRun")
            .field("element_index", &self.element_index)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use recmap_model::StandardMappings;

    use super::*;

    fn table(yaml: &str) -> XmlTable {
        XmlTable::new(TableDefinition::from_yaml_str_with(yaml, &StandardMappings::new()).unwrap())
            .unwrap()
    }

    const TREATMENTS: &str = r#"
xml_record_xpath: Records/Record
columns:
  - column: Name
    klass: Patient
    mappings: [{ field: name }]
  - column: Code
    klass: Treatment
    xml_cell: { relative_path: Treatment, multiple: true }
    mappings: [{ field: code }]
  - column: Date
    klass: Treatment
    xml_cell: { relative_path: Treatment, multiple: true }
    mappings: [{ field: date }]
"#;

    fn record(xml: &str) -> XmlElement {
        XmlElement::parse_str(xml).unwrap()
    }

    #[test]
    fn repeated_sections_become_numbered_records() {
        let t = table(TREATMENTS);
        let element = record(
            "<Record><Name>Ann</Name>\
             <Treatment><Code>A</Code><Date>2020-01-01</Date></Treatment>\
             <Treatment><Code>B</Code></Treatment></Record>",
        );
        let out = t.transform_element(&element, 0).unwrap();
        let klasses: Vec<&str> = out.iter().map(|r| r.klass.as_str()).collect();
        assert_eq!(klasses, vec!["Patient", "Treatment#1", "Treatment#2"]);
        assert_eq!(out[1].attributes.get("code"), Some(&Value::from("A")));
        assert_eq!(out[1].attributes.get("date"), Some(&Value::from("2020-01-01")));
        assert_eq!(out[2].attributes.get("code"), Some(&Value::from("B")));
        assert_eq!(out[2].attributes.get("date"), None);
        assert_eq!(out[2].attributes.rawtext.get("code_2").map(String::as_str), Some("B"));
    }

    #[test]
    fn single_section_uses_declared_columns() {
        let t = table(TREATMENTS);
        let element = record("<Record><Name>Ann</Name><Treatment><Code>A</Code></Treatment></Record>");
        let out = t.transform_element(&element, 4).unwrap();
        let klasses: Vec<&str> = out.iter().map(|r| r.klass.as_str()).collect();
        assert_eq!(klasses, vec!["Patient", "Treatment"]);
        assert_eq!(out[1].attributes.rawtext["code"], "A");
        assert_eq!(out[1].index, 4);
    }

    #[test]
    fn augmentation_is_fresh_per_element() {
        let t = table(TREATMENTS);
        let two = record(
            "<Record><Treatment><Code>A</Code></Treatment><Treatment><Code>B</Code></Treatment></Record>",
        );
        let one = record("<Record><Treatment><Code>C</Code></Treatment></Record>");
        assert_eq!(t.augmented_columns(&two, 0).unwrap().len(), 5);
        assert_eq!(t.augmented_columns(&one, 1).unwrap().len(), 3);
        assert_eq!(t.augmented_columns(&two, 2).unwrap().len(), 5);
    }

    #[test]
    fn unknown_leaves_are_fatal() {
        let t = table(TREATMENTS);
        let element = record("<Record><Name>Ann</Name><Shoe size=\"9\"/></Record>");
        let err = t.transform_element(&element, 3).unwrap_err();
        assert_eq!(err.to_string(), "unmapped xpaths in record 3: Shoe/@size, Shoe");
    }

    #[test]
    fn table_klass_keeps_one_record() {
        let t = table(
            r#"
klass: Course
xml_record_xpath: Record
columns:
  - column: Code
    xml_cell: { relative_path: Treatment, multiple: true, increment_field_name: true }
    mappings: [{ field: code }]
"#,
        );
        let element = record(
            "<Record><Treatment><Code>A</Code></Treatment><Treatment><Code>B</Code></Treatment></Record>",
        );
        let out = t.transform_element(&element, 0).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].klass, "Course");
        assert_eq!(out[0].attributes.get("code_1"), Some(&Value::from("A")));
        assert_eq!(out[0].attributes.get("code_2"), Some(&Value::from("B")));
    }

    #[test]
    fn keep_klass_retains_the_base_record() {
        let t = table(
            r#"
xml_record_xpath: Record
columns:
  - column: Ward
    klass: Stay
    xml_cell: { keep_klass: true }
    mappings: [{ field: ward }]
  - column: Code
    klass: Stay
    xml_cell: { relative_path: Treatment, multiple: true }
    mappings: [{ field: code }]
"#,
        );
        let element = record(
            "<Record><Ward>W1</Ward>\
             <Treatment><Code>A</Code></Treatment><Treatment><Code>B</Code></Treatment></Record>",
        );
        let klasses: Vec<String> = t
            .transform_element(&element, 0)
            .unwrap()
            .into_iter()
            .map(|r| r.klass)
            .collect();
        assert_eq!(klasses, vec!["Stay", "Stay#1", "Stay#2"]);
    }

    #[test]
    fn run_uses_element_ordinals() {
        let t = table(TREATMENTS);
        let elements = vec![
            record("<Record><Name>Ann</Name></Record>"),
            record("<Record><Name>Bob</Name></Record>"),
        ];
        let out: Vec<_> = t
            .transform(elements)
            .map(|r| r.unwrap())
            .filter(|r| r.klass == "Patient")
            .collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].index, 1);
        assert_eq!(out[1].attributes.get("name"), Some(&Value::from("Bob")));
    }
}
