//! Streaming XML record source.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use recmap_model::XmlElement;
use tracing::debug;

use crate::error::{IngestError, Result};

/// Where record elements sit in a document.
///
/// `a/b/c` (leading `/` optional) matches only at that absolute path;
/// `//b/c` matches a `c` inside a `b` at any depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPath {
    Absolute(Vec<String>),
    Descendant(Vec<String>),
}

impl RecordPath {
    pub fn parse(xpath: &str) -> Result<Self> {
        let (descendant, rest) = match xpath.strip_prefix("//") {
            Some(rest) => (true, rest),
            None => (false, xpath.trim_start_matches('/')),
        };
        let steps: Vec<String> = rest.split('/').map(str::to_string).collect();
        if steps.iter().any(|step| step.is_empty() || step.contains(['[', '@', '*'])) {
            return Err(IngestError::InvalidRecordPath {
                xpath: xpath.to_string(),
            });
        }
        Ok(if descendant {
            Self::Descendant(steps)
        } else {
            Self::Absolute(steps)
        })
    }

    pub fn matches(&self, stack: &[String]) -> bool {
        match self {
            Self::Absolute(steps) => stack == steps.as_slice(),
            Self::Descendant(steps) => stack.ends_with(steps),
        }
    }
}

/// Yields every element at the record path as an owned tree.
///
/// Only one record is held in memory at a time. Records never nest: the
/// reader resumes scanning after a record's end tag.
pub struct XmlRecords<R> {
    reader: Reader<R>,
    path: RecordPath,
    stack: Vec<String>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> XmlRecords<R> {
    pub fn new(reader: R, path: RecordPath) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            path,
            stack: Vec::new(),
            buf: Vec::new(),
            done: false,
        }
    }

    fn next_record(&mut self) -> Result<Option<XmlElement>> {
        loop {
            self.buf.clear();
            let mut element = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => {
                    self.stack.push(element_name(&start));
                    if !self.path.matches(&self.stack) {
                        continue;
                    }
                    XmlElement::from_start(&start)?
                }
                Event::Empty(start) => {
                    self.stack.push(element_name(&start));
                    let matched = self.path.matches(&self.stack);
                    self.stack.pop();
                    if matched {
                        return Ok(Some(XmlElement::from_start(&start)?));
                    }
                    continue;
                }
                Event::End(_) => {
                    self.stack.pop();
                    continue;
                }
                Event::Eof => return Ok(None),
                _ => continue,
            };
            // read_children consumes the record's end tag.
            self.stack.pop();
            element.read_children(&mut self.reader, &mut self.buf)?;
            return Ok(Some(element));
        }
    }
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

impl<R: BufRead> Iterator for XmlRecords<R> {
    type Item = Result<XmlElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Opens an XML document as a record source.
pub fn open_xml(path: &Path, record_xpath: &str) -> Result<XmlRecords<BufReader<File>>> {
    let record_path = RecordPath::parse(record_xpath)?;
    let file = File::open(path).map_err(|err| IngestError::open(path, err))?;
    debug!(path = %path.display(), record_xpath, "opened xml source");
    Ok(XmlRecords::new(BufReader::new(file), record_path))
}
