//! Logical records reassembled from lines.

use recmap_model::{ColumnMapping, NonTabularCell, Value};
use regex::Regex;

use super::line::Line;

/// Lines of one logical record, in source order.
#[derive(Debug, Clone, Default)]
pub struct Record {
    lines: Vec<Line>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line. Removed lines are ignored.
    pub fn push(&mut self, mut line: Line) {
        if line.removed {
            return;
        }
        line.in_a_record = true;
        line.record_line = Some(self.lines.len());
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Releases the lines of a record that is never tabulated.
    pub fn discard(mut self) -> Vec<Line> {
        for line in &mut self.lines {
            line.in_a_record = false;
            line.record_line = None;
        }
        self.lines
    }

    /// Produces one cell per column, ready for the field pipeline.
    ///
    /// Columns without a non-tabular cell (placeholders) read as null.
    pub fn tabulate(&mut self, columns: &[ColumnMapping]) -> Vec<Value> {
        columns
            .iter()
            .map(|column| match &column.non_tabular_cell {
                Some(cell) if !column.do_not_capture => self.capture(cell),
                _ => Value::Null,
            })
            .collect()
    }

    /// Lines that no column read.
    pub fn uncaptured(&self) -> usize {
        self.lines.iter().filter(|line| !line.captured).count()
    }

    fn capture(&mut self, cell: &NonTabularCell) -> Value {
        let range = {
            let texts: Vec<&str> = self.lines.iter().map(|line| line.text.as_str()).collect();
            cell.lines.select(&texts)
        };
        let mut parts = Vec::new();
        for line in &mut self.lines[range] {
            line.captured = true;
            if let Some(part) = capture_chain(&line.text, &cell.capture)
                && !part.trim().is_empty()
            {
                parts.push(part);
            }
        }
        if parts.is_empty() {
            Value::Null
        } else {
            Value::Text(parts.join(&cell.join))
        }
    }
}

/// Applies each regex to the previous step's result, keeping the first
/// capture group (or the whole match when the regex has no groups). A miss
/// at any step yields `None`.
fn capture_chain(text: &str, chain: &[Regex]) -> Option<String> {
    let mut current = text.to_string();
    for regex in chain {
        let caps = regex.captures(&current)?;
        let matched = caps.get(1).or_else(|| caps.get(0))?;
        current = matched.as_str().to_string();
    }
    Some(current)
}
