//! Wrapped source lines and page-furniture removal.

use std::collections::VecDeque;

use recmap_model::RemoveLines;

use crate::error::Result;

/// One raw text line plus its bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    /// 0-based position in the source stream.
    pub absolute_line: usize,
    /// Position within the owning record, once appended.
    pub record_line: Option<usize>,
    pub in_a_record: bool,
    /// Part of a `remove_lines` sequence; never joins a record.
    pub removed: bool,
    /// Read by at least one column when its record was tabulated.
    pub captured: bool,
}

impl Line {
    pub fn new(text: impl Into<String>, absolute_line: usize) -> Self {
        Self {
            text: text.into(),
            absolute_line,
            record_line: None,
            in_a_record: false,
            removed: false,
            captured: false,
        }
    }
}

/// Flags every line that starts a window matching a `remove_lines` sequence.
///
/// Holds at most as many lines as the longest sequence.
pub(crate) struct RemovedLines<'a, I> {
    inner: I,
    sequences: &'a [RemoveLines],
    window: VecDeque<Line>,
    lookahead: usize,
    exhausted: bool,
}

impl<'a, I> RemovedLines<'a, I>
where
    I: Iterator<Item = Result<Line>>,
{
    pub(crate) fn new(inner: I, sequences: &'a [RemoveLines]) -> Self {
        let lookahead = sequences
            .iter()
            .map(|sequence| sequence.patterns.len())
            .max()
            .unwrap_or(0)
            .max(1);
        Self {
            inner,
            sequences,
            window: VecDeque::with_capacity(lookahead),
            lookahead,
            exhausted: false,
        }
    }

    fn flag_window(&mut self) {
        for sequence in self.sequences {
            let len = sequence.patterns.len();
            if self.window.len() < len {
                continue;
            }
            let matched = sequence
                .patterns
                .iter()
                .zip(&self.window)
                .all(|(pattern, line)| pattern.matches(&line.text));
            if matched {
                tracing::trace!(
                    sequence = %sequence.name,
                    line = self.window[0].absolute_line,
                    "lines removed"
                );
                for line in self.window.iter_mut().take(len) {
                    line.removed = true;
                }
                return;
            }
        }
    }
}

impl<I> Iterator for RemovedLines<'_, I>
where
    I: Iterator<Item = Result<Line>>,
{
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted && self.window.len() < self.lookahead {
            match self.inner.next() {
                Some(Ok(line)) => self.window.push_back(line),
                Some(Err(err)) => return Some(Err(err)),
                None => self.exhausted = true,
            }
        }
        if self.window.front().is_some_and(|line| !line.removed) {
            self.flag_window();
        }
        self.window.pop_front().map(Ok)
    }
}
