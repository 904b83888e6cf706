//! Options for reassembling records from free-text line streams.

use std::ops::Range;

use regex::Regex;
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::mapping::OneOrMany;
use crate::pattern::{Pattern, parse_regex};
use crate::value::yaml_scalar_string;

/// Record-boundary rules for a non-tabular table.
#[derive(Debug, Clone)]
pub struct NonTabularRow {
    pub start_line_pattern: Regex,
    pub end_line_pattern: Option<Regex>,
    pub start_in_a_record: bool,
    pub end_in_a_record: bool,
    pub capture_start_line: bool,
    pub capture_end_line: bool,
    /// Named line sequences (page headers, footers) removed before scanning.
    pub remove_lines: Vec<RemoveLines>,
}

/// A contiguous run of lines to suppress wherever it occurs.
#[derive(Debug, Clone)]
pub struct RemoveLines {
    pub name: String,
    pub patterns: Vec<Pattern>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawNonTabularRow {
    start_line_pattern: Option<String>,
    end_line_pattern: Option<String>,
    #[serde(default)]
    start_in_a_record: bool,
    #[serde(default)]
    end_in_a_record: bool,
    #[serde(default)]
    capture_start_line: bool,
    #[serde(default)]
    capture_end_line: bool,
    #[serde(default)]
    remove_lines: serde_yaml::Mapping,
}

impl TryFrom<RawNonTabularRow> for NonTabularRow {
    type Error = ConfigError;

    fn try_from(raw: RawNonTabularRow) -> Result<Self> {
        let start = raw
            .start_line_pattern
            .ok_or(ConfigError::MissingStartLinePattern)?;
        let mut remove_lines = Vec::with_capacity(raw.remove_lines.len());
        for (name, lines) in &raw.remove_lines {
            let name = yaml_scalar_string(name).unwrap_or_default();
            let lines: OneOrMany<String> = serde_yaml::from_value(lines.clone())?;
            let patterns = lines
                .into_vec()
                .iter()
                .map(|line| Pattern::parse(line))
                .collect::<Result<Vec<_>>>()?;
            if !patterns.is_empty() {
                remove_lines.push(RemoveLines { name, patterns });
            }
        }
        Ok(Self {
            start_line_pattern: parse_regex(&start)?,
            end_line_pattern: raw.end_line_pattern.as_deref().map(parse_regex).transpose()?,
            start_in_a_record: raw.start_in_a_record,
            end_in_a_record: raw.end_in_a_record,
            capture_start_line: raw.capture_start_line,
            capture_end_line: raw.capture_end_line,
            remove_lines,
        })
    }
}

/// How one column is captured from a reassembled record.
#[derive(Debug, Clone)]
pub struct NonTabularCell {
    pub lines: LineSelector,
    /// Applied in sequence; each step keeps the first capture group.
    pub capture: Vec<Regex>,
    pub join: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawNonTabularCell {
    lines: Option<serde_yaml::Value>,
    capture: Option<OneOrMany<String>>,
    join: Option<String>,
}

impl NonTabularCell {
    pub(crate) fn from_raw(raw: RawNonTabularCell, column: &str) -> Result<Self> {
        let lines = raw.lines.ok_or_else(|| ConfigError::MissingLines {
            column: column.to_string(),
        })?;
        let capture = raw
            .capture
            .ok_or_else(|| ConfigError::MissingCapture {
                column: column.to_string(),
            })?
            .into_vec()
            .iter()
            .map(|pattern| parse_regex(pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            lines: LineSelector::from_yaml(&lines, column)?,
            capture,
            join: raw.join.unwrap_or_else(|| "\n".to_string()),
        })
    }
}

/// Which lines of a record a column reads.
#[derive(Debug, Clone)]
pub enum LineSelector {
    /// One line; negative indices count from the end.
    Index(isize),
    /// A fixed range of lines; negative bounds count from the end.
    Range {
        start: isize,
        end: isize,
        exclusive: bool,
    },
    /// From the first line matching `start` to the next line matching `end`
    /// (or the last line when `end` is absent or never matches).
    Between {
        start: Regex,
        end: Option<Regex>,
        exclusive: bool,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBetween {
    #[serde(rename = "in")]
    bounds: OneOrMany<String>,
    #[serde(default)]
    exclusive: bool,
}

impl LineSelector {
    fn from_yaml(value: &serde_yaml::Value, column: &str) -> Result<Self> {
        let invalid = || ConfigError::InvalidLineSelector {
            column: column.to_string(),
            value: format!("{value:?}"),
        };
        match value {
            serde_yaml::Value::Number(number) => number
                .as_i64()
                .and_then(|index| isize::try_from(index).ok())
                .map(Self::Index)
                .ok_or_else(invalid),
            serde_yaml::Value::String(text) => Self::parse_range(text).ok_or_else(invalid),
            serde_yaml::Value::Mapping(_) => {
                let raw: RawBetween = serde_yaml::from_value(value.clone())?;
                let mut bounds = raw.bounds.into_vec().into_iter();
                let start = bounds.next().ok_or_else(invalid)?;
                Ok(Self::Between {
                    start: parse_regex(&start)?,
                    end: bounds.next().as_deref().map(parse_regex).transpose()?,
                    exclusive: raw.exclusive,
                })
            }
            _ => Err(invalid()),
        }
    }

    /// Parses `"3"`, `"1..4"` (inclusive) or `"1...4"` (exclusive).
    fn parse_range(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some((start, end)) = text.split_once("...") {
            return Some(Self::Range {
                start: start.trim().parse().ok()?,
                end: end.trim().parse().ok()?,
                exclusive: true,
            });
        }
        if let Some((start, end)) = text.split_once("..") {
            return Some(Self::Range {
                start: start.trim().parse().ok()?,
                end: end.trim().parse().ok()?,
                exclusive: false,
            });
        }
        text.parse().ok().map(Self::Index)
    }

    /// Resolves the selector against a record's lines.
    ///
    /// Out-of-range selections yield an empty range rather than an error.
    pub fn select(&self, lines: &[&str]) -> Range<usize> {
        let len = lines.len();
        match self {
            Self::Index(index) => match absolute(*index, len) {
                Some(position) if position < len => position..position + 1,
                _ => 0..0,
            },
            Self::Range {
                start,
                end,
                exclusive,
            } => {
                let Some(start) = absolute(*start, len) else {
                    return 0..0;
                };
                let Some(end) = absolute(*end, len) else {
                    return 0..0;
                };
                let end = if *exclusive { end } else { end + 1 }.min(len);
                if start >= end { 0..0 } else { start..end }
            }
            Self::Between {
                start,
                end,
                exclusive,
            } => {
                let Some(first) = lines.iter().position(|line| start.is_match(line)) else {
                    return 0..0;
                };
                let last = end.as_ref().and_then(|end| {
                    lines[first + 1..]
                        .iter()
                        .position(|line| end.is_match(line))
                        .map(|offset| first + 1 + offset)
                });
                match last {
                    Some(last) if *exclusive => first..last,
                    Some(last) => first..last + 1,
                    None => first..len,
                }
            }
        }
    }
}

fn absolute(index: isize, len: usize) -> Option<usize> {
    if index >= 0 {
        usize::try_from(index).ok()
    } else {
        len.checked_sub(index.unsigned_abs())
    }
}
