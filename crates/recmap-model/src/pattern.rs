//! Literal-or-regex patterns used by column names, replace rules and line rules.

use std::borrow::Cow;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::{ConfigError, Result};

/// A configured string that is either matched literally or, when written as
/// `/source/flags`, compiled as a regular expression.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    /// Parses a configured pattern. Supported regex flags: `i`, `m`, `x`.
    pub fn parse(raw: &str) -> Result<Self> {
        match split_delimited(raw) {
            Some((source, flags)) => build_regex(source, flags, raw).map(Self::Regex),
            None => Ok(Self::Literal(raw.to_string())),
        }
    }

    /// Whole-value match: equality for literals, `is_match` for regexes.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == text,
            Self::Regex(regex) => regex.is_match(text),
        }
    }

    /// Case-insensitive whole-value match, used for header cells. A regex
    /// is tried on the text as given, then lower-cased.
    pub fn matches_ignore_case(&self, text: &str) -> bool {
        match self {
            Self::Literal(literal) => literal.to_lowercase() == text.to_lowercase(),
            Self::Regex(regex) => regex.is_match(text) || regex.is_match(&text.to_lowercase()),
        }
    }

    /// Replaces every occurrence of the pattern in `text`.
    pub fn replace_all<'t>(&self, text: &'t str, replacement: &str) -> Cow<'t, str> {
        match self {
            Self::Literal(literal) if literal.is_empty() => Cow::Borrowed(text),
            Self::Literal(literal) => {
                if text.contains(literal.as_str()) {
                    Cow::Owned(text.replace(literal.as_str(), replacement))
                } else {
                    Cow::Borrowed(text)
                }
            }
            Self::Regex(regex) => regex.replace_all(text, replacement),
        }
    }

    /// The configured text of a literal, or the regex source.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(literal) => literal,
            Self::Regex(regex) => regex.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Regex(_))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => f.write_str(literal),
            Self::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Compiles a rule that is always a regex; `/` delimiters are optional.
pub fn parse_regex(raw: &str) -> Result<Regex> {
    match split_delimited(raw) {
        Some((source, flags)) => build_regex(source, flags, raw),
        None => build_regex(raw, "", raw),
    }
}

fn split_delimited(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix('/')?;
    let close = rest.rfind('/')?;
    let flags = &rest[close + 1..];
    if flags.chars().all(|flag| matches!(flag, 'i' | 'm' | 'x')) {
        Some((&rest[..close], flags))
    } else {
        None
    }
}

fn build_regex(source: &str, flags: &str, raw: &str) -> Result<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            pattern: raw.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_regex_parsing() {
        assert!(matches!(Pattern::parse("surname").unwrap(), Pattern::Literal(_)));
        assert!(Pattern::parse("/^sur/i").unwrap().is_regex());
        // A lone slash path is not a regex.
        assert!(!Pattern::parse("/usr/local").unwrap().is_regex());
    }

    #[test]
    fn regex_flags_apply() {
        let pattern = Pattern::parse("/^page \\d+$/i").unwrap();
        assert!(pattern.matches("PAGE 12"));
        assert!(!pattern.matches("page twelve"));
    }

    #[test]
    fn header_matching_keeps_regex_case() {
        let upper = Pattern::parse("/^NHS/").unwrap();
        assert!(upper.matches_ignore_case("NHS No"));
        let lower = Pattern::parse("/^nhs/").unwrap();
        assert!(lower.matches_ignore_case("NHS No"));
        assert!(Pattern::parse("Surname").unwrap().matches_ignore_case("SURNAME"));
    }

    #[test]
    fn literal_replace_is_substring() {
        let pattern = Pattern::parse(".").unwrap();
        assert_eq!(pattern.replace_all("C50.9", ""), "C509");
    }

    #[test]
    fn parse_regex_accepts_bare_source() {
        assert!(parse_regex("^-{6}$").unwrap().is_match("------"));
        assert!(parse_regex("/^end$/i").unwrap().is_match("END"));
        assert!(matches!(
            parse_regex("(unclosed"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
