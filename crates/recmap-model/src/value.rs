//! Cell values flowing through the mapping pipeline.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// A raw or transformed cell value.
///
/// Sources produce `Text` (or `Null` for absent cells); transforms may turn
/// values into dates or integers. `List` appears when a source cell carries
/// several values at once, e.g. an array field in a keyed row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    List(Vec<Value>),
}

impl Value {
    /// True for null, whitespace-only text, and lists with no present member.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::List(items) => items.iter().all(Value::is_blank),
            Self::Integer(_) | Self::Date(_) | Self::DateTime(_) => false,
        }
    }

    pub fn is_present(&self) -> bool {
        !self.is_blank()
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Renders the value the way it is stored in a rawtext snapshot.
    pub fn to_raw_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::Integer(number) => write!(f, "{number}"),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%dT%H:%M:%S")),
            Self::List(items) => {
                for (position, item) in items.iter().enumerate() {
                    if position > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Integer(number) => serializer.serialize_i64(*number),
            Self::Date(_) | Self::DateTime(_) => serializer.collect_str(self),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Converts a YAML scalar into a cell value.
///
/// Returns `None` for mappings and sequences.
pub(crate) fn from_yaml_scalar(value: &serde_yaml::Value) -> Option<Value> {
    match value {
        serde_yaml::Value::Null => Some(Value::Null),
        serde_yaml::Value::Bool(flag) => Some(Value::Text(flag.to_string())),
        serde_yaml::Value::Number(number) => Some(
            number
                .as_i64()
                .map_or_else(|| Value::Text(number.to_string()), Value::Integer),
        ),
        serde_yaml::Value::String(text) => Some(Value::Text(text.clone())),
        serde_yaml::Value::Tagged(tagged) => from_yaml_scalar(&tagged.value),
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => None,
    }
}

/// Renders a YAML scalar as a string key.
pub(crate) fn yaml_scalar_string(value: &serde_yaml::Value) -> Option<String> {
    from_yaml_scalar(value).map(|value| value.to_raw_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("  ").is_blank());
        assert!(Value::List(vec![Value::Null, Value::from("")]).is_blank());
        assert!(Value::from("x").is_present());
        assert!(Value::Integer(0).is_present());
    }

    #[test]
    fn display_formats_dates_and_lists() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-02-29");
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(list.to_string(), "a,b");
        assert_eq!(Value::Null.to_raw_string(), "");
    }

    #[test]
    fn serializes_as_plain_json() {
        let date = NaiveDate::from_ymd_opt(2001, 1, 31).unwrap();
        let values = vec![
            Value::Null,
            Value::from("x"),
            Value::Integer(4),
            Value::Date(date),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,"x",4,"2001-01-31"]"#);
    }
}
