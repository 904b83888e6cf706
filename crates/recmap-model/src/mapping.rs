//! Column and field mapping definitions.
//!
//! Mappings are read from YAML into `Raw*` structs and then converted into
//! validated, immutable types. Rule selection happens once here, so the
//! transformation pipeline only ever matches on closed enums.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::klass::KlassSpec;
use crate::non_tabular::{NonTabularCell, RawNonTabularCell};
use crate::pattern::{Pattern, parse_regex};
use crate::standard::StandardMappings;
use crate::value::{Value, from_yaml_scalar, yaml_scalar_string};

/// Either a single item or a list of items.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

/// How one input column feeds the target records.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    /// Expected column name (header cell, XML element, or keyed-row key).
    pub column: Pattern,
    pub rawtext_name: Option<String>,
    /// Target klasses, flattened and de-duplicated.
    pub klass: Vec<String>,
    pub do_not_capture: bool,
    /// Name of the standard mapping this column was merged with, if any.
    pub standard_mapping: Option<String>,
    pub mappings: Vec<FieldMapping>,
    pub decode: Vec<Decoding>,
    pub xml_cell: Option<XmlCell>,
    pub non_tabular_cell: Option<NonTabularCell>,
}

impl ColumnMapping {
    /// A no-op column that occupies a positional slot and captures nothing.
    pub fn placeholder() -> Self {
        Self {
            column: Pattern::Literal(String::new()),
            rawtext_name: None,
            klass: Vec::new(),
            do_not_capture: true,
            standard_mapping: None,
            mappings: Vec::new(),
            decode: Vec::new(),
            xml_cell: None,
            non_tabular_cell: None,
        }
    }

    /// Parses one column definition, resolving any standard mapping.
    pub fn from_yaml_value(value: serde_yaml::Value, registry: &StandardMappings) -> Result<Self> {
        let serde_yaml::Value::Mapping(raw) = value else {
            return Err(ConfigError::InvalidColumn {
                reason: "expected a mapping".to_string(),
            });
        };
        let merged = registry.resolve(raw)?;
        let raw: RawColumnMapping = serde_yaml::from_value(serde_yaml::Value::Mapping(merged))?;
        Self::try_from(raw)
    }

    /// Parses a YAML list of column definitions.
    pub fn list_from_yaml_str(yaml: &str, registry: &StandardMappings) -> Result<Vec<Self>> {
        let values: Vec<serde_yaml::Value> = serde_yaml::from_str(yaml)?;
        values
            .into_iter()
            .map(|value| Self::from_yaml_value(value, registry))
            .collect()
    }

    pub fn name(&self) -> &str {
        self.column.as_str()
    }

    /// Key under which the column's raw value is kept in the rawtext snapshot.
    pub fn rawtext_key(&self) -> String {
        self.rawtext_name
            .as_deref()
            .unwrap_or_else(|| self.column.as_str())
            .to_lowercase()
    }

    pub fn has_klass(&self, klass: &str) -> bool {
        self.klass.iter().any(|name| name == klass)
    }

    pub fn keep_klass(&self) -> bool {
        self.xml_cell.as_ref().is_some_and(|cell| cell.keep_klass)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawColumnMapping {
    column: Option<String>,
    rawtext_name: Option<String>,
    klass: Option<KlassSpec>,
    #[serde(default)]
    do_not_capture: bool,
    standard_mapping: Option<String>,
    #[serde(default)]
    mappings: Vec<RawFieldMapping>,
    decode: Option<OneOrMany<String>>,
    xml_cell: Option<XmlCell>,
    non_tabular_cell: Option<RawNonTabularCell>,
}

impl TryFrom<RawColumnMapping> for ColumnMapping {
    type Error = ConfigError;

    fn try_from(raw: RawColumnMapping) -> Result<Self> {
        let column_name = raw.column.unwrap_or_default();
        let column = Pattern::parse(&column_name)?;
        let mappings = raw
            .mappings
            .into_iter()
            .map(FieldMapping::try_from)
            .collect::<Result<Vec<_>>>()?;
        let decode = raw
            .decode
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .iter()
            .map(|name| Decoding::parse(name))
            .collect::<Result<Vec<_>>>()?;
        let non_tabular_cell = raw
            .non_tabular_cell
            .map(|cell| NonTabularCell::from_raw(cell, &column_name))
            .transpose()?;
        Ok(Self {
            column,
            rawtext_name: raw.rawtext_name,
            klass: raw.klass.map(|spec| spec.flatten()).unwrap_or_default(),
            do_not_capture: raw.do_not_capture,
            standard_mapping: raw.standard_mapping,
            mappings,
            decode,
            xml_cell: raw.xml_cell,
            non_tabular_cell,
        })
    }
}

/// XML-specific column options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XmlCell {
    /// Path from the record element to the column's parent element.
    pub relative_path: Option<String>,
    /// Capture this attribute of the element instead of its text.
    pub attribute: Option<String>,
    /// The element may repeat; repeated captures get unique rawtext names.
    #[serde(default)]
    pub multiple: bool,
    /// Repeated captures also get unique target field names.
    #[serde(default)]
    pub increment_field_name: bool,
    /// `Some(false)` keeps repeated sections in the base record.
    pub build_new_record: Option<bool>,
    /// Keep the base klass even when numbered variants exist.
    #[serde(default)]
    pub keep_klass: bool,
}

/// A pre-transform decode step applied before the rawtext snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoding {
    Base64,
    WordDoc,
}

impl Decoding {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "base64" => Ok(Self::Base64),
            "word_doc" => Ok(Self::WordDoc),
            other => Err(ConfigError::UnknownDecoding {
                name: other.to_string(),
            }),
        }
    }
}

/// Named cleaning rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanRule {
    Name,
    Upcase,
    Downcase,
    Itself,
    NhsNumber,
    Postcode,
    Sex,
    Code,
    CodeIcd,
    Roman5,
    TnmCategory,
    XmlSafe,
}

impl CleanRule {
    pub fn parse(name: &str) -> Result<Self> {
        let rule = match name {
            "name" => Self::Name,
            "upcase" => Self::Upcase,
            "downcase" => Self::Downcase,
            "itself" => Self::Itself,
            "nhsnumber" => Self::NhsNumber,
            "postcode" => Self::Postcode,
            "sex" => Self::Sex,
            "code" => Self::Code,
            "code_icd" => Self::CodeIcd,
            "roman5" => Self::Roman5,
            "tnmcategory" => Self::TnmCategory,
            "xmlsafe" => Self::XmlSafe,
            other => {
                return Err(ConfigError::UnknownCleanRule {
                    name: other.to_string(),
                });
            }
        };
        Ok(rule)
    }
}

/// The single transform a field mapping applies.
#[derive(Debug, Clone)]
pub enum FieldTransform {
    /// Parse as a date (or date-time) with this strftime format.
    Format(String),
    /// Apply named clean rules in order.
    Clean(Vec<CleanRule>),
    /// Dictionary lookup; unmatched values pass through.
    Map(BTreeMap<String, Value>),
    /// First capture group of the regex, trimmed.
    Match(Regex),
    /// Integer number of days after the base date.
    DaysAfter(NaiveDate),
    /// Trim strings, pass anything else through.
    Identity,
}

/// An ordered set of pattern replacements.
#[derive(Debug, Clone)]
pub struct ReplaceRule {
    pub replacements: Vec<(Pattern, String)>,
}

/// Largest accepted `order`. Uncompacted joins render every slot up to it.
pub const MAX_ORDER: usize = 1024;

/// How several field mappings for the same field are combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composition {
    /// Positional slot `order - 1`, joined with the field's separator.
    Ordered {
        order: usize,
        join: Option<String>,
        compact: Option<bool>,
    },
    /// Explicit rank; lower ranks win.
    Ranked { priority: usize },
    /// Prepended ahead of everything placed so far.
    Unranked,
}

/// One target field's transform rule.
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub field: String,
    pub transform: FieldTransform,
    pub replace: Vec<ReplaceRule>,
    pub composition: Composition,
    pub validates_presence: bool,
    pub default_value: Option<Value>,
}

impl FieldMapping {
    /// A plain trimmed copy into `field`.
    pub fn identity(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            transform: FieldTransform::Identity,
            replace: Vec::new(),
            composition: Composition::Unranked,
            validates_presence: false,
            default_value: None,
        }
    }

    pub fn priority(&self) -> Option<usize> {
        match self.composition {
            Composition::Ranked { priority } => Some(priority),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFieldMapping {
    field: String,
    format: Option<String>,
    clean: Option<OneOrMany<String>>,
    map: Option<serde_yaml::Mapping>,
    #[serde(rename = "match")]
    match_pattern: Option<String>,
    daysafter: Option<serde_yaml::Value>,
    replace: Option<OneOrMany<serde_yaml::Mapping>>,
    order: Option<usize>,
    join: Option<String>,
    compact: Option<bool>,
    priority: Option<usize>,
    validates: Option<Validates>,
    default_value: Option<serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Validates {
    #[serde(default)]
    presence: bool,
}

impl TryFrom<RawFieldMapping> for FieldMapping {
    type Error = ConfigError;

    fn try_from(raw: RawFieldMapping) -> Result<Self> {
        let field = raw.field;
        let invalid = |reason: &str| ConfigError::InvalidFieldMapping {
            field: field.clone(),
            reason: reason.to_string(),
        };

        let transform = if let Some(format) = raw.format {
            FieldTransform::Format(format)
        } else if let Some(clean) = raw.clean {
            let rules = clean
                .into_vec()
                .iter()
                .map(|name| CleanRule::parse(name))
                .collect::<Result<Vec<_>>>()?;
            FieldTransform::Clean(rules)
        } else if let Some(map) = raw.map {
            let mut dictionary = BTreeMap::new();
            for (key, value) in &map {
                let key = yaml_scalar_string(key).ok_or_else(|| invalid("map keys must be scalars"))?;
                let value =
                    from_yaml_scalar(value).ok_or_else(|| invalid("map values must be scalars"))?;
                dictionary.insert(key, value);
            }
            FieldTransform::Map(dictionary)
        } else if let Some(pattern) = raw.match_pattern {
            FieldTransform::Match(parse_regex(&pattern)?)
        } else if let Some(base) = raw.daysafter {
            let text = yaml_scalar_string(&base).unwrap_or_default();
            let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| {
                ConfigError::InvalidBaseDate {
                    field: field.clone(),
                    value: text.clone(),
                }
            })?;
            FieldTransform::DaysAfter(date)
        } else {
            FieldTransform::Identity
        };

        let mut replace = Vec::new();
        for rule in raw.replace.map(OneOrMany::into_vec).unwrap_or_default() {
            let mut replacements = Vec::with_capacity(rule.len());
            for (pattern, replacement) in &rule {
                let pattern =
                    yaml_scalar_string(pattern).ok_or_else(|| invalid("replace keys must be scalars"))?;
                let replacement = yaml_scalar_string(replacement)
                    .ok_or_else(|| invalid("replacements must be scalars"))?;
                replacements.push((Pattern::parse(&pattern)?, replacement));
            }
            replace.push(ReplaceRule { replacements });
        }

        let composition = match (raw.order, raw.priority) {
            (Some(0), _) => return Err(invalid("order starts at 1")),
            (Some(order), _) if order > MAX_ORDER => {
                return Err(invalid(&format!("order must not exceed {MAX_ORDER}")));
            }
            (Some(order), _) => Composition::Ordered {
                order,
                join: raw.join,
                compact: raw.compact,
            },
            (None, Some(priority)) => Composition::Ranked { priority },
            (None, None) => Composition::Unranked,
        };

        let default_value = raw
            .default_value
            .map(|value| from_yaml_scalar(&value).ok_or_else(|| invalid("default_value must be a scalar")))
            .transpose()?;

        Ok(Self {
            field,
            transform,
            replace,
            composition,
            validates_presence: raw.validates.unwrap_or_default().presence,
            default_value,
        })
    }
}

/// Rejects two field mappings for the same field with the same explicit priority.
///
/// Mappings without a priority never collide with each other.
pub fn validate_priorities(columns: &[ColumnMapping]) -> Result<()> {
    let mut seen: BTreeSet<(&str, usize)> = BTreeSet::new();
    for column in columns.iter().filter(|column| !column.do_not_capture) {
        for mapping in &column.mappings {
            if let Some(priority) = mapping.priority()
                && !seen.insert((mapping.field.as_str(), priority))
            {
                return Err(ConfigError::DuplicatePriority {
                    field: mapping.field.clone(),
                    priority,
                });
            }
        }
    }
    Ok(())
}
