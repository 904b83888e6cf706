//! Single-value transforms: `replace`, then exactly one field transform.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use recmap_model::{FieldMapping, FieldTransform, ReplaceRule, Value};
use tracing::warn;

use crate::clean::apply_rules;

/// Applies a field mapping's `replace` rules and transform to a copy of `raw`.
pub(crate) fn transform_value(raw: &Value, mapping: &FieldMapping) -> Value {
    let replaced = apply_replace(raw.clone(), &mapping.replace);
    match &mapping.transform {
        FieldTransform::Format(format) => parse_date(&replaced, format, &mapping.field),
        FieldTransform::Clean(rules) => apply_rules(replaced, rules),
        FieldTransform::Map(dictionary) => {
            let key = replaced.to_raw_string();
            dictionary
                .get(key.trim())
                .cloned()
                .unwrap_or(replaced)
        }
        FieldTransform::Match(regex) => match &replaced {
            Value::Text(text) => regex
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map_or(Value::Null, |group| Value::from(group.as_str().trim())),
            _ => Value::Null,
        },
        FieldTransform::DaysAfter(base) => days_after(&replaced, *base),
        FieldTransform::Identity => match replaced {
            Value::Text(text) => Value::Text(text.trim().to_string()),
            other => other,
        },
    }
}

/// Runs each rule's replacements in declared order, recursing into lists.
fn apply_replace(value: Value, rules: &[ReplaceRule]) -> Value {
    if rules.is_empty() {
        return value;
    }
    match value {
        Value::Text(mut text) => {
            for rule in rules {
                for (pattern, replacement) in &rule.replacements {
                    text = pattern.replace_all(&text, replacement).into_owned();
                }
            }
            Value::Text(text)
        }
        Value::List(items) => Value::List(
            items
                .into_iter()
                .map(|item| apply_replace(item, rules))
                .collect(),
        ),
        other => other,
    }
}

fn parse_date(value: &Value, format: &str, field: &str) -> Value {
    let text = match value {
        Value::Date(_) | Value::DateTime(_) => return value.clone(),
        Value::Text(text) if !text.trim().is_empty() => text.trim(),
        _ => return Value::Null,
    };
    // Date-only parsing ignores time fields, so try the full timestamp first.
    if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
        return Value::DateTime(datetime);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, format) {
        return Value::Date(date);
    }
    warn!(field, format, "value does not match date format");
    Value::Null
}

fn days_after(value: &Value, base: NaiveDate) -> Value {
    let days = match value {
        Value::Integer(days) => Some(*days),
        Value::Text(text) => parse_day_count(text.trim()),
        _ => None,
    };
    days.and_then(|days| base.checked_add_signed(Duration::try_days(days)?))
        .map_or(Value::Null, Value::Date)
}

/// Accepts `"12"`, `"+12"`, `"-3"` and float-formatted counts such as `"12.0"`.
fn parse_day_count(text: &str) -> Option<i64> {
    if let Ok(days) = text.parse::<i64>() {
        return Some(days);
    }
    let days = text.parse::<f64>().ok()?;
    if days.is_finite() && days.fract() == 0.0 && days.abs() < 1.0e9 {
        Some(days as i64)
    } else {
        None
    }
}
