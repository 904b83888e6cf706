//! Adapter from string-keyed rows to positional rows.

use std::collections::BTreeMap;

use recmap_model::{ColumnMapping, Value};

use crate::error::{CoreError, Result};

/// Reorders each keyed row into column order.
///
/// Columns with no matching key read as null; keys with no column are an
/// error, since they mean the mapping no longer describes the source.
pub(crate) struct KeyedRows<I> {
    names: Vec<String>,
    rows: I,
}

impl<I> KeyedRows<I>
where
    I: Iterator<Item = BTreeMap<String, Value>>,
{
    pub(crate) fn new(columns: &[ColumnMapping], rows: I) -> Self {
        Self {
            names: columns.iter().map(|column| column.name().to_string()).collect(),
            rows,
        }
    }

    fn positional(&self, mut row: BTreeMap<String, Value>) -> Result<Vec<Value>> {
        let values: Vec<Value> = self
            .names
            .iter()
            .map(|name| row.remove(name).unwrap_or_default())
            .collect();
        if !row.is_empty() {
            return Err(CoreError::UnmappedKeys {
                keys: row.into_keys().collect(),
            });
        }
        Ok(values)
    }
}

impl<I> Iterator for KeyedRows<I>
where
    I: Iterator<Item = BTreeMap<String, Value>>,
{
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(self.positional(row))
    }
}

#[cfg(test)]
mod tests {
    use recmap_model::StandardMappings;

    use super::*;

    fn keyed(pairs: &[(&str, &str)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), Value::from(*value)))
            .collect()
    }

    #[test]
    fn keys_are_placed_by_column_name() {
        let columns = ColumnMapping::list_from_yaml_str(
            "[{ column: surname, klass: K }, { column: forename, klass: K }]",
            &StandardMappings::new(),
        )
        .unwrap();
        let mut rows = KeyedRows::new(&columns, vec![keyed(&[("forename", "Ann")])].into_iter());
        assert_eq!(
            rows.next().unwrap().unwrap(),
            vec![Value::Null, Value::from("Ann")]
        );
    }

    #[test]
    fn unknown_keys_are_reported() {
        let columns =
            ColumnMapping::list_from_yaml_str("[{ column: surname, klass: K }]", &StandardMappings::new())
                .unwrap();
        let mut rows = KeyedRows::new(
            &columns,
            vec![keyed(&[("surname", "Smith"), ("shoe_size", "9"), ("eyes", "blue")])].into_iter(),
        );
        let err = rows.next().unwrap().unwrap_err();
        assert!(matches!(err, CoreError::UnmappedKeys { keys } if keys == vec!["eyes", "shoe_size"]));
    }
}
