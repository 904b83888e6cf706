//! Row mapping: one raw row plus a column list into a record's attributes.

use std::collections::BTreeMap;
use std::sync::Arc;

use recmap_model::{ColumnMapping, Composition, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::compose::FieldSlots;
use crate::decode::{DocumentDecoder, decode_value};
use crate::error::{MapError, Result};
use crate::transform::transform_value;

/// Name of the synthetic field that drops a record when it renders `"true"`.
pub const SKIP_FIELD: &str = "skip";

/// Mapped fields of one record plus the raw text each column carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    pub fields: BTreeMap<String, Value>,
    /// Post-decode, pre-transform text keyed by each column's rawtext key.
    pub rawtext: BTreeMap<String, String>,
}

impl Attributes {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// True when the `skip` field is set and renders as `"true"`.
    pub fn skip(&self) -> bool {
        self.fields
            .get(SKIP_FIELD)
            .is_some_and(|value| value.to_string() == "true")
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field, value)?;
        }
        map.serialize_entry("rawtext", &self.rawtext)?;
        map.end()
    }
}

/// Applies column mappings to raw rows.
///
/// Holds no per-row state, so one mapper can serve any number of rows and
/// tables.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    decoder: Option<Arc<dyn DocumentDecoder>>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the hook used by `decode: word_doc` columns.
    pub fn with_decoder(mut self, decoder: Arc<dyn DocumentDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Maps one raw row through a column list of the same length.
    pub fn map_row(&self, raw: &[Value], columns: &[ColumnMapping]) -> Result<Attributes> {
        if raw.len() != columns.len() {
            return Err(MapError::RowShape {
                expected: columns.len(),
                actual: raw.len(),
            });
        }

        let mut attributes = Attributes::default();
        let mut slots: BTreeMap<&str, FieldSlots> = BTreeMap::new();

        for (value, column) in raw.iter().zip(columns) {
            if column.do_not_capture {
                continue;
            }
            let value = decode_value(
                value.clone(),
                &column.decode,
                self.decoder.as_deref(),
                column.name(),
            )?;
            attributes
                .rawtext
                .insert(column.rawtext_key(), value.to_raw_string());

            for mapping in &column.mappings {
                let mut transformed = transform_value(&value, mapping);
                let ordered = matches!(mapping.composition, Composition::Ordered { .. });
                if transformed.is_blank()
                    && let Some(default) = &mapping.default_value
                {
                    transformed = default.clone();
                }
                if mapping.validates_presence && transformed.is_blank() {
                    return Err(MapError::Presence {
                        field: mapping.field.clone(),
                        column: column.name().to_string(),
                    });
                }
                if transformed.is_blank() && !ordered {
                    continue;
                }
                slots
                    .entry(mapping.field.as_str())
                    .or_default()
                    .place(&mapping.composition, transformed);
            }
        }

        for (field, field_slots) in slots {
            if let Some(value) = field_slots.resolve() {
                attributes.fields.insert(field.to_string(), value);
            }
        }
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use recmap_model::StandardMappings;

    use super::*;

    fn columns(yaml: &str) -> Vec<ColumnMapping> {
        ColumnMapping::list_from_yaml_str(yaml, &StandardMappings::new()).unwrap()
    }

    fn row(values: &[&str]) -> Vec<Value> {
        values.iter().map(|value| Value::from(*value)).collect()
    }

    #[test]
    fn row_shape_is_checked() {
        let cols = columns("[{ column: a, klass: K }]");
        let err = Mapper::new().map_row(&row(&["x", "y"]), &cols).unwrap_err();
        assert!(matches!(err, MapError::RowShape { expected: 1, actual: 2 }));
    }

    #[test]
    fn rawtext_is_kept_without_mappings() {
        let cols = columns("[{ column: One, klass: K }, { column: two, do_not_capture: true }]");
        let attrs = Mapper::new().map_row(&row(&[" CARROT ", "x"]), &cols).unwrap();
        assert!(attrs.fields.is_empty());
        assert_eq!(attrs.rawtext.len(), 1);
        assert_eq!(attrs.rawtext["one"], " CARROT ");
    }

    #[test]
    fn presence_is_validated() {
        let cols = columns(
            "[{ column: nhs, klass: K, mappings: [{ field: nhsnumber, validates: { presence: true } }] }]",
        );
        let err = Mapper::new().map_row(&row(&["  "]), &cols).unwrap_err();
        assert!(matches!(err, MapError::Presence { field, .. } if field == "nhsnumber"));
    }

    #[test]
    fn default_value_fills_blank_results() {
        let cols = columns(
            "[{ column: sex, klass: K, mappings: [{ field: sex, default_value: '0', validates: { presence: true } }] }]",
        );
        let attrs = Mapper::new().map_row(&row(&[""]), &cols).unwrap();
        assert_eq!(attrs.get("sex"), Some(&Value::from("0")));
    }

    #[test]
    fn skip_field_drops_record() {
        let cols = columns("[{ column: flag, klass: K, mappings: [{ field: skip }] }]");
        let mapper = Mapper::new();
        assert!(mapper.map_row(&row(&["true"]), &cols).unwrap().skip());
        assert!(!mapper.map_row(&row(&["false"]), &cols).unwrap().skip());
        assert!(!mapper.map_row(&row(&[""]), &cols).unwrap().skip());
    }

    #[test]
    fn attributes_serialize_flat_with_rawtext() {
        let mut attrs = Attributes::default();
        attrs.insert("surname", "SMITH");
        attrs.rawtext.insert("surname".to_string(), "smith".to_string());
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"surname":"SMITH","rawtext":{"surname":"smith"}}"#);
    }
}
