//! Column synthesis for repeating XML sections.

use recmap_model::{ColumnMapping, Pattern, XmlCell};

use super::xpath::{predicate_tokens, split_attribute};

/// Builds the column for one concrete instance of a templated xpath.
///
/// `xpath` is the positioned path as found in the record, e.g.
/// `Treatment[2]/Code`. A `multiple` template gets a rawtext name (and,
/// with `increment_field_name`, field names) suffixed with the position
/// numbers so repeated captures never collide. With `new_record`, each
/// klass is suffixed with `#` and the outermost position.
pub fn augment_column(template: &ColumnMapping, xpath: &str, new_record: bool) -> ColumnMapping {
    let tokens = predicate_tokens(xpath);
    let (element_path, attribute) = split_attribute(xpath);
    let (parent, leaf) = element_path.rsplit_once('/').unwrap_or(("", element_path));

    let mut column = template.clone();
    column.column = Pattern::Literal(leaf.to_string());
    let cell = column.xml_cell.get_or_insert_with(XmlCell::default);
    cell.relative_path = (!parent.is_empty()).then(|| parent.to_string());
    cell.attribute = attribute.map(str::to_string);
    let multiple = cell.multiple;
    let increment_field_name = cell.increment_field_name;

    let suffix = tokens.concat();
    if multiple && !suffix.is_empty() {
        column.rawtext_name = Some(format!("{}_{suffix}", template.rawtext_key()));
        if increment_field_name {
            for mapping in &mut column.mappings {
                mapping.field = format!("{}_{suffix}", mapping.field);
            }
        }
    } else {
        column.rawtext_name = Some(template.rawtext_key());
    }

    if new_record && let Some(first) = tokens.first() {
        column.klass = column
            .klass
            .iter()
            .map(|klass| format!("{klass}#{first}"))
            .collect();
    }
    column
}
