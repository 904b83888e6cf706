//! Per-klass column masks.

use recmap_model::ColumnMapping;

/// A klass and its masked column list, parallel to the full column list.
pub type MaskedMapping = (String, Vec<ColumnMapping>);

/// Builds one masked column list per klass.
///
/// With a table-level klass every column feeds that klass. Otherwise each
/// klass keeps the columns tagged with it and every other column becomes a
/// `do_not_capture` placeholder, so positions still line up with the row.
pub fn masked_mappings(columns: &[ColumnMapping], table_klass: Option<&str>) -> Vec<MaskedMapping> {
    if let Some(klass) = table_klass {
        return vec![(klass.to_string(), columns.to_vec())];
    }
    klass_names(columns)
        .into_iter()
        .map(|klass| {
            let masked = columns
                .iter()
                .map(|column| {
                    if !column.do_not_capture && column.has_klass(&klass) {
                        column.clone()
                    } else {
                        ColumnMapping::placeholder()
                    }
                })
                .collect();
            (klass, masked)
        })
        .collect()
}

/// Distinct klasses of capturing columns, in first-seen order.
pub(crate) fn klass_names(columns: &[ColumnMapping]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for column in columns.iter().filter(|column| !column.do_not_capture) {
        for klass in &column.klass {
            if !names.contains(klass) {
                names.push(klass.clone());
            }
        }
    }
    names
}
