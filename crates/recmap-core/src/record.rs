use recmap_map::Attributes;
use serde::Serialize;

/// One emitted `(klass, attributes, index)` tuple.
///
/// `index` is the 0-based source row for tabular input, the record ordinal
/// for non-tabular input and the element ordinal for XML input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedRecord {
    pub klass: String,
    pub attributes: Attributes,
    pub index: usize,
}
