pub mod error;
pub mod klass;
pub mod mapping;
pub mod non_tabular;
pub mod pattern;
pub mod standard;
pub mod table;
pub mod value;
pub mod xml;

pub use error::{ConfigError, Result};
pub use klass::KlassSpec;
pub use mapping::{
    CleanRule, ColumnMapping, Composition, Decoding, FieldMapping, FieldTransform, MAX_ORDER,
    ReplaceRule, XmlCell, validate_priorities,
};
pub use non_tabular::{LineSelector, NonTabularCell, NonTabularRow, RemoveLines};
pub use pattern::Pattern;
pub use standard::StandardMappings;
pub use table::{Layout, MappingDocument, RowIdentifier, TABLE_OPTIONS, TableDefinition};
pub use value::Value;
pub use xml::{XmlElement, XmlError, XmlNode};
