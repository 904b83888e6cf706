//! Streaming transformation of source rows into klass-tagged records.
//!
//! Three layouts share one field pipeline ([`recmap_map::Mapper`]):
//!
//! - [`Table`]: rows of cells, with header validation and footer withholding
//! - [`NonTabularTable`]: free-text lines reassembled into records
//! - [`XmlTable`]: record elements, with repeating sections augmented
//!
//! Every transform returns a lazy iterator of [`MappedRecord`] results that
//! stops after the first error.

pub mod error;
pub mod footer;
mod keyed;
pub mod mask;
pub mod non_tabular;
pub mod notify;
pub mod record;
pub mod table;
pub mod xml;

use recmap_map::Mapper;
use recmap_model::{Layout, TableDefinition};

pub use error::{CoreError, Result, SourceError};
pub use footer::FooterBuffer;
pub use mask::{MaskedMapping, masked_mappings};
pub use non_tabular::{Line, NonTabularRun, NonTabularTable, Record};
pub use notify::{Notifier, PROCESSED_INTERVAL};
pub use record::MappedRecord;
pub use table::{ROW_IDENTIFIER_FIELD, Table, TableRun};
pub use xml::{XmlRun, XmlTable, augment_column, element_masks};

/// A definition bound to the transformer for its layout.
#[derive(Debug, Clone)]
pub enum TableTransformer {
    Tabular(Table),
    NonTabular(NonTabularTable),
    Xml(XmlTable),
}

impl TableTransformer {
    pub fn from_definition(definition: TableDefinition) -> Result<Self> {
        Ok(match definition.layout {
            Layout::Tabular => Self::Tabular(Table::new(definition)),
            Layout::NonTabular(_) => Self::NonTabular(NonTabularTable::new(definition)?),
            Layout::Xml { .. } => Self::Xml(XmlTable::new(definition)?),
        })
    }

    pub fn with_mapper(self, mapper: Mapper) -> Self {
        match self {
            Self::Tabular(table) => Self::Tabular(table.with_mapper(mapper)),
            Self::NonTabular(table) => Self::NonTabular(table.with_mapper(mapper)),
            Self::Xml(table) => Self::Xml(table.with_mapper(mapper)),
        }
    }

    pub fn definition(&self) -> &TableDefinition {
        match self {
            Self::Tabular(table) => table.definition(),
            Self::NonTabular(table) => table.definition(),
            Self::Xml(table) => table.definition(),
        }
    }
}
