//! Sources feeding the recmap transformers.
//!
//! Each reader produces the lazy sequence a transformer consumes:
//!
//! - [`DelimitedRows`]: rows of text cells for tabular tables
//! - [`TextLines`]: raw lines for non-tabular tables
//! - [`XmlRecords`]: record elements for XML tables
//!
//! Readers hold one row, line or record at a time, so arbitrarily large
//! files stream.

mod delimited;
mod error;
mod lines;
mod xml_records;

// === Error Types ===
pub use error::{IngestError, Result};

// === Readers ===
pub use delimited::{DelimitedRows, open_delimited};
pub use lines::{TextLines, open_lines};
pub use xml_records::{RecordPath, XmlRecords, open_xml};
