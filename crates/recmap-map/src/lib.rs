//! Field transformation pipeline.
//!
//! Turns one raw row plus its column mappings into a record's attributes:
//!
//! - **decode**: `base64` and `word_doc` unwrapping before the rawtext snapshot
//! - **transform**: `replace`, then one of format, clean, map, match, daysafter
//! - **compose**: `order`/`join` and `priority` cross-population per field

mod clean;
mod compose;
pub mod decode;
pub mod error;
pub mod mapper;
mod transform;

pub use decode::{DecoderError, DocumentDecoder};
pub use error::{MapError, Result};
pub use mapper::{Attributes, Mapper, SKIP_FIELD};
