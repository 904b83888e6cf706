//! Error types for table transformation.

use recmap_map::MapError;
use recmap_model::ConfigError;
use thiserror::Error;

/// Boxed error from an upstream row or line source.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced through a transformation run.
///
/// Every variant ends the run: the iterator yields the error once and then
/// stops.
#[derive(Debug, Error)]
pub enum CoreError {
    // === Definition Errors ===
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A definition was handed to a transformer for another layout.
    #[error("table layout is {actual}, expected {expected}")]
    WrongLayout {
        expected: &'static str,
        actual: &'static str,
    },

    // === Row Errors ===
    #[error(transparent)]
    Map(#[from] MapError),

    /// The header rows never matched the expected column names.
    #[error("{message}")]
    HeaderInvalid { message: String },

    /// A keyed row carried keys that no column maps.
    #[error("unmapped keys: {}", .keys.join(", "))]
    UnmappedKeys { keys: Vec<String> },

    /// An XML record still had unmapped leaves after augmentation.
    #[error("unmapped xpaths in record {index}: {}", .xpaths.join(", "))]
    UnmappedXpath { index: usize, xpaths: Vec<String> },

    // === Record Boundary Errors ===
    /// A start line arrived while the previous record was still open.
    #[error("line {line}: new record started before the previous record ended")]
    RecordBoundary { line: usize },

    // === Source Errors ===
    #[error("row source failed: {0}")]
    Source(#[source] SourceError),
}

/// Result type for transformation operations.
pub type Result<T> = std::result::Result<T, CoreError>;
