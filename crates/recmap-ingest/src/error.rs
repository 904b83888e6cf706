//! Error types for source readers.

use std::path::PathBuf;

use recmap_model::XmlError;
use thiserror::Error;

/// Errors raised while reading a source.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    #[error("source file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    // === Delimited Text Errors ===
    #[error("failed to parse delimited row: {0}")]
    Csv(#[from] csv::Error),

    // === XML Errors ===
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// The record xpath names no element.
    #[error("invalid record xpath '{xpath}'")]
    InvalidRecordPath { xpath: String },
}

impl From<quick_xml::Error> for IngestError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(XmlError::Parse(err))
    }
}

impl IngestError {
    /// Maps a failed `File::open` to the matching variant.
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::FileRead { path, source }
        }
    }
}

/// Result type for source readers.
pub type Result<T> = std::result::Result<T, IngestError>;
