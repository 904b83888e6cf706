//! Error types for row mapping.

use thiserror::Error;

/// Errors raised while mapping one raw row.
#[derive(Debug, Error)]
pub enum MapError {
    /// The row does not have one value per column mapping.
    #[error("row has {actual} values but the mapping defines {expected} columns")]
    RowShape { expected: usize, actual: usize },

    /// A field flagged `validates: presence` resolved blank.
    #[error("field '{field}' (column '{column}') must be present")]
    Presence { field: String, column: String },

    /// A `decode` step could not unwrap the raw value.
    #[error("could not decode column '{column}': {reason}")]
    Decode { column: String, reason: String },
}

/// Result type for mapping operations.
pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MapError::RowShape {
            expected: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "row has 2 values but the mapping defines 3 columns"
        );
    }
}
