//! Configuration errors raised while building mapping definitions.
//!
//! Every variant is fatal at construction time: a definition that fails to
//! load is never partially usable.

use thiserror::Error;

/// Errors that can occur while loading or validating a mapping definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    // === Document Errors ===
    /// The YAML document could not be parsed or did not match the schema.
    #[error("invalid mapping document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A table definition used a key that is not a recognised option.
    #[error("unrecognised option '{key}' in {context}")]
    UnknownOption { key: String, context: String },

    /// A recognised table option has an unusable value.
    #[error("invalid value for option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    /// The document root was neither a table nor a list of tables.
    #[error("mapping document must be a table or a list of tables")]
    InvalidDocument,

    // === Column Errors ===
    /// A column definition was not a YAML mapping.
    #[error("invalid column definition: {reason}")]
    InvalidColumn { reason: String },

    /// A capturing column declares no klass and the table has none either.
    #[error("column '{column}' must declare a klass or set do_not_capture")]
    MissingKlass { column: String },

    /// Two field mappings for the same field declare the same explicit priority.
    #[error("duplicate priority {priority} for field '{field}'")]
    DuplicatePriority { field: String, priority: usize },

    /// A column references a standard mapping that is not registered.
    #[error("unknown standard mapping '{name}'")]
    UnknownStandardMapping { name: String },

    /// A column asks for a decode step that does not exist.
    #[error("unknown decode encoding '{name}'")]
    UnknownDecoding { name: String },

    /// A field mapping names a clean rule that does not exist.
    #[error("unknown clean rule '{name}'")]
    UnknownCleanRule { name: String },

    /// A `/regex/` pattern or capture rule failed to compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A `daysafter` base date is not an ISO 8601 calendar date.
    #[error("invalid base date '{value}' for field '{field}'")]
    InvalidBaseDate { field: String, value: String },

    /// A map key or replacement value was not a scalar.
    #[error("field '{field}': {reason}")]
    InvalidFieldMapping { field: String, reason: String },

    // === Non-Tabular Errors ===
    /// A non-tabular table has no start line pattern.
    #[error("non-tabular table is missing start_line_pattern")]
    MissingStartLinePattern,

    /// A capturing non-tabular column has no `lines` rule.
    #[error("non-tabular column '{column}' is missing its lines rule")]
    MissingLines { column: String },

    /// A capturing non-tabular column has no `capture` rule.
    #[error("non-tabular column '{column}' is missing its capture rule")]
    MissingCapture { column: String },

    /// A `lines` selector could not be parsed.
    #[error("invalid lines selector '{value}' for column '{column}'")]
    InvalidLineSelector { column: String, value: String },

    // === Registry Errors ===
    /// The process-wide standard mapping registry was configured twice.
    #[error("standard mappings have already been configured")]
    StandardMappingsAlreadyConfigured,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
