//! Error types for schema loading and integrity checking.
//!
//! Uses thiserror for error messages and proper error chain handling.
//! User-facing conversation failures are NOT errors in this taxonomy:
//! the engine renders those as response actions so the dialogue can
//! continue. Only the schema boundary returns `Result`.

use thiserror::Error;

/// Errors from loading and validating document schemas.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("IO error loading schema '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in schema '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unknown document type '{document_type}' (available: {})", available.join(", "))]
    UnknownDocumentType {
        document_type: String,
        available: Vec<String>,
    },

    #[error("Invalid schema '{document_type}': {}", issues.join("; "))]
    Invalid {
        document_type: String,
        issues: Vec<String>,
    },
}

/// Result type alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
