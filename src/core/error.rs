//! Unified error handling for the evidence retrieval core.
//!
//! One error type covers every failure the retrieval pipeline can
//! surface. Query-style operations that find nothing return empty
//! collections instead of errors; mutations and validation failures
//! always surface here.

use std::fmt;

/// Main error type for the evidence retrieval core
#[derive(Debug)]
pub enum EvidenceRagError {
    /// Configuration-related errors (unsupported mode, missing backend)
    Config {
        /// Error message
        message: String,
    },

    /// Resource not found where the operation requires it to exist
    NotFound {
        /// Resource type ("corpus", "node", "document")
        resource: String,
        /// Resource identifier
        id: String,
    },

    /// Duplicate key on insert
    AlreadyExists {
        /// Resource type
        resource: String,
        /// Resource identifier
        id: String,
    },

    /// Ontology or input validation failure
    Validation {
        /// Error message
        message: String,
    },

    /// Embedding dimension disagrees with the corpus's fixed dimension
    DimensionMismatch {
        /// Dimension the corpus was created with
        expected: usize,
        /// Dimension actually supplied
        actual: usize,
    },

    /// Vector store errors (zero-vector normalization, backend faults)
    VectorSearch {
        /// Error message
        message: String,
    },

    /// Graph construction and mutation errors
    GraphConstruction {
        /// Error message
        message: String,
    },

    /// Query embedding collaborator failed
    Embedding {
        /// Error message
        message: String,
    },

    /// On-disk index/manifest pairing is missing or inconsistent
    DataCorruption {
        /// Error message
        message: String,
    },

    /// I/O errors from persisted-backend file operations
    Io(std::io::Error),

    /// Serde JSON errors (ontology document, manifest files)
    SerdeJson(serde_json::Error),
}

impl fmt::Display for EvidenceRagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvidenceRagError::Config { message } => {
                write!(f, "Configuration error: {message}")
            }
            EvidenceRagError::NotFound { resource, id } => {
                write!(f, "{resource} not found: {id}")
            }
            EvidenceRagError::AlreadyExists { resource, id } => {
                write!(f, "{resource} already exists: {id}")
            }
            EvidenceRagError::Validation { message } => {
                write!(f, "Validation error: {message}")
            }
            EvidenceRagError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Embedding dimension mismatch: expected {expected}, got {actual}"
                )
            }
            EvidenceRagError::VectorSearch { message } => {
                write!(f, "Vector search error: {message}")
            }
            EvidenceRagError::GraphConstruction { message } => {
                write!(f, "Graph error: {message}")
            }
            EvidenceRagError::Embedding { message } => {
                write!(f, "Embedding error: {message}")
            }
            EvidenceRagError::DataCorruption { message } => {
                write!(f, "Data corruption: {message}")
            }
            EvidenceRagError::Io(e) => write!(f, "I/O error: {e}"),
            EvidenceRagError::SerdeJson(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for EvidenceRagError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvidenceRagError::Io(e) => Some(e),
            EvidenceRagError::SerdeJson(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EvidenceRagError {
    fn from(e: std::io::Error) -> Self {
        EvidenceRagError::Io(e)
    }
}

impl From<serde_json::Error> for EvidenceRagError {
    fn from(e: serde_json::Error) -> Self {
        EvidenceRagError::SerdeJson(e)
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, EvidenceRagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = EvidenceRagError::DimensionMismatch {
            expected: 384,
            actual: 768,
        };
        let text = err.to_string();
        assert!(text.contains("384"));
        assert!(text.contains("768"));

        let err = EvidenceRagError::AlreadyExists {
            resource: "embedding".to_string(),
            id: "doc-1::chunk_0".to_string(),
        };
        assert!(err.to_string().contains("doc-1::chunk_0"));
    }

    #[test]
    fn io_errors_convert_and_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EvidenceRagError = io.into();
        assert!(matches!(err, EvidenceRagError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
