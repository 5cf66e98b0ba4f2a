//! VideoIQ Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Acquisition Errors
    // =========================================================================
    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported media format: {0}")]
    UnsupportedMediaFormat(String),

    // =========================================================================
    // Media Errors
    // =========================================================================
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Nothing indexable: {0}")]
    NothingIndexable(String),

    // =========================================================================
    // Index Errors
    // =========================================================================
    #[error("Index error: {0}")]
    IndexError(String),

    #[error(
        "Dimension mismatch in collection '{collection}': expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error("Batch length mismatch: {vectors} vectors, {payloads} payloads")]
    BatchLengthMismatch { vectors: usize, payloads: usize },

    #[error("Payload of type '{payload_type}' cannot be stored in collection '{collection}'")]
    PayloadMismatch {
        collection: String,
        payload_type: String,
    },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("No searchable session: analysis has not completed")]
    SessionNotReady,

    // =========================================================================
    // AI Errors
    // =========================================================================
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("AI request failed: {0}")]
    AIRequestFailed(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Returns true for programming/configuration errors.
    ///
    /// These never come from the media being indexed; they mean the encoders,
    /// the store and the caller disagree about shapes.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CoreError::DimensionMismatch { .. }
                | CoreError::BatchLengthMismatch { .. }
                | CoreError::PayloadMismatch { .. }
                | CoreError::CollectionNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_is_configuration_error() {
        let err = CoreError::DimensionMismatch {
            collection: "speech".to_string(),
            expected: 512,
            actual: 384,
        };
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("expected 512, got 384"));
    }

    #[test]
    fn test_runtime_errors_are_not_configuration_errors() {
        assert!(!CoreError::DecodeFailed("no audio".to_string()).is_configuration_error());
        assert!(!CoreError::IndexError("disk full".to_string()).is_configuration_error());
        assert!(!CoreError::SessionNotReady.is_configuration_error());
    }
}
