//! Embedding Module
//!
//! Encoder contracts for text and images. Speech segments and queries go
//! through the text encoder; keyframes through the image encoder. Both must
//! produce vectors of the index dimension.

pub mod service;

pub use service::{EmbeddingServiceClient, EmbeddingServiceConfig};

use async_trait::async_trait;
use std::path::Path;

use crate::index::Collection;
use crate::{CoreError, CoreResult};

// =============================================================================
// Encoder Traits
// =============================================================================

/// Maps text to a fixed-length vector
#[async_trait]
pub trait TextEncoder: Send + Sync {
    /// Length of every vector this encoder returns
    fn dimension(&self) -> usize;

    async fn embed_text(&self, text: &str) -> CoreResult<Vec<f32>>;
}

/// Maps an image file to a fixed-length vector
#[async_trait]
pub trait ImageEncoder: Send + Sync {
    /// Length of every vector this encoder returns
    fn dimension(&self) -> usize;

    async fn embed_image(&self, image_path: &Path) -> CoreResult<Vec<f32>>;
}

// =============================================================================
// Validation
// =============================================================================

/// Checks an encoder output bound for (or searched against) `collection`.
///
/// A wrong length is a configuration error; non-finite components are an
/// embedding failure.
pub fn validate_embedding(
    vector: Vec<f32>,
    expected_dimension: usize,
    collection: Collection,
) -> CoreResult<Vec<f32>> {
    if vector.len() != expected_dimension {
        return Err(CoreError::DimensionMismatch {
            collection: collection.name().to_string(),
            expected: expected_dimension,
            actual: vector.len(),
        });
    }

    if vector.iter().any(|v| !v.is_finite()) {
        return Err(CoreError::EmbeddingFailed(format!(
            "Encoder returned a non-finite vector component for collection '{}'",
            collection
        )));
    }

    Ok(vector)
}
