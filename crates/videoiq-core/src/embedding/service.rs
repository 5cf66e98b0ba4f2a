//! Embedding Service Client
//!
//! HTTP client for an OpenAI-compatible embedding service exposing a text
//! endpoint (`POST /embeddings`) and an image endpoint
//! (`POST /embeddings/image?model=...` with the raw JPEG as body).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{validate_embedding, ImageEncoder, TextEncoder};
use crate::index::Collection;
use crate::{CoreError, CoreResult};

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for the embedding service
#[derive(Clone, Debug)]
pub struct EmbeddingServiceConfig {
    /// Base URL, without trailing slash (e.g. "http://localhost:8080/v1")
    pub base_url: String,
    /// Model used for speech segments and queries
    pub text_model: String,
    /// Model used for keyframes
    pub image_model: String,
    /// Bearer token, if the service requires one
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Expected vector length
    pub dimension: usize,
}

// =============================================================================
// Embedding Service Client
// =============================================================================

/// Text and image encoder backed by a remote embedding service
pub struct EmbeddingServiceClient {
    base_url: String,
    text_model: String,
    image_model: String,
    api_key: Option<String>,
    dimension: usize,
    #[cfg(feature = "ai-providers")]
    client: reqwest::Client,
}

impl EmbeddingServiceClient {
    /// Creates a new client
    pub fn new(config: EmbeddingServiceConfig) -> CoreResult<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CoreError::ValidationError(
                "Embedding service URL cannot be empty".to_string(),
            ));
        }

        if config.dimension == 0 {
            return Err(CoreError::ValidationError(
                "Embedding dimension must be greater than zero".to_string(),
            ));
        }

        #[cfg(feature = "ai-providers")]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            text_model: config.text_model,
            image_model: config.image_model,
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            dimension: config.dimension,
            #[cfg(feature = "ai-providers")]
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn text_url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    fn image_url(&self) -> String {
        format!("{}/embeddings/image", self.base_url)
    }

    /// JPEG upload; the model name travels as an encoded `model` query pair
    #[cfg(feature = "ai-providers")]
    fn image_request(&self, bytes: Vec<u8>) -> reqwest::RequestBuilder {
        self.client
            .post(self.image_url())
            .query(&[("model", self.image_model.as_str())])
            .header("Content-Type", "image/jpeg")
            .body(bytes)
    }

    #[cfg(feature = "ai-providers")]
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    #[cfg(feature = "ai-providers")]
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        label: &str,
        collection: Collection,
    ) -> CoreResult<Vec<f32>> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| CoreError::AIRequestFailed(format!("{} request failed: {}", label, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::AIRequestFailed(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(CoreError::EmbeddingFailed(format!(
                "Embedding service error ({}): {}",
                status, body
            )));
        }

        let vector = parse_embedding_response(&body)?;
        validate_embedding(vector, self.dimension, collection)
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Extracts the first embedding of a `{data:[{embedding:[...]}]}` body
fn parse_embedding_response(body: &str) -> CoreResult<Vec<f32>> {
    let response: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        CoreError::EmbeddingFailed(format!("Failed to parse embedding response: {}", e))
    })?;

    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| CoreError::EmbeddingFailed("Embedding response has no data".to_string()))
}

// =============================================================================
// Encoder Implementations
// =============================================================================

#[async_trait]
impl TextEncoder for EmbeddingServiceClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[cfg(feature = "ai-providers")]
    async fn embed_text(&self, text: &str) -> CoreResult<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.text_model,
            input: vec![text],
        };
        let request = self.client.post(self.text_url()).json(&body);
        self.send(request, "text encoder", Collection::Speech).await
    }

    #[cfg(not(feature = "ai-providers"))]
    async fn embed_text(&self, _text: &str) -> CoreResult<Vec<f32>> {
        let _ = (self.text_url(), &self.text_model, &self.api_key);
        Err(CoreError::NotSupported(
            "AI providers feature not enabled. Build with --features ai-providers".to_string(),
        ))
    }
}

#[async_trait]
impl ImageEncoder for EmbeddingServiceClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[cfg(feature = "ai-providers")]
    async fn embed_image(&self, image_path: &Path) -> CoreResult<Vec<f32>> {
        let bytes = tokio::fs::read(image_path).await?;
        let request = self.image_request(bytes);
        self.send(request, "image encoder", Collection::Visual).await
    }

    #[cfg(not(feature = "ai-providers"))]
    async fn embed_image(&self, _image_path: &Path) -> CoreResult<Vec<f32>> {
        let _ = (self.image_url(), &self.image_model);
        Err(CoreError::NotSupported(
            "AI providers feature not enabled. Build with --features ai-providers".to_string(),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
