//! Transcript Summary
//!
//! Narrative summary of a completed session's transcript through an
//! OpenAI-compatible chat completion endpoint. Not on the indexing or search
//! path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CoreError, CoreResult};

/// Default chat endpoint (Groq, OpenAI-compatible)
pub const DEFAULT_SUMMARY_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default summary model
pub const DEFAULT_SUMMARY_MODEL: &str = "llama-3.3-70b-versatile";

// =============================================================================
// Summary Generator Trait
// =============================================================================

/// Produces a Markdown summary of a transcript
#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    async fn summarize(&self, transcript: &str) -> CoreResult<String>;
}

/// Builds the user prompt sent to the model
pub fn build_summary_prompt(transcript: &str) -> String {
    format!(
        "Transcript: <transcript>{}</transcript>\nTask: Create a beautiful, structured summary. Use Markdown headers and bullet points.",
        transcript
    )
}

// =============================================================================
// Chat Summary Generator
// =============================================================================

/// Connection settings for the chat endpoint
#[derive(Clone, Debug)]
pub struct ChatSummaryConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

/// `SummaryGenerator` backed by `/chat/completions`
pub struct ChatSummaryGenerator {
    base_url: String,
    model: String,
    api_key: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    #[cfg(feature = "ai-providers")]
    client: reqwest::Client,
}

impl ChatSummaryGenerator {
    /// Creates a new generator; an API key is required
    pub fn new(config: ChatSummaryConfig) -> CoreResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Summary API key is required".to_string(),
            ));
        }

        #[cfg(feature = "ai-providers")]
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model,
            api_key: config.api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            #[cfg(feature = "ai-providers")]
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, transcript: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_summary_prompt(transcript),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn parse_completion(body: &str) -> CoreResult<String> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| CoreError::AIRequestFailed(format!("Failed to parse response: {}", e)))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::AIRequestFailed("No completion choices returned".to_string()))?;

    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl SummaryGenerator for ChatSummaryGenerator {
    #[cfg(feature = "ai-providers")]
    async fn summarize(&self, transcript: &str) -> CoreResult<String> {
        if transcript.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Transcript is empty; nothing to summarize".to_string(),
            ));
        }

        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting summary from {} ({})", url, self.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.build_request(transcript))
            .send()
            .await
            .map_err(|e| CoreError::AIRequestFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::AIRequestFailed(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(CoreError::AIRequestFailed(format!(
                "Summary API error ({}): {}",
                status, message
            )));
        }

        parse_completion(&body)
    }

    #[cfg(not(feature = "ai-providers"))]
    async fn summarize(&self, transcript: &str) -> CoreResult<String> {
        if transcript.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Transcript is empty; nothing to summarize".to_string(),
            ));
        }
        debug!("Summary requested without ai-providers ({})", self.base_url);
        let _ = (&self.api_key, self.build_request(transcript));
        Err(CoreError::NotSupported(
            "AI providers feature not enabled. Build with --features ai-providers".to_string(),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChatSummaryConfig {
        ChatSummaryConfig {
            base_url: format!("{}/", DEFAULT_SUMMARY_BASE_URL),
            model: DEFAULT_SUMMARY_MODEL.to_string(),
            api_key: "test-key".to_string(),
            temperature: Some(0.3),
            max_tokens: None,
            timeout_secs: 60,
        }
    }

    #[test]
    fn test_prompt_wraps_transcript() {
        let prompt = build_summary_prompt("intro pricing details outro");
        assert!(prompt.starts_with("Transcript: <transcript>intro pricing details outro</transcript>\n"));
        assert!(prompt.contains("Markdown headers and bullet points"));
    }

    #[test]
    fn test_generator_requires_api_key() {
        let mut cfg = config();
        cfg.api_key = "   ".to_string();
        assert!(matches!(
            ChatSummaryGenerator::new(cfg),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let generator = ChatSummaryGenerator::new(config()).unwrap();
        assert_eq!(generator.base_url, DEFAULT_SUMMARY_BASE_URL);

        let json = serde_json::to_value(generator.build_request("hello")).unwrap();
        assert_eq!(json["model"], "llama-3.3-70b-versatile");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("<transcript>hello</transcript>"));
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_completion() {
        let body = r###"{"choices":[{"message":{"role":"assistant","content":"## Summary"}}]}"###;
        assert_eq!(parse_completion(body).unwrap(), "## Summary");
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
    }

    #[tokio::test]
    async fn test_empty_transcript_rejected() {
        let generator = ChatSummaryGenerator::new(config()).unwrap();
        let result = generator.summarize("  ").await;
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }
}
