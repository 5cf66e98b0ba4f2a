//! Transcription Module
//!
//! Speech-to-text collaborator contract and the Whisper backend.

pub mod whisper;

pub use whisper::{WhisperModel, WhisperTranscriber, TranscriptionOptions};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, MediaSource, TimeSec};

// =============================================================================
// Transcript Segment
// =============================================================================

/// A single spoken segment of a transcript
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Start time in seconds from the start of the media
    pub start: TimeSec,
    /// Transcribed text
    pub text: String,
}

impl TranscriptSegment {
    /// Creates a new transcript segment
    pub fn new(start: TimeSec, text: impl Into<String>) -> Self {
        Self {
            start,
            text: text.into(),
        }
    }

    /// Returns true if the segment can be embedded and seeked to
    pub fn is_indexable(&self) -> bool {
        self.start.is_finite() && self.start >= 0.0 && !self.text.trim().is_empty()
    }
}

// =============================================================================
// Transcriber Trait
// =============================================================================

/// Produces ordered speech segments for a media source.
///
/// An empty result is valid (silent media). `DecodeFailed` means the audio
/// track could not be extracted at all; any other error is a transcription
/// failure.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Transcribes the audio track of `source`, segments in chronological order
    async fn transcribe(&self, source: &MediaSource) -> CoreResult<Vec<TranscriptSegment>>;
}

/// Stands in when no speech backend could be loaded.
///
/// Every call fails with `TranscriptionFailed`, so video sources are still
/// indexed visually while audio-only sources fail.
pub struct UnavailableTranscriber {
    reason: String,
}

impl UnavailableTranscriber {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl Transcriber for UnavailableTranscriber {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn transcribe(&self, _source: &MediaSource) -> CoreResult<Vec<TranscriptSegment>> {
        Err(CoreError::TranscriptionFailed(format!(
            "No transcription backend: {}",
            self.reason
        )))
    }
}
