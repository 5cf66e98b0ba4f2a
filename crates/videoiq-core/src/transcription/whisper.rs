//! Whisper Transcription Backend
//!
//! Speech-to-text using whisper.cpp via whisper-rs. The engine is compiled
//! only with the `whisper` feature; without it, construction fails with
//! `NotSupported`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::{TranscriptSegment, Transcriber};
use crate::media::audio::{extract_audio_for_transcription, load_audio_samples, WHISPER_SAMPLE_RATE};
use crate::{CoreError, CoreResult, MediaSource};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur inside the Whisper engine
#[derive(Error, Debug)]
pub enum WhisperError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    #[error("Transcription failed: {0}")]
    TranscriptionError(String),

    #[error("Whisper feature not enabled. Rebuild with --features whisper")]
    FeatureNotEnabled,
}

pub type WhisperResult<T> = Result<T, WhisperError>;

impl From<WhisperError> for CoreError {
    fn from(err: WhisperError) -> Self {
        match err {
            WhisperError::FeatureNotEnabled => CoreError::NotSupported(err.to_string()),
            WhisperError::ModelNotFound(path) => CoreError::FileNotFound(path),
            other => CoreError::TranscriptionFailed(other.to_string()),
        }
    }
}

// =============================================================================
// Whisper Model Types
// =============================================================================

/// Available Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperModel {
    /// ~75MB, fastest
    Tiny,
    /// ~142MB
    #[default]
    Base,
    /// ~466MB
    Small,
    /// ~1.5GB
    Medium,
    /// ~2.9GB, most accurate
    Large,
}

impl WhisperModel {
    /// Returns the ggml filename for this model size
    pub fn filename(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large.bin",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
            WhisperModel::Large => "large",
        }
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = WhisperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            _ => Err(WhisperError::ModelLoadError(format!(
                "Unknown model size: {}",
                s
            ))),
        }
    }
}

// =============================================================================
// Transcription Options
// =============================================================================

/// Options for transcription
#[derive(Debug, Clone)]
pub struct TranscriptionOptions {
    /// Language code (e.g., "en", "ko") or "auto" for detection
    pub language: Option<String>,
    /// Number of threads to use (0 = auto)
    pub threads: u32,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: Some("auto".to_string()),
            threads: 0,
        }
    }
}

// =============================================================================
// Whisper Engine - Feature-gated Implementation
// =============================================================================

#[cfg(feature = "whisper")]
mod engine_impl {
    use super::*;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Whisper transcription engine
    pub struct WhisperEngine {
        context: WhisperContext,
        model_name: String,
    }

    impl WhisperEngine {
        /// Loads a ggml model file
        pub fn new(model_path: &Path) -> WhisperResult<Self> {
            if !model_path.exists() {
                return Err(WhisperError::ModelNotFound(
                    model_path.to_string_lossy().to_string(),
                ));
            }

            let params = WhisperContextParameters::default();
            let context =
                WhisperContext::new_with_params(model_path.to_str().unwrap_or_default(), params)
                    .map_err(|e| WhisperError::ModelLoadError(e.to_string()))?;

            let model_name = model_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_string();

            Ok(Self {
                context,
                model_name,
            })
        }

        pub fn model_name(&self) -> &str {
            &self.model_name
        }

        /// Transcribes 16kHz mono samples normalized to [-1.0, 1.0]
        pub fn transcribe(
            &self,
            samples: &[f32],
            options: &TranscriptionOptions,
        ) -> WhisperResult<Vec<TranscriptSegment>> {
            let mut state = self
                .context
                .create_state()
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

            if let Some(ref lang) = options.language {
                if lang != "auto" {
                    params.set_language(Some(lang));
                }
            }

            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            if options.threads > 0 {
                params.set_n_threads(options.threads as i32);
            }

            state
                .full(params, samples)
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let num_segments = state
                .full_n_segments()
                .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

            let mut segments = Vec::with_capacity(num_segments as usize);

            for i in 0..num_segments {
                // Segment times are in centiseconds.
                let start = state
                    .full_get_segment_t0(i)
                    .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?
                    as f64
                    / 100.0;
                let text = state
                    .full_get_segment_text(i)
                    .map_err(|e| WhisperError::TranscriptionError(e.to_string()))?;

                segments.push(TranscriptSegment::new(start, text.trim()));
            }

            Ok(segments)
        }
    }
}

#[cfg(feature = "whisper")]
pub use engine_impl::WhisperEngine;

// =============================================================================
// Stub Implementation (when whisper feature is disabled)
// =============================================================================

#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine;

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    /// Creates a new WhisperEngine (stub - returns error)
    pub fn new(_model_path: &Path) -> WhisperResult<Self> {
        Err(WhisperError::FeatureNotEnabled)
    }

    pub fn model_name(&self) -> &str {
        ""
    }

    /// Transcribes audio samples (stub - returns error)
    pub fn transcribe(
        &self,
        _samples: &[f32],
        _options: &TranscriptionOptions,
    ) -> WhisperResult<Vec<TranscriptSegment>> {
        Err(WhisperError::FeatureNotEnabled)
    }
}

// =============================================================================
// Whisper Transcriber
// =============================================================================

/// `Transcriber` that extracts a 16kHz mono WAV with FFmpeg and runs Whisper
/// on a blocking thread.
pub struct WhisperTranscriber {
    engine: Arc<WhisperEngine>,
    options: TranscriptionOptions,
    ffmpeg_path: PathBuf,
    work_dir: PathBuf,
}

impl WhisperTranscriber {
    /// Loads the model and prepares the transcriber.
    ///
    /// Extracted audio is written under `work_dir`.
    pub fn new(
        model_path: &Path,
        ffmpeg_path: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        options: TranscriptionOptions,
    ) -> CoreResult<Self> {
        let engine = WhisperEngine::new(model_path)?;
        info!("Loaded Whisper model '{}'", engine.model_name());

        Ok(Self {
            engine: Arc::new(engine),
            options,
            ffmpeg_path: ffmpeg_path.into(),
            work_dir: work_dir.into(),
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn name(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, source: &MediaSource) -> CoreResult<Vec<TranscriptSegment>> {
        std::fs::create_dir_all(&self.work_dir)?;
        let wav_path = self.work_dir.join("audio.wav");

        let result = self.transcribe_extracted(source, &wav_path).await;
        remove_extracted_audio(&wav_path);
        result
    }
}

impl WhisperTranscriber {
    async fn transcribe_extracted(
        &self,
        source: &MediaSource,
        wav_path: &Path,
    ) -> CoreResult<Vec<TranscriptSegment>> {
        extract_audio_for_transcription(&self.ffmpeg_path, source.path(), wav_path)
            .await
            .map_err(|e| CoreError::DecodeFailed(e.to_string()))?;

        let samples =
            load_audio_samples(wav_path).map_err(|e| CoreError::DecodeFailed(e.to_string()))?;
        if samples.is_empty() {
            return Err(CoreError::DecodeFailed(format!(
                "No audio samples extracted from {}",
                source.path().display()
            )));
        }
        debug!(
            "Transcribing {:.1}s of audio",
            samples.len() as f64 / f64::from(WHISPER_SAMPLE_RATE)
        );

        let engine = Arc::clone(&self.engine);
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || engine.transcribe(&samples, &options))
            .await
            .map_err(|e| CoreError::Internal(format!("Transcription task failed: {}", e)))?
            .map_err(CoreError::from)
    }
}

/// Removes the scratch WAV; a missing file is fine
fn remove_extracted_audio(wav_path: &Path) {
    match std::fs::remove_file(wav_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!("Failed to remove extracted audio: {}", e),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Checks if whisper transcription is available
pub fn is_whisper_available() -> bool {
    cfg!(feature = "whisper")
}

/// Returns the default model directory
pub fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("videoiq")
        .join("models")
        .join("whisper")
}

// =============================================================================
// Tests
// =============================================================================
