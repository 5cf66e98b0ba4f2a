//! Indexing Orchestrator
//!
//! Runs one analysis at a time against the shared index. The index is wiped
//! before anything else happens, so a failed run leaves an empty, unusable
//! index rather than data from the previous source.

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::{IndexingEvent, IndexingState, ProgressTracker};
use crate::embedding::{validate_embedding, ImageEncoder, TextEncoder};
use crate::index::{Collection, IndexDb, Payload, VectorIndex};
use crate::media::FrameSampler;
use crate::session::{save_session, AnalysisSession};
use crate::transcription::{TranscriptSegment, Transcriber};
use crate::{CoreError, CoreResult, MediaSource};

// =============================================================================
// Configuration
// =============================================================================

/// Tunables of an analysis run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexingConfig {
    /// Seconds between sampled keyframes
    pub frame_interval_secs: u32,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            frame_interval_secs: 1,
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives the ingest sequence for a media source
pub struct IndexingOrchestrator {
    db: Arc<IndexDb>,
    transcriber: Arc<dyn Transcriber>,
    frame_sampler: Arc<dyn FrameSampler>,
    text_encoder: Arc<dyn TextEncoder>,
    image_encoder: Arc<dyn ImageEncoder>,
    config: IndexingConfig,
    /// Serializes analysis runs
    run_lock: Mutex<()>,
}

impl IndexingOrchestrator {
    pub fn new(
        db: Arc<IndexDb>,
        transcriber: Arc<dyn Transcriber>,
        frame_sampler: Arc<dyn FrameSampler>,
        text_encoder: Arc<dyn TextEncoder>,
        image_encoder: Arc<dyn ImageEncoder>,
        config: IndexingConfig,
    ) -> Self {
        Self {
            db,
            transcriber,
            frame_sampler,
            text_encoder,
            image_encoder,
            config,
            run_lock: Mutex::new(()),
        }
    }

    pub fn db(&self) -> &Arc<IndexDb> {
        &self.db
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    /// Indexes `source`, replacing whatever the store held before.
    ///
    /// Returns the new searchable session. On error the store is left empty
    /// (unless the error was raised before the reset), and a `Failed` event
    /// is emitted.
    pub async fn analyze(
        &self,
        source: MediaSource,
        events: Option<UnboundedSender<IndexingEvent>>,
    ) -> CoreResult<AnalysisSession> {
        let _guard = self.run_lock.lock().await;

        let mut tracker = ProgressTracker::new(events);
        let mut state = IndexingState::Idle;

        info!(
            "Starting analysis of {} ({})",
            source.path().display(),
            source.modality()
        );

        match self.run(&source, &mut state, &mut tracker).await {
            Ok(session) => Ok(session),
            Err(err) => {
                error!("Analysis failed in state {}: {}", state, err);

                // Anything past Idle may have touched the store.
                if state != IndexingState::Idle {
                    if let Err(wipe_err) = self.db.reset() {
                        warn!("Failed to wipe index after failed run: {}", wipe_err);
                    }
                }

                if state.transition_to(IndexingState::Failed).is_ok() {
                    tracker.state_changed(IndexingState::Failed);
                }
                tracker.emit(IndexingEvent::Failed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        source: &MediaSource,
        state: &mut IndexingState,
        tracker: &mut ProgressTracker,
    ) -> CoreResult<AnalysisSession> {
        self.preflight(source)?;

        // Resetting
        enter(state, tracker, IndexingState::Resetting)?;
        tracker.report(IndexingState::Resetting, 0, 1, "Resetting index");
        self.db.reset()?;
        tracker.report(IndexingState::Resetting, 1, 1, "Index reset");

        // Transcribing
        enter(state, tracker, IndexingState::Transcribing)?;
        tracker.report(IndexingState::Transcribing, 0, 1, "Transcribing audio");
        let segments = self.transcribe(source, tracker).await?;
        tracker.report(
            IndexingState::Transcribing,
            1,
            1,
            format!("Transcribed {} segments", segments.len()),
        );

        // EmbeddingSpeech
        let mut speech_records = 0;
        if !segments.is_empty() {
            enter(state, tracker, IndexingState::EmbeddingSpeech)?;
            speech_records = self.embed_speech(&segments, tracker).await?;
        }

        // EmbeddingVisual
        let mut visual_records = 0;
        if source.modality().has_video() {
            enter(state, tracker, IndexingState::EmbeddingVisual)?;
            visual_records = self.embed_frames(source, tracker).await?;
        } else {
            info!("Audio-only source, skipping visual analysis");
        }

        // Complete: the session row is the readiness flag.
        let session = AnalysisSession::complete(source.clone(), segments);
        save_session(&self.db, &session)?;
        enter(state, tracker, IndexingState::Complete)?;

        info!(
            "Analysis complete: {} speech records, {} visual records",
            speech_records, visual_records
        );
        tracker.emit(IndexingEvent::Completed {
            session_id: session.id().to_string(),
            speech_records,
            visual_records,
        });
        tracker.complete("Analysis complete");

        Ok(session)
    }

    /// Checks that can fail without touching the store
    fn preflight(&self, source: &MediaSource) -> CoreResult<()> {
        if self.config.frame_interval_secs == 0 {
            return Err(CoreError::ValidationError(
                "Frame interval must be at least one second".to_string(),
            ));
        }

        let dimension = self.db.dimension();
        if self.text_encoder.dimension() != dimension {
            return Err(CoreError::DimensionMismatch {
                collection: Collection::Speech.name().to_string(),
                expected: dimension,
                actual: self.text_encoder.dimension(),
            });
        }
        if source.modality().has_video() && self.image_encoder.dimension() != dimension {
            return Err(CoreError::DimensionMismatch {
                collection: Collection::Visual.name().to_string(),
                expected: dimension,
                actual: self.image_encoder.dimension(),
            });
        }

        source.ensure_readable()
    }

    /// Runs the transcriber and applies the empty/failed transcript policy
    async fn transcribe(
        &self,
        source: &MediaSource,
        tracker: &ProgressTracker,
    ) -> CoreResult<Vec<TranscriptSegment>> {
        let raw = match self.transcriber.transcribe(source).await {
            Ok(segments) => segments,
            Err(err @ CoreError::DecodeFailed(_)) => return Err(err),
            Err(err) if source.is_audio_only() => return Err(err),
            Err(err) => {
                let message = format!(
                    "Transcription with {} failed, continuing with visual index only: {}",
                    self.transcriber.name(),
                    err
                );
                warn!("{}", message);
                tracker.warn(message);
                Vec::new()
            }
        };

        let total = raw.len();
        let segments: Vec<TranscriptSegment> = raw
            .into_iter()
            .filter(|segment| {
                let keep = segment.is_indexable();
                if !keep {
                    warn!("Dropping unindexable segment at {}s", segment.start);
                }
                keep
            })
            .collect();

        if segments.len() < total {
            tracker.warn(format!(
                "Dropped {} blank or invalid transcript segments",
                total - segments.len()
            ));
        }

        if segments.is_empty() {
            if source.is_audio_only() {
                return Err(CoreError::NothingIndexable(
                    "Audio-only source produced no transcript".to_string(),
                ));
            }
            let message = "Empty transcript, speech collection stays empty";
            warn!("{}", message);
            tracker.warn(message);
        }

        Ok(segments)
    }

    async fn embed_speech(
        &self,
        segments: &[TranscriptSegment],
        tracker: &mut ProgressTracker,
    ) -> CoreResult<usize> {
        let total = segments.len();
        let dimension = self.db.dimension();
        let mut vectors = Vec::with_capacity(total);
        let mut payloads = Vec::with_capacity(total);

        for (i, segment) in segments.iter().enumerate() {
            let vector = self.text_encoder.embed_text(&segment.text).await?;
            vectors.push(validate_embedding(vector, dimension, Collection::Speech)?);
            payloads.push(Payload::speech(segment.start, segment.text.clone()));

            tracker.report(
                IndexingState::EmbeddingSpeech,
                i + 1,
                total,
                format!("Embedded segment {}/{}", i + 1, total),
            );
        }

        self.db
            .insert_batch(Collection::Speech, &vectors, &payloads)
    }

    async fn embed_frames(
        &self,
        source: &MediaSource,
        tracker: &mut ProgressTracker,
    ) -> CoreResult<usize> {
        let interval = self.config.frame_interval_secs;
        let frames = match self.frame_sampler.sample(source, interval).await {
            Ok(frames) => frames,
            Err(err) => {
                let message = format!("Frame sampling failed, treating as zero frames: {}", err);
                warn!("{}", message);
                tracker.warn(message);
                Vec::new()
            }
        };

        if frames.is_empty() {
            info!("No keyframes sampled");
            tracker.report(IndexingState::EmbeddingVisual, 1, 1, "No keyframes");
            return Ok(0);
        }

        let total = frames.len();
        let dimension = self.db.dimension();
        let mut vectors = Vec::with_capacity(total);
        let mut payloads = Vec::with_capacity(total);

        for (i, frame) in frames.iter().enumerate() {
            let vector = self.image_encoder.embed_image(&frame.image_path).await?;
            vectors.push(validate_embedding(vector, dimension, Collection::Visual)?);
            payloads.push(Payload::frame(frame.timestamp, frame.image_path.clone()));

            tracker.report(
                IndexingState::EmbeddingVisual,
                i + 1,
                total,
                format!("Embedded frame {}/{}", i + 1, total),
            );
        }

        self.db
            .insert_batch(Collection::Visual, &vectors, &payloads)
    }
}

/// Checked transition, logged and forwarded to the event stream
fn enter(
    state: &mut IndexingState,
    tracker: &ProgressTracker,
    next: IndexingState,
) -> CoreResult<()> {
    state.transition_to(next)?;
    info!("Indexing state: {}", next);
    tracker.state_changed(next);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
