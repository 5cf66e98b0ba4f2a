//! Query Resolver
//!
//! Answers a free-text query against the current analysis session. Visual
//! hits come from the frame collection; audio hits come from a verbatim
//! transcript scan first and fall back to semantic search over speech
//! embeddings only when nothing matched verbatim.

mod highlight;

pub use highlight::HighlightedText;

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::embedding::{validate_embedding, TextEncoder};
use crate::index::{Collection, IndexDb, Payload, ScoredRecord, VectorIndex};
use crate::session::AnalysisSession;
use crate::{CoreError, CoreResult, TimeSec};

// =============================================================================
// Configuration
// =============================================================================

/// Result limits per list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryConfig {
    pub visual_top_k: usize,
    pub exact_match_limit: usize,
    pub semantic_top_k: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            visual_top_k: 12,
            exact_match_limit: 5,
            semantic_top_k: 5,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// A keyframe matching the query
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualHit {
    pub timestamp: u32,
    pub image_path: PathBuf,
    pub score: f32,
}

/// Transcript segment containing the query verbatim
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactHit {
    pub timestamp: TimeSec,
    pub text: HighlightedText,
}

/// Transcript segment close to the query in embedding space
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticHit {
    pub timestamp: TimeSec,
    pub text: String,
    pub score: f32,
}

/// Audio results, tagged with the tier that produced them
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "tier", rename_all = "camelCase")]
pub enum AudioMatches {
    /// Verbatim quotes in chronological order. `total` counts every matching
    /// segment, including those beyond the limit.
    Exact { total: usize, hits: Vec<ExactHit> },
    /// Contextually similar segments by descending similarity
    Semantic { hits: Vec<SemanticHit> },
}

impl AudioMatches {
    pub fn is_exact(&self) -> bool {
        matches!(self, AudioMatches::Exact { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            AudioMatches::Exact { hits, .. } => hits.len(),
            AudioMatches::Semantic { hits } => hits.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults {
    pub query: String,
    pub visual: Vec<VisualHit>,
    pub audio: AudioMatches,
}

// =============================================================================
// Resolver
// =============================================================================

pub struct QueryResolver {
    db: Arc<IndexDb>,
    text_encoder: Arc<dyn TextEncoder>,
    config: QueryConfig,
}

impl QueryResolver {
    pub fn new(db: Arc<IndexDb>, text_encoder: Arc<dyn TextEncoder>, config: QueryConfig) -> Self {
        Self {
            db,
            text_encoder,
            config,
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Resolves `query` against `session`.
    ///
    /// A blank query is a no-op and returns `Ok(None)`. A session that is no
    /// longer the store's current one yields `SessionNotReady`.
    pub async fn resolve(
        &self,
        session: &AnalysisSession,
        query: &str,
    ) -> CoreResult<Option<QueryResults>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(None);
        }

        let exact = self.exact_matches(session, query);
        let wants_visual = session.modality().has_video();
        let wants_semantic = exact.is_none();

        // Embedded once, before the store is read.
        let vector = if wants_visual || wants_semantic {
            let target = if wants_visual {
                Collection::Visual
            } else {
                Collection::Speech
            };
            let vector = self.text_encoder.embed_text(query).await?;
            validate_embedding(vector, self.db.dimension(), target)?
        } else {
            Vec::new()
        };

        let mut searches: Vec<(Collection, &[f32], usize)> = Vec::with_capacity(2);
        if wants_visual {
            searches.push((Collection::Visual, vector.as_slice(), self.config.visual_top_k));
        }
        if wants_semantic {
            debug!("No verbatim match for '{}', using semantic search", query);
            searches.push((Collection::Speech, vector.as_slice(), self.config.semantic_top_k));
        }

        // Session check and searches share one snapshot of the store.
        let mut records = match self.db.search_session(session.id(), &searches) {
            Err(CoreError::SessionNotReady) => {
                warn!("Session {} is not the current indexed session", session.id());
                return Err(CoreError::SessionNotReady);
            }
            other => other?.into_iter(),
        };

        let visual = if wants_visual {
            visual_hits(records.next().unwrap_or_default())
        } else {
            Vec::new()
        };

        let audio = match exact {
            Some(exact) => exact,
            None => semantic_matches(records.next().unwrap_or_default()),
        };

        Ok(Some(QueryResults {
            query: query.to_string(),
            visual,
            audio,
        }))
    }

    /// Tier 1. `None` when no segment contains the query.
    fn exact_matches(&self, session: &AnalysisSession, query: &str) -> Option<AudioMatches> {
        let matching: Vec<ExactHit> = session
            .segments()
            .iter()
            .filter_map(|segment| {
                let text = HighlightedText::find(&segment.text, query);
                text.is_match().then(|| ExactHit {
                    timestamp: segment.start,
                    text,
                })
            })
            .collect();

        if matching.is_empty() {
            return None;
        }

        let total = matching.len();
        let hits = matching
            .into_iter()
            .take(self.config.exact_match_limit)
            .collect();
        Some(AudioMatches::Exact { total, hits })
    }
}

fn visual_hits(records: Vec<ScoredRecord>) -> Vec<VisualHit> {
    records
        .into_iter()
        .filter_map(|record| match record.payload {
            Payload::Frame { timestamp, path } => Some(VisualHit {
                timestamp,
                image_path: path,
                score: record.score,
            }),
            other => {
                warn!("Unexpected {} payload in visual collection", other.type_name());
                None
            }
        })
        .collect()
}

/// Tier 2
fn semantic_matches(records: Vec<ScoredRecord>) -> AudioMatches {
    let hits = records
        .into_iter()
        .filter_map(|record| match record.payload {
            Payload::Speech { timestamp, text } => Some(SemanticHit {
                timestamp,
                text,
                score: record.score,
            }),
            other => {
                warn!("Unexpected {} payload in speech collection", other.type_name());
                None
            }
        })
        .collect();

    AudioMatches::Semantic { hits }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::save_session;
    use crate::transcription::TranscriptSegment;
    use crate::MediaSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 4;

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    /// Maps known words onto fixed axes and counts calls
    struct AxisEncoder {
        calls: AtomicUsize,
    }

    impl AxisEncoder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    fn axis(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        if text.contains("money") || text.contains("pricing") {
            vec![1.0, 0.0, 0.0, 0.0]
        } else if text.contains("intro") {
            vec![0.0, 1.0, 0.0, 0.0]
        } else if text.contains("outro") {
            vec![0.0, 0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 0.0, 1.0]
        }
    }

    #[async_trait]
    impl TextEncoder for AxisEncoder {
        fn dimension(&self) -> usize {
            DIM
        }

        async fn embed_text(&self, text: &str) -> CoreResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(axis(text))
        }
    }

    fn segments() -> Vec<TranscriptSegment> {
        vec![
            TranscriptSegment::new(0.0, "intro"),
            TranscriptSegment::new(15.0, "pricing details"),
            TranscriptSegment::new(30.0, "outro"),
        ]
    }

    /// Indexes speech records and `frames` visual records, then marks complete
    fn indexed_session(db: &IndexDb, source: MediaSource, frames: u32) -> AnalysisSession {
        db.reset().unwrap();
        let segs = segments();
        let vectors: Vec<Vec<f32>> = segs.iter().map(|s| axis(&s.text)).collect();
        let payloads: Vec<Payload> = segs
            .iter()
            .map(|s| Payload::speech(s.start, s.text.clone()))
            .collect();
        db.insert_batch(Collection::Speech, &vectors, &payloads).unwrap();

        if frames > 0 {
            let vectors: Vec<Vec<f32>> = (0..frames)
                .map(|i| vec![1.0, i as f32 / 10.0, 0.0, 0.0])
                .collect();
            let payloads: Vec<Payload> = (0..frames)
                .map(|i| Payload::frame(i, format!("/frames/{}.jpg", i)))
                .collect();
            db.insert_batch(Collection::Visual, &vectors, &payloads).unwrap();
        }

        let session = AnalysisSession::complete(source, segs);
        save_session(db, &session).unwrap();
        session
    }

    fn resolver(db: Arc<IndexDb>, encoder: Arc<AxisEncoder>) -> QueryResolver {
        QueryResolver::new(db, encoder, QueryConfig::default())
    }

    // -------------------------------------------------------------------------
    // Exact Tier
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_exact_match_wins_and_skips_semantic_search() {
        let db = Arc::new(IndexDb::in_memory(DIM).unwrap());
        let session = indexed_session(&db, MediaSource::audio_only("/media/a.mp3"), 0);
        let encoder = Arc::new(AxisEncoder::new());
        let resolver = resolver(db, encoder.clone());

        let results = resolver.resolve(&session, "Pricing").await.unwrap().unwrap();

        match &results.audio {
            AudioMatches::Exact { total, hits } => {
                assert_eq!(*total, 1);
                assert_eq!(hits[0].timestamp, 15.0);
                assert_eq!(hits[0].text.to_string(), "**pricing** details");
            }
            other => panic!("expected exact matches, got {:?}", other),
        }
        assert!(results.visual.is_empty());
        // Audio-only with a verbatim hit needs no embedding at all.
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exact_matches_are_limited_and_chronological() {
        let db = Arc::new(IndexDb::in_memory(DIM).unwrap());
        db.reset().unwrap();
        let segs: Vec<TranscriptSegment> = (0..8)
            .map(|i| TranscriptSegment::new(i as f64 * 10.0, format!("step {} of the demo", i)))
            .collect();
        let session = AnalysisSession::complete(MediaSource::audio_only("/media/a.mp3"), segs);
        save_session(&db, &session).unwrap();

        let resolver = resolver(db, Arc::new(AxisEncoder::new()));
        let results = resolver.resolve(&session, "demo").await.unwrap().unwrap();

        match results.audio {
            AudioMatches::Exact { total, hits } => {
                assert_eq!(total, 8);
                let times: Vec<f64> = hits.iter().map(|h| h.timestamp).collect();
                assert_eq!(times, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
            }
            other => panic!("expected exact matches, got {:?}", other),
        }
    }

    // -------------------------------------------------------------------------
    // Semantic Tier
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_semantic_fallback_when_no_verbatim_match() {
        let db = Arc::new(IndexDb::in_memory(DIM).unwrap());
        let session = indexed_session(&db, MediaSource::audio_only("/media/a.mp3"), 0);
        let resolver = resolver(db, Arc::new(AxisEncoder::new()));

        let results = resolver.resolve(&session, "money").await.unwrap().unwrap();

        assert!(!results.audio.is_exact());
        match results.audio {
            AudioMatches::Semantic { hits } => {
                assert_eq!(hits.len(), 3);
                assert_eq!(hits[0].text, "pricing details");
                assert_eq!(hits[0].timestamp, 15.0);
            }
            other => panic!("expected semantic matches, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_embedded_once_for_visual_and_semantic() {
        let db = Arc::new(IndexDb::in_memory(DIM).unwrap());
        let session = indexed_session(&db, MediaSource::audio_video("/media/a.mp4"), 20);
        let encoder = Arc::new(AxisEncoder::new());
        let resolver = resolver(db, encoder.clone());

        let results = resolver.resolve(&session, "money").await.unwrap().unwrap();

        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.visual.len(), 12);
        assert!(!results.audio.is_exact());
    }

    // -------------------------------------------------------------------------
    // Visual
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_visual_hits_ranked_by_similarity() {
        let db = Arc::new(IndexDb::in_memory(DIM).unwrap());
        let session = indexed_session(&db, MediaSource::audio_video("/media/a.mp4"), 5);
        let resolver = resolver(db, Arc::new(AxisEncoder::new()));

        let results = resolver.resolve(&session, "pricing").await.unwrap().unwrap();

        assert_eq!(results.visual.len(), 5);
        assert!(results.visual.windows(2).all(|w| w[0].score >= w[1].score));
        // Frame 0 lies exactly on the query axis.
        assert_eq!(results.visual[0].timestamp, 0);
        assert!(results.audio.is_exact());
    }

    // -------------------------------------------------------------------------
    // Edge Cases
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_blank_query_is_noop() {
        let db = Arc::new(IndexDb::in_memory(DIM).unwrap());
        let session = indexed_session(&db, MediaSource::audio_video("/media/a.mp4"), 3);
        let encoder = Arc::new(AxisEncoder::new());
        let resolver = resolver(db, encoder.clone());

        assert!(resolver.resolve(&session, "   ").await.unwrap().is_none());
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_session_is_rejected() {
        let db = Arc::new(IndexDb::in_memory(DIM).unwrap());
        let session = indexed_session(&db, MediaSource::audio_only("/media/a.mp3"), 0);
        db.reset().unwrap();

        let resolver = resolver(db, Arc::new(AxisEncoder::new()));
        let result = resolver.resolve(&session, "intro").await;
        assert!(matches!(result, Err(CoreError::SessionNotReady)));
    }

    /// Re-indexes another video while the query is being embedded
    struct ReindexingEncoder {
        db: Arc<IndexDb>,
    }

    #[async_trait]
    impl TextEncoder for ReindexingEncoder {
        fn dimension(&self) -> usize {
            DIM
        }

        async fn embed_text(&self, text: &str) -> CoreResult<Vec<f32>> {
            self.db.reset()?;
            self.db.insert_batch(
                Collection::Visual,
                &[axis(text)],
                &[Payload::frame(99, "/other_video/frame.jpg")],
            )?;
            Ok(axis(text))
        }
    }

    #[tokio::test]
    async fn test_reindex_during_query_yields_session_not_ready() {
        let db = Arc::new(IndexDb::in_memory(DIM).unwrap());
        let session = indexed_session(&db, MediaSource::audio_video("/media/a.mp4"), 3);
        let encoder = Arc::new(ReindexingEncoder { db: db.clone() });
        let resolver = QueryResolver::new(db.clone(), encoder, QueryConfig::default());

        let result = resolver.resolve(&session, "intro").await;

        assert!(matches!(result, Err(CoreError::SessionNotReady)));
        assert_eq!(db.count(Collection::Visual).unwrap(), 1);
    }

    #[test]
    fn test_results_serialize_with_tier_tag() {
        let results = QueryResults {
            query: "x".to_string(),
            visual: vec![],
            audio: AudioMatches::Semantic { hits: vec![] },
        };
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["audio"]["tier"], "semantic");
    }
}
