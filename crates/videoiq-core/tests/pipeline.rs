//! End-to-end ingest and query against a file-backed index.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use videoiq_core::embedding::{ImageEncoder, TextEncoder};
use videoiq_core::index::{Collection, IndexDb, VectorIndex};
use videoiq_core::media::{FrameSampler, Keyframe};
use videoiq_core::pipeline::{IndexingConfig, IndexingEvent, IndexingOrchestrator, IndexingState};
use videoiq_core::query::{AudioMatches, QueryConfig, QueryResolver};
use videoiq_core::session::load_session;
use videoiq_core::transcription::{TranscriptSegment, Transcriber};
use videoiq_core::{CoreError, CoreResult, MediaSource};

const DIM: usize = 16;

// -----------------------------------------------------------------------------
// Fake collaborators
// -----------------------------------------------------------------------------

struct ScriptedTranscriber(Vec<TranscriptSegment>);

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn transcribe(&self, _source: &MediaSource) -> CoreResult<Vec<TranscriptSegment>> {
        Ok(self.0.clone())
    }
}

/// Emits `duration / interval + 1` keyframes, like ffmpeg's fps filter
struct ClockSampler {
    duration_secs: u32,
}

#[async_trait]
impl FrameSampler for ClockSampler {
    async fn sample(&self, _source: &MediaSource, interval: u32) -> CoreResult<Vec<Keyframe>> {
        let count = (self.duration_secs / interval + 1) as usize;
        Ok((0..count)
            .map(|i| Keyframe::new(i, interval, format!("/frames/frame_{:06}.jpg", i + 1)))
            .collect())
    }
}

fn bucket_embed(input: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = 0.5;
    for word in input.to_lowercase().split_whitespace() {
        let bucket = word.bytes().map(|b| b as usize).sum::<usize>() % DIM;
        v[bucket] += 1.0;
    }
    v
}

struct BucketEncoder;

#[async_trait]
impl TextEncoder for BucketEncoder {
    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed_text(&self, text: &str) -> CoreResult<Vec<f32>> {
        Ok(bucket_embed(text))
    }
}

#[async_trait]
impl ImageEncoder for BucketEncoder {
    fn dimension(&self) -> usize {
        DIM
    }

    async fn embed_image(&self, image_path: &Path) -> CoreResult<Vec<f32>> {
        Ok(bucket_embed(&image_path.to_string_lossy()))
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn talk_segments() -> Vec<TranscriptSegment> {
    vec![
        TranscriptSegment::new(0.0, "intro"),
        TranscriptSegment::new(15.0, "pricing details"),
        TranscriptSegment::new(30.0, "outro"),
    ]
}

fn orchestrator(db: Arc<IndexDb>, segments: Vec<TranscriptSegment>) -> IndexingOrchestrator {
    let encoder = Arc::new(BucketEncoder);
    IndexingOrchestrator::new(
        db,
        Arc::new(ScriptedTranscriber(segments)),
        Arc::new(ClockSampler { duration_secs: 40 }),
        encoder.clone(),
        encoder,
        IndexingConfig::default(),
    )
}

fn media_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really media").unwrap();
    path
}

// -----------------------------------------------------------------------------
// Scenarios
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_audio_video_ingest_then_query() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(IndexDb::create(dir.path().join("index.db"), DIM).unwrap());
    let orch = orchestrator(db.clone(), talk_segments());

    let source = MediaSource::audio_video(media_file(dir.path(), "talk.mp4"));
    let session = orch.analyze(source, None).await.unwrap();

    assert_eq!(db.count(Collection::Speech).unwrap(), 3);
    assert_eq!(db.count(Collection::Visual).unwrap(), 41);

    let all_frames = db
        .search(Collection::Visual, &bucket_embed("frame"), 100)
        .unwrap();
    let mut timestamps: Vec<u32> = all_frames
        .iter()
        .map(|r| r.payload.timestamp() as u32)
        .collect();
    timestamps.sort_unstable();
    assert_eq!(timestamps, (0..=40).collect::<Vec<u32>>());

    let resolver = QueryResolver::new(db.clone(), Arc::new(BucketEncoder), QueryConfig::default());
    let results = resolver.resolve(&session, "pricing").await.unwrap().unwrap();

    match &results.audio {
        AudioMatches::Exact { total, hits } => {
            assert_eq!(*total, 1);
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].timestamp, 15.0);
        }
        other => panic!("expected a verbatim hit, got {:?}", other),
    }
    assert_eq!(results.visual.len(), 12);
}

#[tokio::test]
async fn test_audio_only_empty_transcript_fails_with_empty_index() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(IndexDb::create(dir.path().join("index.db"), DIM).unwrap());

    // A previous successful run must not survive the failed one.
    orchestrator(db.clone(), talk_segments())
        .analyze(MediaSource::audio_video(media_file(dir.path(), "old.mp4")), None)
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = orchestrator(db.clone(), Vec::new())
        .analyze(MediaSource::audio_only(media_file(dir.path(), "silence.mp3")), Some(tx))
        .await;

    assert!(matches!(result, Err(CoreError::NothingIndexable(_))));
    assert_eq!(db.count(Collection::Speech).unwrap(), 0);
    assert_eq!(db.count(Collection::Visual).unwrap(), 0);
    assert!(load_session(&db).unwrap().is_none());

    let mut saw_failed_state = false;
    let mut saw_complete_state = false;
    while let Ok(event) = rx.try_recv() {
        if let IndexingEvent::StateChanged { state } = event {
            saw_failed_state |= state == IndexingState::Failed;
            saw_complete_state |= state == IndexingState::Complete;
        }
    }
    assert!(saw_failed_state);
    assert!(!saw_complete_state);
}

#[tokio::test]
async fn test_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("index.db");

    let session_id = {
        let db = Arc::new(IndexDb::create(&db_path, DIM).unwrap());
        let orch = orchestrator(db, talk_segments());
        let source = MediaSource::audio_only(media_file(dir.path(), "talk.wav"));
        let session = orch.analyze(source, None).await.unwrap();
        session.id().to_string()
    };

    let db = Arc::new(IndexDb::open(&db_path, DIM).unwrap());
    let session = load_session(&db).unwrap().expect("session persisted");
    assert_eq!(session.id(), session_id);
    assert_eq!(session.segments().len(), 3);
    assert_eq!(session.transcript_text(), "intro pricing details outro");

    let resolver = QueryResolver::new(db.clone(), Arc::new(BucketEncoder), QueryConfig::default());
    let results = resolver.resolve(&session, "budget").await.unwrap().unwrap();
    match results.audio {
        AudioMatches::Semantic { hits } => assert_eq!(hits.len(), 3),
        other => panic!("expected semantic fallback, got {:?}", other),
    }
    assert!(results.visual.is_empty());
}

#[tokio::test]
async fn test_reopen_with_other_dimension_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("index.db");
    drop(IndexDb::create(&db_path, DIM).unwrap());

    let err = match IndexDb::open(&db_path, DIM * 2) {
        Ok(_) => panic!("dimension change must be rejected"),
        Err(err) => err,
    };
    assert!(err.is_configuration_error());
}

#[tokio::test]
async fn test_reset_twice_leaves_empty_collections() {
    let dir = tempfile::tempdir().unwrap();
    let db = IndexDb::create(dir.path().join("index.db"), DIM).unwrap();
    db.reset().unwrap();
    db.reset().unwrap();

    for collection in Collection::ALL {
        assert_eq!(db.count(collection).unwrap(), 0);
        assert!(db.search(collection, &bucket_embed("x"), 10).unwrap().is_empty());
    }
    assert_eq!(db.dimension(), DIM);
}
