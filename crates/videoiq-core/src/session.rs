//! Analysis Session Module
//!
//! The result of one completed ingest run: which media was indexed and its
//! transcript. Persisted next to the vectors so a session can be queried
//! after the process that built it exits.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::index::IndexDb;
use crate::transcription::TranscriptSegment;
use crate::{CoreError, CoreResult, MediaSource, Modality, SessionId};

// =============================================================================
// Analysis Session
// =============================================================================

/// A searchable analysis of one media source.
///
/// Only the orchestrator creates sessions, at `Complete`. A session stays
/// valid until the next reset of the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSession {
    id: SessionId,
    source: MediaSource,
    segments: Vec<TranscriptSegment>,
    completed_at: DateTime<Utc>,
}

impl AnalysisSession {
    /// Creates a completed session with a fresh ID
    pub(crate) fn complete(source: MediaSource, segments: Vec<TranscriptSegment>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            source,
            segments,
            completed_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn modality(&self) -> Modality {
        self.source.modality()
    }

    /// Transcript segments in chronological order
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Returns the full transcript, segments joined by a single space
    pub fn transcript_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// =============================================================================
// Session Database Operations
// =============================================================================

/// Persists a session as the store's current one.
///
/// The session row and its transcript are written in a single transaction;
/// a crash leaves either the previous state or the complete new session.
pub fn save_session(db: &IndexDb, session: &AnalysisSession) -> CoreResult<()> {
    let mut conn = db.connection()?;
    let tx = conn
        .transaction()
        .map_err(|e| CoreError::IndexError(format!("Failed to begin session save: {}", e)))?;

    tx.execute_batch("DELETE FROM session; DELETE FROM transcript_segments;")
        .map_err(|e| CoreError::IndexError(format!("Failed to clear session: {}", e)))?;

    tx.execute(
        "INSERT INTO session (id, source_path, modality, completed_at) VALUES (?, ?, ?, ?)",
        params![
            session.id,
            session.source.path().to_string_lossy().to_string(),
            session.source.modality().as_str(),
            session.completed_at.to_rfc3339(),
        ],
    )
    .map_err(|e| CoreError::IndexError(format!("Failed to save session: {}", e)))?;

    {
        let mut stmt = tx
            .prepare("INSERT INTO transcript_segments (seq, start_sec, text) VALUES (?, ?, ?)")
            .map_err(|e| CoreError::IndexError(format!("Failed to prepare segment insert: {}", e)))?;

        for (seq, segment) in session.segments.iter().enumerate() {
            stmt.execute(params![seq as i64, segment.start, segment.text])
                .map_err(|e| {
                    CoreError::IndexError(format!("Failed to save transcript segment: {}", e))
                })?;
        }
    }

    tx.commit()
        .map_err(|e| CoreError::IndexError(format!("Failed to commit session: {}", e)))?;

    Ok(())
}

/// Loads the store's current session, if an analysis has completed
pub fn load_session(db: &IndexDb) -> CoreResult<Option<AnalysisSession>> {
    let conn = db.connection()?;

    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT id, source_path, modality, completed_at FROM session LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()
        .map_err(|e| CoreError::IndexError(format!("Failed to load session: {}", e)))?;

    let Some((id, source_path, modality, completed_at)) = row else {
        return Ok(None);
    };

    let modality: Modality = modality.parse()?;
    let completed_at = DateTime::parse_from_rfc3339(&completed_at)
        .map_err(|e| CoreError::IndexError(format!("Invalid session timestamp: {}", e)))?
        .with_timezone(&Utc);

    let mut stmt = conn
        .prepare("SELECT start_sec, text FROM transcript_segments ORDER BY seq")
        .map_err(|e| CoreError::IndexError(format!("Failed to prepare transcript query: {}", e)))?;

    let segments = stmt
        .query_map([], |row| {
            Ok(TranscriptSegment::new(
                row.get::<_, f64>(0)?,
                row.get::<_, String>(1)?,
            ))
        })
        .map_err(|e| CoreError::IndexError(format!("Failed to query transcript: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CoreError::IndexError(format!("Failed to read transcript: {}", e)))?;

    Ok(Some(AnalysisSession {
        id,
        source: MediaSource::new(PathBuf::from(source_path), modality),
        segments,
        completed_at,
    }))
}

/// Returns true if `session_id` names the store's current complete session
pub fn is_current_session(db: &IndexDb, session_id: &str) -> CoreResult<bool> {
    let conn = db.connection()?;
    session_row_exists(&conn, session_id)
}

pub(crate) fn session_row_exists(conn: &Connection, session_id: &str) -> CoreResult<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM session WHERE id = ?",
            [session_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| CoreError::IndexError(format!("Failed to check session: {}", e)))?;

    Ok(found.is_some())
}

// =============================================================================
// Tests
// =============================================================================
