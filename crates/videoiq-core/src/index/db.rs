//! Index Database Module
//!
//! SQLite database holding the vector collections and the current analysis
//! session. One file per data directory; contents survive process restarts.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::vector::{cosine_similarity, decode_vector, encode_vector};
use super::{Collection, Payload, ScoredRecord, VectorIndex};
use crate::session::session_row_exists;
use crate::{CoreError, CoreResult};

// =============================================================================
// Index Database
// =============================================================================

/// SQLite-backed vector store.
///
/// The connection sits behind a mutex, so a search never observes a reset or
/// batch insert that is still in flight.
pub struct IndexDb {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl IndexDb {
    /// Creates (or re-opens) an index database at the specified path.
    ///
    /// Collections are bootstrapped on first use. Re-opening a store whose
    /// collections were created with another dimension is an error.
    pub fn create<P: AsRef<Path>>(path: P, dimension: usize) -> CoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| CoreError::IndexError(format!("Failed to create index database: {}", e)))?;

        Self::with_connection(conn, dimension)
    }

    /// Opens an existing index database
    pub fn open<P: AsRef<Path>>(path: P, dimension: usize) -> CoreResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CoreError::FileNotFound(path.to_string_lossy().to_string()));
        }

        let conn = Connection::open(path)
            .map_err(|e| CoreError::IndexError(format!("Failed to open index database: {}", e)))?;

        Self::with_connection(conn, dimension)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory(dimension: usize) -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CoreError::IndexError(format!("Failed to create in-memory database: {}", e))
        })?;

        Self::with_connection(conn, dimension)
    }

    fn with_connection(conn: Connection, dimension: usize) -> CoreResult<Self> {
        if dimension == 0 {
            return Err(CoreError::ValidationError(
                "Vector dimension must be greater than zero".to_string(),
            ));
        }

        let db = Self {
            conn: Mutex::new(conn),
            dimension,
        };
        db.init_schema()?;
        db.ensure_collections()?;
        Ok(db)
    }

    /// Initializes the database schema
    fn init_schema(&self) -> CoreResult<()> {
        self.connection()?
            .execute_batch(
                r#"
                -- Collections: one row per modality, dimension fixed at creation
                CREATE TABLE IF NOT EXISTS collections (
                    name TEXT PRIMARY KEY,
                    dimension INTEGER NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                -- Records: vector + JSON payload
                CREATE TABLE IF NOT EXISTS records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    collection TEXT NOT NULL,
                    timestamp REAL NOT NULL,
                    payload TEXT NOT NULL,
                    vector BLOB NOT NULL
                );

                -- Session: at most one completed analysis
                CREATE TABLE IF NOT EXISTS session (
                    id TEXT PRIMARY KEY,
                    source_path TEXT NOT NULL,
                    modality TEXT NOT NULL,
                    completed_at TEXT NOT NULL
                );

                -- Transcript of the current session, in chronological order
                CREATE TABLE IF NOT EXISTS transcript_segments (
                    seq INTEGER PRIMARY KEY,
                    start_sec REAL NOT NULL,
                    text TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, id);
                "#,
            )
            .map_err(|e| CoreError::IndexError(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Creates missing collections and validates the dimension of existing ones
    fn ensure_collections(&self) -> CoreResult<()> {
        let conn = self.connection()?;

        for collection in Collection::ALL {
            let stored: Option<i64> = conn
                .query_row(
                    "SELECT dimension FROM collections WHERE name = ?",
                    [collection.name()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| CoreError::IndexError(format!("Failed to read collection: {}", e)))?;

            match stored {
                Some(dimension) if dimension as usize != self.dimension => {
                    return Err(CoreError::DimensionMismatch {
                        collection: collection.name().to_string(),
                        expected: dimension as usize,
                        actual: self.dimension,
                    });
                }
                Some(_) => {}
                None => {
                    conn.execute(
                        "INSERT INTO collections (name, dimension) VALUES (?, ?)",
                        params![collection.name(), self.dimension as i64],
                    )
                    .map_err(|e| {
                        CoreError::IndexError(format!("Failed to create collection: {}", e))
                    })?;
                    debug!("Created collection '{}'", collection);
                }
            }
        }

        Ok(())
    }

    /// Gets the underlying connection (for module-level access)
    pub(crate) fn connection(&self) -> CoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Internal("Index database lock poisoned".to_string()))
    }

    /// Dimension stored for a collection, if it exists
    fn collection_dimension(conn: &Connection, collection: Collection) -> CoreResult<usize> {
        let stored: Option<i64> = conn
            .query_row(
                "SELECT dimension FROM collections WHERE name = ?",
                [collection.name()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CoreError::IndexError(format!("Failed to read collection: {}", e)))?;

        stored
            .map(|d| d as usize)
            .ok_or_else(|| CoreError::CollectionNotFound(collection.name().to_string()))
    }

    /// Brute-force ranked search on an already locked connection
    fn search_in(
        conn: &Connection,
        collection: Collection,
        query: &[f32],
        top_k: usize,
    ) -> CoreResult<Vec<ScoredRecord>> {
        let dimension = Self::collection_dimension(conn, collection)?;

        if query.len() != dimension {
            return Err(CoreError::DimensionMismatch {
                collection: collection.name().to_string(),
                expected: dimension,
                actual: query.len(),
            });
        }

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = conn
            .prepare("SELECT id, payload, vector FROM records WHERE collection = ? ORDER BY id")
            .map_err(|e| CoreError::IndexError(format!("Failed to prepare search: {}", e)))?;

        let rows = stmt
            .query_map([collection.name()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .map_err(|e| CoreError::IndexError(format!("Failed to query records: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::IndexError(format!("Failed to read records: {}", e)))?;

        let mut scored = Vec::with_capacity(rows.len());
        for (id, payload_json, blob) in rows {
            let vector = decode_vector(&blob, dimension)?;
            let payload: Payload = serde_json::from_str(&payload_json)?;
            scored.push(ScoredRecord {
                id,
                score: cosine_similarity(query, &vector),
                payload,
            });
        }

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.payload.timestamp().total_cmp(&b.payload.timestamp()))
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    /// Runs `searches` for the session `session_id` in one read transaction.
    ///
    /// The session check and every search see the same snapshot, so a reset
    /// or insert from another task or process can never leak into the
    /// results. Fails with `SessionNotReady` when the session is gone.
    pub fn search_session(
        &self,
        session_id: &str,
        searches: &[(Collection, &[f32], usize)],
    ) -> CoreResult<Vec<Vec<ScoredRecord>>> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::IndexError(format!("Failed to begin search: {}", e)))?;

        if !session_row_exists(&tx, session_id)? {
            return Err(CoreError::SessionNotReady);
        }

        let results = searches
            .iter()
            .map(|(collection, query, top_k)| Self::search_in(&tx, *collection, query, *top_k))
            .collect::<CoreResult<Vec<_>>>()?;

        tx.commit()
            .map_err(|e| CoreError::IndexError(format!("Failed to end search: {}", e)))?;

        Ok(results)
    }

    /// Gets statistics about the index
    pub fn get_stats(&self) -> CoreResult<IndexStats> {
        let conn = self.connection()?;

        let count = |sql: &str, label: &str| -> CoreResult<usize> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as usize)
                .map_err(|e| CoreError::IndexError(format!("Failed to get {} count: {}", label, e)))
        };

        Ok(IndexStats {
            speech_records: count(
                "SELECT COUNT(*) FROM records WHERE collection = 'speech'",
                "speech",
            )?,
            visual_records: count(
                "SELECT COUNT(*) FROM records WHERE collection = 'visual'",
                "visual",
            )?,
            transcript_segments: count("SELECT COUNT(*) FROM transcript_segments", "segment")?,
            has_session: count("SELECT COUNT(*) FROM session", "session")? > 0,
        })
    }
}

// =============================================================================
// Vector Index Implementation
// =============================================================================

impl VectorIndex for IndexDb {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn reset(&self) -> CoreResult<()> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::IndexError(format!("Failed to begin reset: {}", e)))?;

        tx.execute_batch(
            r#"
            DELETE FROM records;
            DELETE FROM collections;
            DELETE FROM session;
            DELETE FROM transcript_segments;
            "#,
        )
        .map_err(|e| CoreError::IndexError(format!("Failed to wipe index: {}", e)))?;

        for collection in Collection::ALL {
            tx.execute(
                "INSERT INTO collections (name, dimension) VALUES (?, ?)",
                params![collection.name(), self.dimension as i64],
            )
            .map_err(|e| CoreError::IndexError(format!("Failed to recreate collection: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| CoreError::IndexError(format!("Failed to commit reset: {}", e)))?;

        info!("Index reset: collections recreated empty");
        Ok(())
    }

    fn insert_batch(
        &self,
        collection: Collection,
        vectors: &[Vec<f32>],
        payloads: &[Payload],
    ) -> CoreResult<usize> {
        if vectors.len() != payloads.len() {
            return Err(CoreError::BatchLengthMismatch {
                vectors: vectors.len(),
                payloads: payloads.len(),
            });
        }

        if let Some(payload) = payloads.iter().find(|p| p.collection() != collection) {
            return Err(CoreError::PayloadMismatch {
                collection: collection.name().to_string(),
                payload_type: payload.type_name().to_string(),
            });
        }

        let mut conn = self.connection()?;
        let dimension = Self::collection_dimension(&conn, collection)?;

        if let Some(vector) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(CoreError::DimensionMismatch {
                collection: collection.name().to_string(),
                expected: dimension,
                actual: vector.len(),
            });
        }

        if vectors.is_empty() {
            return Ok(0);
        }

        let tx = conn
            .transaction()
            .map_err(|e| CoreError::IndexError(format!("Failed to begin insert: {}", e)))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO records (collection, timestamp, payload, vector) VALUES (?, ?, ?, ?)",
                )
                .map_err(|e| CoreError::IndexError(format!("Failed to prepare insert: {}", e)))?;

            for (vector, payload) in vectors.iter().zip(payloads) {
                let payload_json = serde_json::to_string(payload)?;
                stmt.execute(params![
                    collection.name(),
                    payload.timestamp(),
                    payload_json,
                    encode_vector(vector),
                ])
                .map_err(|e| CoreError::IndexError(format!("Failed to insert record: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| CoreError::IndexError(format!("Failed to commit insert: {}", e)))?;

        debug!("Inserted {} records into '{}'", vectors.len(), collection);
        Ok(vectors.len())
    }

    fn search(
        &self,
        collection: Collection,
        query: &[f32],
        top_k: usize,
    ) -> CoreResult<Vec<ScoredRecord>> {
        let conn = self.connection()?;
        Self::search_in(&conn, collection, query, top_k)
    }

    fn count(&self, collection: Collection) -> CoreResult<usize> {
        let conn = self.connection()?;
        Self::collection_dimension(&conn, collection)?;

        conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?",
            [collection.name()],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n as usize)
        .map_err(|e| CoreError::IndexError(format!("Failed to count records: {}", e)))
    }
}

// =============================================================================
// Index Statistics
// =============================================================================

/// Statistics about the index database
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub speech_records: usize,
    pub visual_records: usize,
    pub transcript_segments: usize,
    pub has_session: bool,
}

// =============================================================================
// Tests
// =============================================================================
