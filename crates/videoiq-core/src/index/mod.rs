//! Vector Index Module
//!
//! Per-modality vector collections ("speech", "visual") with full reset,
//! atomic batch insert and top-K cosine search. The SQLite-backed `IndexDb`
//! is the persistent implementation.

pub mod db;
pub mod payload;
pub mod vector;

pub use db::{IndexDb, IndexStats};
pub use payload::Payload;
pub use vector::cosine_similarity;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

// =============================================================================
// Collections
// =============================================================================

/// A named partition of the index holding records of one modality
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Transcript segments embedded with the text encoder
    Speech,
    /// Keyframes embedded with the image encoder
    Visual,
}

impl Collection {
    /// Every collection the index maintains
    pub const ALL: [Collection; 2] = [Collection::Speech, Collection::Visual];

    /// Collection name as stored
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Speech => "speech",
            Collection::Visual => "visual",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Collection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speech" => Ok(Collection::Speech),
            "visual" => Ok(Collection::Visual),
            other => Err(CoreError::CollectionNotFound(other.to_string())),
        }
    }
}

// =============================================================================
// Vector Index Trait
// =============================================================================

/// A search hit: the stored payload and its similarity to the query
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRecord {
    /// Store-assigned record ID (insertion order)
    pub id: i64,
    /// Cosine similarity in [-1.0, 1.0]
    pub score: f32,
    /// Record metadata
    pub payload: Payload,
}

/// Storage contract for per-modality vector collections.
///
/// All collections share one dimensionality fixed when the store is created.
pub trait VectorIndex: Send + Sync {
    /// Vector length every collection accepts
    fn dimension(&self) -> usize;

    /// Destroys all records and recreates every collection empty.
    ///
    /// Idempotent, and valid on a store that has never been populated.
    fn reset(&self) -> CoreResult<()>;

    /// Appends `vectors[i]` with `payloads[i]` for every `i`, all or nothing.
    ///
    /// Returns the number of records inserted.
    fn insert_batch(
        &self,
        collection: Collection,
        vectors: &[Vec<f32>],
        payloads: &[Payload],
    ) -> CoreResult<usize>;

    /// Returns up to `top_k` records by descending cosine similarity.
    ///
    /// Ties are broken by ascending timestamp, then insertion order.
    /// An empty collection yields an empty result.
    fn search(
        &self,
        collection: Collection,
        query: &[f32],
        top_k: usize,
    ) -> CoreResult<Vec<ScoredRecord>>;

    /// Number of records in a collection
    fn count(&self, collection: Collection) -> CoreResult<usize>;
}
