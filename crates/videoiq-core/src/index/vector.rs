//! Vector math and BLOB encoding for stored embeddings.

use crate::{CoreError, CoreResult};

/// Cosine similarity of two equal-length vectors.
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Serializes a vector as little-endian f32 bytes
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Deserializes a little-endian f32 BLOB of exactly `dimension` values
pub fn decode_vector(bytes: &[u8], dimension: usize) -> CoreResult<Vec<f32>> {
    if bytes.len() != dimension * 4 {
        return Err(CoreError::IndexError(format!(
            "Corrupt vector: {} bytes for dimension {}",
            bytes.len(),
            dimension
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
