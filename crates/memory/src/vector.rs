//! Vector similarity utilities.
//!
//! Pure-Rust brute-force ranking used by both semantic memory backends:
//! - Cosine similarity
//! - Top-k ranking of memory items
//! - Little-endian f32 blob encoding for SQLite storage

use localmind_core::error::MemoryError;
use localmind_core::memory::MemoryItem;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank items by cosine similarity to `query` and keep the best `k`.
///
/// Each returned item has `score` set to its similarity. Ties keep insertion
/// order, so older items win.
pub fn rank_by_similarity(items: Vec<MemoryItem>, query: &[f32], k: usize) -> Vec<MemoryItem> {
    let mut scored: Vec<MemoryItem> = items
        .into_iter()
        .filter(|item| !item.embedding.is_empty())
        .map(|mut item| {
            item.score = cosine_similarity(&item.embedding, query);
            item
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

/// Reject a vector whose length differs from the store's established dimension.
pub fn check_dimension(expected: Option<usize>, actual: usize) -> Result<(), MemoryError> {
    match expected {
        Some(expected) if expected != actual => {
            Err(MemoryError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}

/// Serialize an embedding vector to bytes.
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding blob. Trailing partial chunks are ignored.
pub fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, embedding: Vec<f32>) -> MemoryItem {
        let mut item = MemoryItem::new(format!("Content for {id}"), embedding);
        item.id = id.into();
        item
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn ranking_orders_by_similarity() {
        let query = vec![1.0, 0.0, 0.0];
        let items = vec![
            item("a", vec![0.0, 1.0, 0.0]),
            item("b", vec![1.0, 0.0, 0.0]),
            item("c", vec![0.5, 0.5, 0.0]),
        ];

        let ranked = rank_by_similarity(items, &query, 10);
        let ids: Vec<_> = ranked.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
        assert!((ranked[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ranking_respects_k_and_skips_unembedded() {
        let query = vec![1.0, 0.0];
        let mut items: Vec<_> = (0..10)
            .map(|i| item(&format!("e{i}"), vec![1.0, i as f32 * 0.1]))
            .collect();
        items.push(item("bare", vec![]));

        let ranked = rank_by_similarity(items, &query, 3);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|i| i.id != "bare"));
    }

    #[test]
    fn dimension_check() {
        assert!(check_dimension(None, 3).is_ok());
        assert!(check_dimension(Some(3), 3).is_ok());
        assert!(matches!(
            check_dimension(Some(3), 4),
            Err(MemoryError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }

    #[test]
    fn blob_encoding_is_little_endian_f32() {
        let blob = embedding_to_blob(&[1.0, -0.5]);
        assert_eq!(blob.len(), 8);
        assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
        assert_eq!(blob_to_embedding(&blob), vec![1.0, -0.5]);
    }
}
