//! Vector similarity retrieval with interchangeable backends.
//!
//! Both backends implement [`VectorStore`]: the volatile
//! [`InMemoryVectorStore`](memory::InMemoryVectorStore) is the exact
//! brute-force baseline, the durable
//! [`PersistedVectorStore`](persisted::PersistedVectorStore) survives
//! process restarts. For identical inputs the two must produce identical
//! rankings (scores may differ within floating-point tolerance).

pub mod memory;
pub mod persisted;

pub use memory::InMemoryVectorStore;
pub use persisted::PersistedVectorStore;

use crate::core::{ChunkId, CorpusId, DocumentId, EvidenceRagError, Result};

/// A single k-nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VectorHit {
    /// Document the matching chunk belongs to
    pub document_id: DocumentId,
    /// Matching chunk
    pub chunk_id: ChunkId,
    /// Inner-product similarity (cosine when normalization is enabled)
    pub score: f32,
}

/// An embedding keyed by `(document_id, chunk_id)`, unique per corpus.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    /// Document the embedded chunk belongs to
    pub document_id: DocumentId,
    /// Embedded chunk
    pub chunk_id: ChunkId,
    /// Embedding vector
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    /// Convenience constructor.
    pub fn new(
        document_id: impl Into<DocumentId>,
        chunk_id: impl Into<ChunkId>,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_id: chunk_id.into(),
            vector,
        }
    }
}

/// k-nearest-neighbor store over per-corpus embedding collections.
///
/// Methods take `&self`; implementations lock internally so a store can
/// be shared behind `Arc<dyn VectorStore>` under the reader-writer
/// discipline (single writer per corpus, serialized by the caller).
pub trait VectorStore: Send + Sync {
    /// Insert embeddings into a corpus.
    ///
    /// The first insert for a new corpus fixes its dimensionality; any
    /// later vector with a different length fails with
    /// [`EvidenceRagError::DimensionMismatch`]. A duplicate
    /// `(document_id, chunk_id)` key fails with
    /// [`EvidenceRagError::AlreadyExists`] rather than overwriting.
    fn index(&self, corpus_id: &CorpusId, items: &[EmbeddingRecord]) -> Result<()>;

    /// Return up to `k` hits sorted by score descending.
    ///
    /// Unknown or empty corpus returns an empty list, not an error. The
    /// query vector must match the corpus dimension.
    fn search(&self, corpus_id: &CorpusId, query_vector: &[f32], k: usize)
        -> Result<Vec<VectorHit>>;
}

/// Inner product of two equal-length vectors.
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// L2-normalize a vector, failing explicitly on the zero vector instead
/// of propagating NaN.
pub(crate) fn normalize(vector: &[f32]) -> Result<Vec<f32>> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return Err(EvidenceRagError::VectorSearch {
            message: "cannot normalize zero vector".to_string(),
        });
    }
    Ok(vector.iter().map(|x| x / norm).collect())
}

/// Validate that `vector` has the corpus's fixed dimension.
pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(EvidenceRagError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Prepare a vector for storage or querying: dimension check plus
/// optional L2 normalization.
pub(crate) fn prepare(vector: &[f32], dim: usize, normalize_vectors: bool) -> Result<Vec<f32>> {
    check_dimension(dim, vector)?;
    if normalize_vectors {
        normalize(vector)
    } else {
        Ok(vector.to_vec())
    }
}

/// Sort `(row, score)` pairs by score descending with row order as the
/// tie-break, then truncate to `k`. Row order equals insertion order,
/// keeping rankings identical across backends.
pub(crate) fn top_k(mut scores: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scores.truncate(k);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_product_matches_hand_computation() {
        assert_eq!(dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }

    #[test]
    fn normalize_produces_unit_vector() {
        let unit = normalize(&[3.0, 4.0]).unwrap();
        let norm = unit.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_rejects_zero_vector() {
        let err = normalize(&[0.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, EvidenceRagError::VectorSearch { .. }));
    }

    #[test]
    fn top_k_breaks_ties_by_row_order() {
        let out = top_k(vec![(2, 1.0), (0, 1.0), (1, 0.5)], 3);
        assert_eq!(out, vec![(0, 1.0), (2, 1.0), (1, 0.5)]);
    }
}
