//! Volatile brute-force vector backend.
//!
//! Holds vectors in flat per-corpus lists and scans them linearly per
//! query. Exact by construction, so it doubles as the ground truth the
//! persisted backend's rankings are checked against.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::{ChunkId, CorpusId, DocumentId, EvidenceRagError, Result};

use super::{dot, prepare, top_k, EmbeddingRecord, VectorHit, VectorStore};

#[derive(Debug, Default)]
struct CorpusIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
    keys: Vec<(DocumentId, ChunkId)>,
    key_index: HashMap<(DocumentId, ChunkId), usize>,
}

/// Exact in-memory [`VectorStore`] backend.
pub struct InMemoryVectorStore {
    normalize: bool,
    corpora: RwLock<HashMap<CorpusId, CorpusIndex>>,
}

impl InMemoryVectorStore {
    /// Create a store. When `normalize` is set, vectors are
    /// L2-normalized before storage and querying, making the inner
    /// product a cosine similarity.
    pub fn new(normalize: bool) -> Self {
        Self {
            normalize,
            corpora: RwLock::new(HashMap::new()),
        }
    }

    /// Number of embeddings stored for a corpus.
    pub fn corpus_len(&self, corpus_id: &CorpusId) -> usize {
        self.corpora
            .read()
            .get(corpus_id)
            .map(|c| c.vectors.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl VectorStore for InMemoryVectorStore {
    fn index(&self, corpus_id: &CorpusId, items: &[EmbeddingRecord]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let first = &items[0].vector;
        if first.is_empty() {
            return Err(EvidenceRagError::VectorSearch {
                message: "embedding vectors cannot be empty".to_string(),
            });
        }

        let mut corpora = self.corpora.write();
        let corpus = corpora.entry(corpus_id.clone()).or_insert_with(|| CorpusIndex {
            dim: first.len(),
            ..CorpusIndex::default()
        });

        for item in items {
            let key = (item.document_id.clone(), item.chunk_id.clone());
            if corpus.key_index.contains_key(&key) {
                return Err(EvidenceRagError::AlreadyExists {
                    resource: "embedding".to_string(),
                    id: format!("{}/{}::{}", corpus_id, key.0, key.1),
                });
            }
            let processed = prepare(&item.vector, corpus.dim, self.normalize)?;
            corpus.vectors.push(processed);
            let row = corpus.vectors.len() - 1;
            corpus.keys.push(key.clone());
            corpus.key_index.insert(key, row);
        }

        tracing::debug!(
            corpus = %corpus_id,
            added = items.len(),
            total = corpus.vectors.len(),
            "indexed embeddings (memory backend)"
        );
        Ok(())
    }

    fn search(
        &self,
        corpus_id: &CorpusId,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<VectorHit>> {
        let corpora = self.corpora.read();
        let Some(corpus) = corpora.get(corpus_id) else {
            return Ok(Vec::new());
        };
        if corpus.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let query = prepare(query_vector, corpus.dim, self.normalize)?;

        let scores: Vec<(usize, f32)> = corpus
            .vectors
            .iter()
            .enumerate()
            .map(|(row, vec)| (row, dot(&query, vec)))
            .collect();

        Ok(top_k(scores, k)
            .into_iter()
            .map(|(row, score)| {
                let (document_id, chunk_id) = corpus.keys[row].clone();
                VectorHit {
                    document_id,
                    chunk_id,
                    score,
                }
            })
            .collect())
    }
}
