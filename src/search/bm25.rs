//! BM25 inverted-index scoring over the chunks of one corpus.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::core::{Chunk, ChunkId};
use crate::text::Tokenizer;

/// Default term-frequency saturation parameter
pub const DEFAULT_K1: f32 = 1.5;
/// Default length-normalization parameter
pub const DEFAULT_B: f32 = 0.75;

/// Per-chunk state derived at build time, owned by the index.
#[derive(Debug, Clone)]
struct IndexedDocument {
    /// Parent chunk, kept for excerpt/metadata join-back
    chunk: Chunk,
    /// Term -> occurrence count within this chunk
    term_frequencies: HashMap<String, usize>,
    /// Chunk length in tokens
    length: usize,
    /// Insertion sequence, used for deterministic tie-breaking
    ord: usize,
}

/// BM25 index over the chunks of a single corpus.
///
/// [`build`](Bm25Index::build) replaces all prior state; `search` never
/// errors on a miss (empty query, empty corpus, or no matching term all
/// return an empty list).
pub struct Bm25Index {
    /// Term frequency saturation parameter
    k1: f32,
    /// Length normalization parameter
    b: f32,
    tokenizer: Tokenizer,
    /// Chunks in insertion order
    documents: IndexMap<ChunkId, IndexedDocument>,
    /// Term -> set of chunk ids containing it
    inverted_index: HashMap<String, HashSet<ChunkId>>,
    /// Precomputed IDF per term
    idf_cache: HashMap<String, f32>,
    avg_doc_length: f32,
    doc_count: usize,
}

impl Bm25Index {
    /// Create an empty index with default parameters (k1=1.5, b=0.75).
    pub fn new() -> Self {
        Self::with_parameters(DEFAULT_K1, DEFAULT_B, Tokenizer::default())
    }

    /// Create an empty index with explicit parameters and tokenizer.
    pub fn with_parameters(k1: f32, b: f32, tokenizer: Tokenizer) -> Self {
        Self {
            k1,
            b,
            tokenizer,
            documents: IndexMap::new(),
            inverted_index: HashMap::new(),
            idf_cache: HashMap::new(),
            avg_doc_length: 0.0,
            doc_count: 0,
        }
    }

    /// Build the index from a chunk set, replacing all prior state.
    pub fn build(&mut self, chunks: &[Chunk]) {
        self.clear();
        if chunks.is_empty() {
            return;
        }

        let mut total_length = 0usize;
        for (ord, chunk) in chunks.iter().enumerate() {
            let tokens = self.tokenizer.tokenize(&chunk.text);
            let length = tokens.len();
            total_length += length;

            let mut term_frequencies: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *term_frequencies.entry(token).or_insert(0) += 1;
            }

            for term in term_frequencies.keys() {
                self.inverted_index
                    .entry(term.clone())
                    .or_default()
                    .insert(chunk.id.clone());
            }

            self.documents.insert(
                chunk.id.clone(),
                IndexedDocument {
                    chunk: chunk.clone(),
                    term_frequencies,
                    length,
                    ord,
                },
            );
        }

        self.doc_count = self.documents.len();
        self.avg_doc_length = if self.doc_count > 0 {
            total_length as f32 / self.doc_count as f32
        } else {
            0.0
        };

        self.compute_idf();

        tracing::debug!(
            documents = self.doc_count,
            terms = self.inverted_index.len(),
            avg_doc_length = self.avg_doc_length,
            "built bm25 index"
        );
    }

    fn clear(&mut self) {
        self.documents.clear();
        self.inverted_index.clear();
        self.idf_cache.clear();
        self.avg_doc_length = 0.0;
        self.doc_count = 0;
    }

    /// Precompute IDF for every indexed term.
    ///
    /// Uses `ln((N - df + 0.5) / (df + 0.5) + 1)`, which stays
    /// non-negative even for terms present in most documents. Plain
    /// `ln((N - df + 0.5) / (df + 0.5))` goes negative on small corpora
    /// and destabilizes ranking.
    fn compute_idf(&mut self) {
        let n = self.doc_count as f32;
        for (term, doc_set) in &self.inverted_index {
            let df = doc_set.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            self.idf_cache.insert(term.clone(), idf);
        }
    }

    fn score_document(&self, doc: &IndexedDocument, query_terms: &[String]) -> f32 {
        let norm_doc_length = if self.avg_doc_length > 0.0 {
            doc.length as f32 / self.avg_doc_length
        } else {
            0.0
        };

        let mut score = 0.0;
        for term in query_terms {
            let Some(idf) = self.idf_cache.get(term) else {
                continue;
            };
            let tf = doc.term_frequencies.get(term).copied().unwrap_or(0) as f32;
            let numerator = tf * (self.k1 + 1.0);
            let denominator = tf + self.k1 * (1.0 - self.b + self.b * norm_doc_length);
            score += idf * (numerator / denominator);
        }
        score
    }

    /// Search the index, returning up to `k` `(chunk_id, score)` pairs
    /// sorted by score descending.
    ///
    /// Only chunks containing at least one query term are scored. Ties
    /// keep chunk insertion order, so identical inputs always produce
    /// identical output orderings.
    pub fn search(&self, query: &str, k: usize) -> Vec<(ChunkId, f32)> {
        if query.is_empty() || self.doc_count == 0 {
            return Vec::new();
        }

        let query_terms = self.tokenizer.tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        // Candidate pruning: only chunks containing >= 1 query term
        let mut candidates: HashSet<&ChunkId> = HashSet::new();
        for term in &query_terms {
            if let Some(doc_set) = self.inverted_index.get(term) {
                candidates.extend(doc_set.iter());
            }
        }
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(&IndexedDocument, f32)> = candidates
            .into_iter()
            .filter_map(|id| self.documents.get(id))
            .map(|doc| (doc, self.score_document(doc, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        // Score descending, insertion order on ties
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.ord.cmp(&b.0.ord))
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(doc, score)| (doc.chunk.id.clone(), score))
            .collect()
    }

    /// Look up an indexed chunk by id.
    pub fn get_chunk(&self, chunk_id: &ChunkId) -> Option<&Chunk> {
        self.documents.get(chunk_id).map(|d| &d.chunk)
    }

    /// Number of indexed chunks.
    pub fn document_count(&self) -> usize {
        self.doc_count
    }

    /// Number of distinct terms in the index.
    pub fn term_count(&self) -> usize {
        self.inverted_index.len()
    }

    /// Snapshot of index statistics.
    pub fn statistics(&self) -> Bm25Statistics {
        Bm25Statistics {
            total_documents: self.doc_count,
            total_terms: self.inverted_index.len(),
            avg_doc_length: self.avg_doc_length,
            k1: self.k1,
            b: self.b,
        }
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about a built BM25 index
#[derive(Debug, Clone)]
pub struct Bm25Statistics {
    /// Total number of indexed chunks
    pub total_documents: usize,
    /// Total number of distinct terms
    pub total_terms: usize,
    /// Average chunk length in tokens
    pub avg_doc_length: f32,
    /// Term frequency saturation parameter
    pub k1: f32,
    /// Length normalization parameter
    pub b: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CorpusId, DocumentId};

    fn chunk(doc: &str, index: usize, text: &str) -> Chunk {
        Chunk::new(
            DocumentId::new(doc),
            CorpusId::new("corpus-1"),
            index,
            text,
            0,
            text.len(),
        )
    }

    fn sample_chunks() -> Vec<Chunk> {
        vec![
            chunk("doc1", 0, "Machine learning is a subset of AI."),
            chunk("doc2", 0, "Deep learning uses neural networks."),
        ]
    }

    #[test]
    fn ranks_more_query_terms_higher() {
        let mut index = Bm25Index::new();
        index.build(&sample_chunks());

        let results = index.search("machine learning", 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0 .0, "doc1::chunk_0");
        assert!(results[0].1 > results[1].1);
        assert!(results.iter().all(|(_, s)| *s > 0.0));
    }

    #[test]
    fn unknown_terms_return_empty() {
        let mut index = Bm25Index::new();
        index.build(&sample_chunks());
        assert!(index.search("nonexistent term", 10).is_empty());
    }

    #[test]
    fn empty_query_and_empty_corpus_return_empty() {
        let mut index = Bm25Index::new();
        assert!(index.search("anything", 10).is_empty());

        index.build(&sample_chunks());
        assert!(index.search("", 10).is_empty());
    }

    #[test]
    fn rebuild_replaces_prior_state() {
        let mut index = Bm25Index::new();
        index.build(&sample_chunks());
        assert_eq!(index.document_count(), 2);

        index.build(&[chunk("doc3", 0, "entirely different content")]);
        assert_eq!(index.document_count(), 1);
        assert!(index.search("machine", 10).is_empty());
        assert!(!index.search("different", 10).is_empty());
    }

    #[test]
    fn idf_stays_non_negative_for_ubiquitous_terms() {
        let mut index = Bm25Index::new();
        index.build(&[
            chunk("a", 0, "shared term alpha"),
            chunk("b", 0, "shared term beta"),
            chunk("c", 0, "shared term gamma"),
        ]);
        // "shared" appears in all three chunks; scores must not go negative
        let results = index.search("shared", 10);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|(_, s)| *s > 0.0));
    }

    #[test]
    fn search_is_deterministic_across_builds() {
        let chunks = vec![
            chunk("a", 0, "alpha beta gamma"),
            chunk("b", 0, "alpha beta gamma"),
            chunk("c", 0, "alpha beta gamma"),
        ];

        let mut first = Bm25Index::new();
        first.build(&chunks);
        let mut second = Bm25Index::new();
        second.build(&chunks);

        let run_a = first.search("alpha gamma", 10);
        let run_b = first.search("alpha gamma", 10);
        let run_c = second.search("alpha gamma", 10);
        assert_eq!(run_a, run_b);
        assert_eq!(run_a, run_c);

        // Identical scores keep insertion order
        let ids: Vec<&str> = run_a.iter().map(|(id, _)| id.0.as_str()).collect();
        assert_eq!(ids, vec!["a::chunk_0", "b::chunk_0", "c::chunk_0"]);
    }

    #[test]
    fn statistics_reflect_build() {
        let mut index = Bm25Index::new();
        index.build(&sample_chunks());
        let stats = index.statistics();
        assert_eq!(stats.total_documents, 2);
        assert!(stats.total_terms > 0);
        assert!(stats.avg_doc_length > 0.0);
        assert_eq!(stats.k1, DEFAULT_K1);
        assert_eq!(stats.b, DEFAULT_B);
    }
}
