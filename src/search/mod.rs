//! Search orchestration across lexical and vector signals.
//!
//! The orchestrator owns per-corpus BM25 indices and optionally holds a
//! [`VectorStore`] plus a [`QueryEmbedder`] for semantic search. Hybrid
//! mode runs both signals, min-max normalizes each result list, and
//! fuses them with a weighted sum.

pub mod bm25;

pub use bm25::{Bm25Index, Bm25Statistics, DEFAULT_B, DEFAULT_K1};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::{
    make_excerpt, Chunk, ChunkId, CorpusId, DocumentId, EvidenceRagError, Result, SearchResult,
};
use crate::text::Tokenizer;
use crate::vector::VectorStore;

/// Which retrieval signal(s) a search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Lexical BM25 only
    Bm25,
    /// Vector similarity only
    Vector,
    /// Both signals, fused with a weighted sum of normalized scores
    Hybrid,
}

/// Per-query knobs. `k` bounds the final result list; the per-signal
/// depths bound how many candidates each signal contributes before
/// fusion.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchOptions {
    /// Maximum results returned
    pub k: usize,
    /// BM25 candidate depth
    pub k_bm25: usize,
    /// Vector candidate depth
    pub k_vector: usize,
    /// Weight of the normalized BM25 score in hybrid fusion
    pub w_bm25: f32,
    /// Weight of the normalized vector score in hybrid fusion
    pub w_vector: f32,
    /// Maximum excerpt length in characters
    pub excerpt_length: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 10,
            k_bm25: 50,
            k_vector: 50,
            w_bm25: 0.5,
            w_vector: 0.5,
            excerpt_length: 200,
        }
    }
}

/// Produces a query embedding in the same vector space the corpus
/// vectors were indexed in. Implementations wrap whatever model or
/// service computes embeddings; the orchestrator only needs the query
/// side, since corpus vectors arrive pre-computed.
pub trait QueryEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Coordinates BM25, vector, and hybrid retrieval over named corpora.
///
/// BM25 indices are built from chunks via [`index_corpus`] and cached
/// per corpus until [`invalidate`] drops them. Vector and hybrid modes
/// require both a vector store and an embedder; requesting them without
/// one fails fast instead of silently degrading to lexical-only.
///
/// [`index_corpus`]: SearchOrchestrator::index_corpus
/// [`invalidate`]: SearchOrchestrator::invalidate
pub struct SearchOrchestrator {
    k1: f32,
    b: f32,
    tokenizer: Tokenizer,
    vector_store: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn QueryEmbedder>>,
    indices: RwLock<HashMap<CorpusId, Arc<Bm25Index>>>,
}

impl SearchOrchestrator {
    /// Lexical-only orchestrator with default BM25 parameters.
    /// Stopword removal is off by default, matching
    /// [`Tokenizer::default`]; opt in via [`with_tokenizer`].
    ///
    /// [`with_tokenizer`]: SearchOrchestrator::with_tokenizer
    pub fn new() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            tokenizer: Tokenizer::default(),
            vector_store: None,
            embedder: None,
            indices: RwLock::new(HashMap::new()),
        }
    }

    /// Override the BM25 ranking parameters used for new indices.
    pub fn with_bm25_params(mut self, k1: f32, b: f32) -> Self {
        self.k1 = k1;
        self.b = b;
        self
    }

    /// Override the tokenizer used for new indices.
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Attach a vector backend for vector and hybrid modes.
    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Attach a query embedder for vector and hybrid modes.
    pub fn with_embedder(mut self, embedder: Arc<dyn QueryEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Build (or rebuild) the BM25 index for a corpus from its chunks.
    pub fn index_corpus(&self, corpus_id: &CorpusId, chunks: &[Chunk]) -> Result<()> {
        let mut index = Bm25Index::with_parameters(self.k1, self.b, self.tokenizer.clone());
        index.build(chunks);
        tracing::info!(
            corpus = %corpus_id,
            chunks = chunks.len(),
            terms = index.term_count(),
            "indexed corpus"
        );
        self.indices
            .write()
            .insert(corpus_id.clone(), Arc::new(index));
        Ok(())
    }

    /// Drop the cached index for one corpus, or every corpus when
    /// `corpus_id` is `None`.
    pub fn invalidate(&self, corpus_id: Option<&CorpusId>) {
        let mut indices = self.indices.write();
        match corpus_id {
            Some(id) => {
                indices.remove(id);
                tracing::debug!(corpus = %id, "invalidated corpus index");
            }
            None => {
                tracing::debug!(count = indices.len(), "invalidated all corpus indices");
                indices.clear();
            }
        }
    }

    /// Whether a corpus currently has a BM25 index.
    pub fn has_corpus(&self, corpus_id: &CorpusId) -> bool {
        self.indices.read().contains_key(corpus_id)
    }

    /// Run a search against one corpus in the requested mode.
    pub fn search(
        &self,
        corpus_id: &CorpusId,
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        self.run(corpus_id, query, mode, options, None)
    }

    /// Search, building the corpus index from `chunks` first when it is
    /// not already cached. For callers that own the chunk set and leave
    /// index lifecycle to the orchestrator; a cached index is reused
    /// until [`invalidate`](SearchOrchestrator::invalidate).
    pub fn search_chunks(
        &self,
        corpus_id: &CorpusId,
        chunks: &[Chunk],
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        if !self.has_corpus(corpus_id) {
            self.index_corpus(corpus_id, chunks)?;
        }
        self.search(corpus_id, query, mode, options)
    }

    /// Search restricted to chunks of the given documents. Used by
    /// graph-guided retrieval to narrow evidence to documents the graph
    /// implicated.
    ///
    /// The restriction is applied to each signal's candidate set before
    /// ranking cutoffs, so chunks of the given documents surface even
    /// when the unrestricted ranking would place them below the top-k.
    pub fn search_within_documents(
        &self,
        corpus_id: &CorpusId,
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
        documents: &[DocumentId],
    ) -> Result<Vec<SearchResult>> {
        self.run(corpus_id, query, mode, options, Some(documents))
    }

    fn run(
        &self,
        corpus_id: &CorpusId,
        query: &str,
        mode: SearchMode,
        options: &SearchOptions,
        documents: Option<&[DocumentId]>,
    ) -> Result<Vec<SearchResult>> {
        let index = self.index_for(corpus_id)?;
        let mut results = match mode {
            SearchMode::Bm25 => self.bm25_results(&index, query, options, documents),
            SearchMode::Vector => self.vector_results(corpus_id, &index, query, options, documents)?,
            SearchMode::Hybrid => {
                let lexical = self.bm25_results(&index, query, options, documents);
                let semantic =
                    self.vector_results(corpus_id, &index, query, options, documents)?;
                fuse(lexical, semantic, options.w_bm25, options.w_vector)
            }
        };
        results.truncate(options.k);
        Ok(results)
    }

    fn index_for(&self, corpus_id: &CorpusId) -> Result<Arc<Bm25Index>> {
        self.indices.read().get(corpus_id).cloned().ok_or_else(|| {
            EvidenceRagError::NotFound {
                resource: "corpus index".to_string(),
                id: corpus_id.to_string(),
            }
        })
    }

    fn bm25_results(
        &self,
        index: &Bm25Index,
        query: &str,
        options: &SearchOptions,
        documents: Option<&[DocumentId]>,
    ) -> Vec<SearchResult> {
        // When narrowing, score the full candidate set so chunks of the
        // requested documents are not lost below the unrestricted cutoff
        let depth = if documents.is_some() { usize::MAX } else { options.k_bm25 };
        let mut results: Vec<SearchResult> = index
            .search(query, depth)
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                let chunk = index.get_chunk(&chunk_id)?;
                if let Some(docs) = documents {
                    if !docs.contains(&chunk.document_id) {
                        return None;
                    }
                }
                Some(SearchResult {
                    document_id: chunk.document_id.clone(),
                    chunk_id,
                    score,
                    excerpt: make_excerpt(&chunk.text, options.excerpt_length),
                    metadata: chunk.metadata.clone(),
                })
            })
            .collect();
        results.truncate(options.k_bm25);
        results
    }

    fn vector_results(
        &self,
        corpus_id: &CorpusId,
        index: &Bm25Index,
        query: &str,
        options: &SearchOptions,
        documents: Option<&[DocumentId]>,
    ) -> Result<Vec<SearchResult>> {
        let store = self.vector_store.as_ref().ok_or_else(|| {
            EvidenceRagError::Config {
                message: "vector search requested but no vector store is configured".to_string(),
            }
        })?;
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            EvidenceRagError::Config {
                message: "vector search requested but no query embedder is configured".to_string(),
            }
        })?;

        let query_vector = embedder.embed(query)?;
        let depth = if documents.is_some() { usize::MAX } else { options.k_vector };
        let hits = store.search(corpus_id, &query_vector, depth)?;

        // Hits must join back to an indexed chunk; stale vector entries
        // with no chunk counterpart are dropped.
        let mut results: Vec<SearchResult> = hits
            .into_iter()
            .filter_map(|hit| {
                let chunk = index.get_chunk(&hit.chunk_id)?;
                if let Some(docs) = documents {
                    if !docs.contains(&chunk.document_id) {
                        return None;
                    }
                }
                Some(SearchResult {
                    document_id: hit.document_id,
                    chunk_id: hit.chunk_id,
                    score: hit.score,
                    excerpt: make_excerpt(&chunk.text, options.excerpt_length),
                    metadata: chunk.metadata.clone(),
                })
            })
            .collect();
        results.truncate(options.k_vector);
        Ok(results)
    }
}

impl Default for SearchOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Min-max normalize scores in place. A single result, or a list where
/// every score is equal, normalizes to 1.0.
fn normalize_scores(results: &mut [SearchResult]) {
    let Some(first) = results.first() else {
        return;
    };
    let mut min = first.score;
    let mut max = first.score;
    for r in results.iter() {
        min = min.min(r.score);
        max = max.max(r.score);
    }
    let range = max - min;
    for r in results.iter_mut() {
        r.score = if range > 0.0 { (r.score - min) / range } else { 1.0 };
    }
}

/// Weighted-sum fusion over the union of result keys. A key missing
/// from one signal contributes 0 for that signal. Ties break on
/// (document id, chunk id) so fused rankings are deterministic.
fn fuse(
    mut lexical: Vec<SearchResult>,
    mut semantic: Vec<SearchResult>,
    w_lexical: f32,
    w_semantic: f32,
) -> Vec<SearchResult> {
    normalize_scores(&mut lexical);
    normalize_scores(&mut semantic);

    let mut fused: indexmap::IndexMap<(DocumentId, ChunkId), SearchResult> =
        indexmap::IndexMap::new();
    for mut result in lexical {
        result.score *= w_lexical;
        fused.insert((result.document_id.clone(), result.chunk_id.clone()), result);
    }
    for mut result in semantic {
        result.score *= w_semantic;
        match fused.entry((result.document_id.clone(), result.chunk_id.clone())) {
            indexmap::map::Entry::Occupied(mut entry) => {
                entry.get_mut().score += result.score;
            }
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(result);
            }
        }
    }

    let mut results: Vec<SearchResult> = fused.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{EmbeddingRecord, InMemoryVectorStore};

    fn chunk(doc: &str, index: usize, text: &str) -> Chunk {
        Chunk::new(
            DocumentId::new(doc),
            CorpusId::new("corpus"),
            index,
            text,
            0,
            text.len(),
        )
    }

    fn result(doc: &str, chunk: &str, score: f32) -> SearchResult {
        SearchResult {
            document_id: DocumentId::new(doc),
            chunk_id: ChunkId::new(chunk),
            score,
            excerpt: String::new(),
            metadata: Default::default(),
        }
    }

    /// Deterministic toy embedder: projects text onto fixed keyword
    /// axes so tests control which chunks look semantically close.
    struct KeywordEmbedder;

    impl QueryEmbedder for KeywordEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            let axes = ["learning", "cooking", "history"];
            Ok(axes
                .iter()
                .map(|axis| if lower.contains(axis) { 1.0 } else { 0.1 })
                .collect())
        }
    }

    fn indexed_orchestrator() -> (SearchOrchestrator, CorpusId) {
        let corpus = CorpusId::new("corpus");
        let chunks = vec![
            chunk("doc-a", 0, "Machine learning is a subset of artificial intelligence"),
            chunk("doc-b", 0, "Deep learning uses neural networks"),
            chunk("doc-c", 0, "Cooking pasta requires boiling water"),
        ];

        let store = Arc::new(InMemoryVectorStore::new(true));
        let embedder = KeywordEmbedder;
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .map(|c| {
                EmbeddingRecord::new(
                    c.document_id.clone(),
                    c.id.clone(),
                    embedder.embed(&c.text).unwrap(),
                )
            })
            .collect();
        store.index(&corpus, &records).unwrap();

        let orchestrator = SearchOrchestrator::new()
            .with_vector_store(store)
            .with_embedder(Arc::new(KeywordEmbedder));
        orchestrator.index_corpus(&corpus, &chunks).unwrap();
        (orchestrator, corpus)
    }

    #[test]
    fn bm25_mode_returns_lexical_matches_with_excerpts() {
        let (orchestrator, corpus) = indexed_orchestrator();
        let results = orchestrator
            .search(&corpus, "machine learning", SearchMode::Bm25, &SearchOptions::default())
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].document_id, DocumentId::new("doc-a"));
        assert!(results[0].excerpt.contains("Machine learning"));
    }

    #[test]
    fn vector_mode_without_backend_fails_fast() {
        let orchestrator = SearchOrchestrator::new();
        let corpus = CorpusId::new("corpus");
        orchestrator.index_corpus(&corpus, &[chunk("d", 0, "text")]).unwrap();

        let err = orchestrator
            .search(&corpus, "text", SearchMode::Vector, &SearchOptions::default())
            .unwrap_err();
        assert!(matches!(err, EvidenceRagError::Config { .. }));
    }

    #[test]
    fn unknown_corpus_is_not_found() {
        let orchestrator = SearchOrchestrator::new();
        let err = orchestrator
            .search(
                &CorpusId::new("missing"),
                "query",
                SearchMode::Bm25,
                &SearchOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, EvidenceRagError::NotFound { .. }));
    }

    #[test]
    fn hybrid_mode_fuses_both_signals() {
        let (orchestrator, corpus) = indexed_orchestrator();
        let results = orchestrator
            .search(&corpus, "learning", SearchMode::Hybrid, &SearchOptions::default())
            .unwrap();

        // Both learning chunks outrank the cooking chunk
        assert!(results.len() >= 2);
        let top_docs: Vec<&str> = results[..2].iter().map(|r| r.document_id.0.as_str()).collect();
        assert!(top_docs.contains(&"doc-a"));
        assert!(top_docs.contains(&"doc-b"));
    }

    #[test]
    fn invalidate_drops_cached_indices() {
        let (orchestrator, corpus) = indexed_orchestrator();
        assert!(orchestrator.has_corpus(&corpus));
        orchestrator.invalidate(Some(&corpus));
        assert!(!orchestrator.has_corpus(&corpus));

        orchestrator.index_corpus(&corpus, &[chunk("d", 0, "text")]).unwrap();
        orchestrator.invalidate(None);
        assert!(!orchestrator.has_corpus(&corpus));
    }

    #[test]
    fn search_chunks_builds_index_on_first_use_and_reuses_it() {
        let orchestrator = SearchOrchestrator::new();
        let corpus = CorpusId::new("corpus");
        let chunks = vec![chunk("doc-a", 0, "alpha beta")];

        assert!(!orchestrator.has_corpus(&corpus));
        let results = orchestrator
            .search_chunks(&corpus, &chunks, "alpha", SearchMode::Bm25, &SearchOptions::default())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(orchestrator.has_corpus(&corpus));

        // Cached index is reused; a different chunk set is ignored
        let other = vec![chunk("doc-b", 0, "gamma delta")];
        let results = orchestrator
            .search_chunks(&corpus, &other, "alpha", SearchMode::Bm25, &SearchOptions::default())
            .unwrap();
        assert_eq!(results[0].document_id, DocumentId::new("doc-a"));
    }

    #[test]
    fn document_narrowing_filters_results() {
        let (orchestrator, corpus) = indexed_orchestrator();
        let results = orchestrator
            .search_within_documents(
                &corpus,
                "learning",
                SearchMode::Bm25,
                &SearchOptions::default(),
                &[DocumentId::new("doc-b")],
            )
            .unwrap();
        assert!(results.iter().all(|r| r.document_id == DocumentId::new("doc-b")));
        assert!(!results.is_empty());
    }

    #[test]
    fn narrowing_recovers_chunks_below_the_global_cutoff() {
        let orchestrator = SearchOrchestrator::new();
        let corpus = CorpusId::new("corpus");
        orchestrator
            .index_corpus(
                &corpus,
                &[
                    chunk("doc-strong", 0, "treasure treasure treasure treasure"),
                    chunk("doc-z", 0, "the treasure map"),
                ],
            )
            .unwrap();

        let options = SearchOptions {
            k: 1,
            k_bm25: 1,
            ..Default::default()
        };

        // Unrestricted, the dense chunk takes the single slot
        let unrestricted = orchestrator
            .search(&corpus, "treasure", SearchMode::Bm25, &options)
            .unwrap();
        assert_eq!(unrestricted[0].document_id, DocumentId::new("doc-strong"));

        // Restricted to doc-z, its chunk must surface even though it
        // ranks below the unrestricted cutoff
        let narrowed = orchestrator
            .search_within_documents(
                &corpus,
                "treasure",
                SearchMode::Bm25,
                &options,
                &[DocumentId::new("doc-z")],
            )
            .unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].document_id, DocumentId::new("doc-z"));
    }

    #[test]
    fn vector_hits_without_an_indexed_chunk_are_dropped() {
        let corpus = CorpusId::new("corpus");
        let chunks = vec![chunk("doc-a", 0, "machine learning basics")];

        let store = Arc::new(InMemoryVectorStore::new(true));
        store
            .index(
                &corpus,
                &[
                    EmbeddingRecord::new("doc-a", "doc-a::chunk_0", vec![1.0, 0.1, 0.1]),
                    // Stale entry with no counterpart in the chunk set
                    EmbeddingRecord::new("ghost", "ghost::chunk_0", vec![1.0, 0.1, 0.1]),
                ],
            )
            .unwrap();

        let orchestrator = SearchOrchestrator::new()
            .with_vector_store(store)
            .with_embedder(Arc::new(KeywordEmbedder));
        orchestrator.index_corpus(&corpus, &chunks).unwrap();

        let results = orchestrator
            .search(&corpus, "learning", SearchMode::Vector, &SearchOptions::default())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, DocumentId::new("doc-a"));
        assert!(!results[0].excerpt.is_empty());
    }

    #[test]
    fn normalization_maps_to_unit_interval() {
        let mut results = vec![result("d", "c1", 2.0), result("d", "c2", 6.0), result("d", "c3", 4.0)];
        normalize_scores(&mut results);
        assert_eq!(results[0].score, 0.0);
        assert_eq!(results[1].score, 1.0);
        assert_eq!(results[2].score, 0.5);
    }

    #[test]
    fn single_and_equal_score_lists_normalize_to_one() {
        let mut single = vec![result("d", "c1", 3.7)];
        normalize_scores(&mut single);
        assert_eq!(single[0].score, 1.0);

        let mut equal = vec![result("d", "c1", 2.0), result("d", "c2", 2.0)];
        normalize_scores(&mut equal);
        assert!(equal.iter().all(|r| r.score == 1.0));
    }

    #[test]
    fn fusion_sums_weighted_scores_over_key_union() {
        let lexical = vec![result("d1", "d1::chunk_0", 4.0), result("d2", "d2::chunk_0", 2.0)];
        let semantic = vec![result("d1", "d1::chunk_0", 0.9), result("d3", "d3::chunk_0", 0.3)];

        let fused = fuse(lexical, semantic, 0.5, 0.5);
        assert_eq!(fused.len(), 3);
        // d1 appears in both signals with the top normalized score on each
        assert_eq!(fused[0].document_id, DocumentId::new("d1"));
        assert!((fused[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fusion_ties_break_on_document_then_chunk_id() {
        let lexical = vec![result("b", "b::chunk_0", 1.0), result("a", "a::chunk_0", 1.0)];
        let fused = fuse(lexical, Vec::new(), 1.0, 0.0);
        assert_eq!(fused[0].document_id, DocumentId::new("a"));
        assert_eq!(fused[1].document_id, DocumentId::new("b"));
    }
}
