//! Hybrid evidence retrieval: lexical BM25 search, vector similarity,
//! and an ontology-gated knowledge graph, combined behind one
//! orchestrator.
//!
//! The crate is a library core. Ingestion (chunking documents) and
//! embedding generation happen upstream; callers hand in [`core::Chunk`]s
//! and pre-computed vectors, then query through the
//! [`search::SearchOrchestrator`] or the [`rag::GraphGuidedRetriever`].
//!
//! # Components
//!
//! - [`search::bm25`] — inverted-index BM25 ranking over chunks
//! - [`vector`] — kNN over pre-computed embeddings, with a volatile
//!   in-memory backend and a disk-persisted one that survive restart
//!   interchangeably (both rank identically)
//! - [`graph`] — typed entity/relation store with per-edge provenance,
//!   optionally gated by an [`graph::Ontology`]
//! - [`search`] — per-corpus orchestration and hybrid score fusion
//! - [`rag`] — graph-guided retrieval: question entities steer which
//!   documents the evidence search narrows to
//!
//! # Example
//!
//! ```
//! use evidencerag_core::core::{Chunk, CorpusId, DocumentId};
//! use evidencerag_core::search::{SearchMode, SearchOptions, SearchOrchestrator};
//!
//! let corpus = CorpusId::new("notes");
//! let chunks = vec![Chunk::new(
//!     DocumentId::new("doc-1"),
//!     corpus.clone(),
//!     0,
//!     "Machine learning is a subset of artificial intelligence",
//!     0,
//!     55,
//! )];
//!
//! let orchestrator = SearchOrchestrator::new();
//! orchestrator.index_corpus(&corpus, &chunks).unwrap();
//! let results = orchestrator
//!     .search(&corpus, "machine learning", SearchMode::Bm25, &SearchOptions::default())
//!     .unwrap();
//! assert_eq!(results[0].document_id, DocumentId::new("doc-1"));
//! ```

pub mod config;
pub mod core;
pub mod graph;
pub mod rag;
pub mod search;
pub mod text;
pub mod vector;

pub use crate::core::{EvidenceRagError, Result};

/// The common imports for working with the retrieval stack.
pub mod prelude {
    pub use crate::config::{Config, VectorBackend};
    pub use crate::core::{
        Chunk, ChunkId, CorpusId, DocumentId, EdgeId, EvidenceRagError, NodeId, Result,
        SearchResult,
    };
    pub use crate::graph::{GraphEdge, GraphNode, GraphStore, Ontology};
    pub use crate::rag::{EvidenceBundle, GraphGuidedRetriever, QuestionCategory};
    pub use crate::search::{
        Bm25Index, QueryEmbedder, SearchMode, SearchOptions, SearchOrchestrator,
    };
    pub use crate::text::Tokenizer;
    pub use crate::vector::{
        EmbeddingRecord, InMemoryVectorStore, PersistedVectorStore, VectorHit, VectorStore,
    };
}
