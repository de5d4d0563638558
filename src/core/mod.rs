//! Core data structures for the evidence retrieval system.
//!
//! Id newtypes, the immutable [`Chunk`] record supplied by ingestion,
//! and the [`SearchResult`] shape every retrieval signal produces.

pub mod error;

pub use error::{EvidenceRagError, Result};

use indexmap::IndexMap;

/// Unique identifier for a corpus (a full namespace for chunks and vectors)
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CorpusId(pub String);

impl CorpusId {
    /// Creates a new CorpusId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for CorpusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CorpusId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorpusId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for documents
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Creates a new DocumentId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for text chunks
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ChunkId(pub String);

impl ChunkId {
    /// Creates a new ChunkId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the id of the `index`-th chunk of a document.
    ///
    /// The derivation is deterministic so re-chunking the same document
    /// is idempotent.
    pub fn derive(document_id: &DocumentId, index: usize) -> Self {
        Self(format!("{}::chunk_{}", document_id.0, index))
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Creates a new NodeId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for graph edges
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Creates a new EdgeId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A chunk of text from a document, produced by the (external) ingestion
/// pipeline and consumed by the indexing components.
///
/// Chunks are immutable once created. The id is derived from the parent
/// document and a sequence index ([`ChunkId::derive`]).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    /// Unique identifier for the chunk
    pub id: ChunkId,
    /// ID of the parent document
    pub document_id: DocumentId,
    /// ID of the corpus this chunk belongs to
    pub corpus_id: CorpusId,
    /// Text content of the chunk
    pub text: String,
    /// Character offset where the chunk starts in the document
    pub start_offset: usize,
    /// Character offset where the chunk ends in the document
    pub end_offset: usize,
    /// Chunk-specific metadata
    pub metadata: IndexMap<String, String>,
}

impl Chunk {
    /// Build the `index`-th chunk of a document over its full text span.
    pub fn new(
        document_id: DocumentId,
        corpus_id: CorpusId,
        index: usize,
        text: impl Into<String>,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        let text = text.into();
        Self {
            id: ChunkId::derive(&document_id, index),
            document_id,
            corpus_id,
            text,
            start_offset,
            end_offset,
            metadata: IndexMap::new(),
        }
    }
}

/// A ranked retrieval result with provenance back to its chunk.
///
/// Scores are on the producing signal's native scale (BM25 unbounded
/// >= 0, vector similarity in [-1, 1]); the orchestrator normalizes
/// before fusing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    /// ID of the document the matching chunk belongs to
    pub document_id: DocumentId,
    /// ID of the matching chunk
    pub chunk_id: ChunkId,
    /// Relevance score (signal-native scale)
    pub score: f32,
    /// Excerpt of the chunk text
    pub excerpt: String,
    /// Metadata carried over from the chunk
    pub metadata: IndexMap<String, String>,
}

/// Truncate text to at most `max_chars` characters, appending `...`
/// when anything was cut. Cuts on a char boundary.
pub(crate) fn make_excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_derivation_is_deterministic() {
        let doc = DocumentId::new("report-7");
        assert_eq!(ChunkId::derive(&doc, 0).0, "report-7::chunk_0");
        assert_eq!(ChunkId::derive(&doc, 3), ChunkId::derive(&doc, 3));
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        assert_eq!(make_excerpt("short", 200), "short");
        let long = "a".repeat(250);
        let excerpt = make_excerpt(&long, 200);
        assert_eq!(excerpt.len(), 203);
        assert!(excerpt.ends_with("..."));

        // Multi-byte text must not panic or split a codepoint
        let accented = "é".repeat(10);
        let cut = make_excerpt(&accented, 4);
        assert_eq!(cut, "éééé...");
    }
}
