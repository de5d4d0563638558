//! Typed knowledge graph with per-edge provenance.
//!
//! Nodes are ontology-typed entities; edges are pieces of evidence
//! extracted from documents, each carrying the document/chunk it came
//! from, an extraction method, and a confidence. Several edges may link
//! the same node pair — an edge is evidence, not a unique relationship
//! slot.

pub mod ontology;
pub mod store;

pub use ontology::Ontology;
pub use store::GraphStore;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::core::{ChunkId, DocumentId, EdgeId, NodeId};

/// An entity node in the knowledge graph.
///
/// `upsert` semantics: re-inserting the same id replaces type, name,
/// aliases, and metadata, preserves `created_at`, and refreshes
/// `updated_at`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphNode {
    /// Unique node identifier
    pub id: NodeId,
    /// Entity type; must resolve against the ontology when one is attached
    pub node_type: String,
    /// Canonical entity name
    pub name: String,
    /// Alternative names, in insertion order
    pub aliases: Vec<String>,
    /// Additional metadata (for example a `document_id` provenance key)
    pub metadata: IndexMap<String, String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl GraphNode {
    /// Build a node with empty aliases/metadata and fresh timestamps.
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: name.into(),
            aliases: Vec::new(),
            metadata: IndexMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A directed, provenance-tracked edge between two nodes.
///
/// Edges are created once by extraction and never mutated in place;
/// corrections arrive as new edges with different provenance.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphEdge {
    /// Unique edge identifier
    pub id: EdgeId,
    /// Relation type; gated by the ontology's domain/range table
    pub edge_type: String,
    /// Source node id
    pub source: NodeId,
    /// Target node id
    pub target: NodeId,
    /// Document this evidence was extracted from
    pub doc_id: DocumentId,
    /// Chunk the evidence was extracted from, if known
    pub chunk_id: Option<ChunkId>,
    /// Supporting text excerpt, if captured
    pub excerpt: Option<String>,
    /// Extraction confidence in [0, 1]
    pub confidence: f32,
    /// How the edge was extracted ("regex", "llm", "manual", ...)
    pub extraction_method: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl GraphEdge {
    /// Build an edge with default provenance fields.
    pub fn new(
        id: impl Into<EdgeId>,
        edge_type: impl Into<String>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        doc_id: impl Into<DocumentId>,
    ) -> Self {
        Self {
            id: id.into(),
            edge_type: edge_type.into(),
            source: source.into(),
            target: target.into(),
            doc_id: doc_id.into(),
            chunk_id: None,
            excerpt: None,
            confidence: 1.0,
            extraction_method: "unknown".to_string(),
            created_at: Utc::now(),
        }
    }

    /// Set the extraction confidence.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the extraction method label.
    pub fn with_extraction_method(mut self, method: impl Into<String>) -> Self {
        self.extraction_method = method.into();
        self
    }

    /// Set chunk-level provenance.
    pub fn with_chunk(mut self, chunk_id: impl Into<ChunkId>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }
}

/// Neighborhood of a node: the center, the nodes reachable within the
/// requested depth, the edges incident to the center, and summary stats.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphNeighborhood {
    /// Id of the node the neighborhood is rooted at
    pub center: NodeId,
    /// Center node followed by its neighbors (empty if the center is unknown)
    pub nodes: Vec<GraphNode>,
    /// Edges incident to the center
    pub edges: Vec<GraphEdge>,
    /// Degree and relation-type histogram for the center
    pub stats: NeighborhoodStats,
}

/// Summary statistics for a neighborhood.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NeighborhoodStats {
    /// Number of edges incident to the center
    pub degree: usize,
    /// Incident edge count per relation type
    pub relations_by_type: IndexMap<String, usize>,
}

/// A simple path through the graph, as a node id sequence.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphPath {
    /// Node ids from start to end inclusive
    pub nodes: Vec<NodeId>,
}

/// Per-node degree and connectivity statistics.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NodeStats {
    /// Total incident edges
    pub degree: usize,
    /// Incoming edges
    pub in_degree: usize,
    /// Outgoing edges
    pub out_degree: usize,
    /// Incident edge count per relation type
    pub relations_by_type: IndexMap<String, usize>,
    /// Number of distinct documents referenced by incident edges
    pub connected_docs: usize,
}
