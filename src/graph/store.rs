//! In-memory typed graph store with ontology-gated mutation.
//!
//! The store is a process-wide singleton shared across corpora: the
//! graph links entities between documents and corpora by design. All
//! methods take `&self` and lock internally, so one instance can sit
//! behind an `Arc` under the usual reader-writer discipline.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::core::{EdgeId, EvidenceRagError, NodeId, Result};

use super::{GraphEdge, GraphNeighborhood, GraphNode, GraphPath, NeighborhoodStats, NodeStats, Ontology};

#[derive(Default)]
struct GraphInner {
    graph: Graph<GraphNode, GraphEdge>,
    node_index: HashMap<NodeId, NodeIndex>,
    edge_index: HashMap<EdgeId, EdgeIndex>,
}

/// Typed node/edge store with provenance per edge.
///
/// When an [`Ontology`] is attached, every mutation is validated at the
/// boundary: node types must resolve, edge triples must be permitted by
/// the domain/range table, and both edge endpoints must exist. Nothing
/// is partially written on failure.
pub struct GraphStore {
    ontology: Option<Arc<Ontology>>,
    inner: RwLock<GraphInner>,
}

impl GraphStore {
    /// Create an unvalidated store (no ontology attached).
    pub fn new() -> Self {
        Self {
            ontology: None,
            inner: RwLock::new(GraphInner::default()),
        }
    }

    /// Create a store whose mutations are gated by `ontology`.
    pub fn with_ontology(ontology: Arc<Ontology>) -> Self {
        Self {
            ontology: Some(ontology),
            inner: RwLock::new(GraphInner::default()),
        }
    }

    /// The attached ontology, if any.
    pub fn ontology(&self) -> Option<&Arc<Ontology>> {
        self.ontology.as_ref()
    }

    /// Insert or replace a node.
    ///
    /// Same id: type, name, aliases, and metadata are replaced,
    /// `created_at` is preserved, `updated_at` refreshed. With an
    /// ontology attached, the node type must resolve (alias-aware,
    /// case-insensitive) and is rewritten to its canonical name.
    pub fn upsert_node(&self, mut node: GraphNode) -> Result<GraphNode> {
        if let Some(ontology) = &self.ontology {
            let resolved = ontology.resolve_entity_type(&node.node_type).ok_or_else(|| {
                EvidenceRagError::Validation {
                    message: format!("unknown entity type: {}", node.node_type),
                }
            })?;
            node.node_type = resolved.to_string();
        }

        let mut inner = self.inner.write();
        if let Some(&idx) = inner.node_index.get(&node.id) {
            let existing = inner
                .graph
                .node_weight_mut(idx)
                .expect("node index maps to live node");
            node.created_at = existing.created_at;
            node.updated_at = Utc::now();
            *existing = node.clone();
        } else {
            let idx = inner.graph.add_node(node.clone());
            inner.node_index.insert(node.id.clone(), idx);
        }
        Ok(node)
    }

    /// Insert a new edge.
    ///
    /// Fails if either endpoint is missing, if the edge id already
    /// exists, if the confidence is outside [0, 1], or (with an ontology
    /// attached) if `(source.type, edge.type, target.type)` is not a
    /// permitted triple.
    pub fn add_edge(&self, edge: GraphEdge) -> Result<GraphEdge> {
        if !(0.0..=1.0).contains(&edge.confidence) {
            return Err(EvidenceRagError::Validation {
                message: format!("edge confidence {} outside [0, 1]", edge.confidence),
            });
        }

        let mut inner = self.inner.write();
        if inner.edge_index.contains_key(&edge.id) {
            return Err(EvidenceRagError::AlreadyExists {
                resource: "edge".to_string(),
                id: edge.id.to_string(),
            });
        }

        let source_idx = *inner.node_index.get(&edge.source).ok_or_else(|| {
            EvidenceRagError::GraphConstruction {
                message: format!("edge {} references missing source node {}", edge.id, edge.source),
            }
        })?;
        let target_idx = *inner.node_index.get(&edge.target).ok_or_else(|| {
            EvidenceRagError::GraphConstruction {
                message: format!("edge {} references missing target node {}", edge.id, edge.target),
            }
        })?;

        if let Some(ontology) = &self.ontology {
            let subject_type = &inner.graph[source_idx].node_type;
            let object_type = &inner.graph[target_idx].node_type;
            if !ontology.validate_relation(subject_type, &edge.edge_type, object_type) {
                return Err(EvidenceRagError::Validation {
                    message: format!(
                        "invalid relation: {} for {} -> {}",
                        edge.edge_type, subject_type, object_type
                    ),
                });
            }
        }

        let edge_idx = inner.graph.add_edge(source_idx, target_idx, edge.clone());
        inner.edge_index.insert(edge.id.clone(), edge_idx);

        tracing::debug!(edge = %edge.id, edge_type = %edge.edge_type, "added graph edge");
        Ok(edge)
    }

    /// Look up a node by id.
    pub fn get_node(&self, node_id: &NodeId) -> Option<GraphNode> {
        let inner = self.inner.read();
        let idx = inner.node_index.get(node_id)?;
        inner.graph.node_weight(*idx).cloned()
    }

    /// Case-insensitive exact match on node name (not substring).
    ///
    /// Fuzzy matching belongs upstream: resolve via aliases or a
    /// higher-level heuristic before calling this.
    pub fn find_by_name(&self, name: &str) -> Vec<GraphNode> {
        let needle = name.to_lowercase();
        let inner = self.inner.read();
        inner
            .graph
            .node_weights()
            .filter(|n| n.name.to_lowercase() == needle)
            .cloned()
            .collect()
    }

    /// All nodes, in insertion order.
    pub fn list_nodes(&self) -> Vec<GraphNode> {
        self.inner.read().graph.node_weights().cloned().collect()
    }

    /// Look up an edge by id.
    pub fn get_edge(&self, edge_id: &EdgeId) -> Option<GraphEdge> {
        let inner = self.inner.read();
        let idx = inner.edge_index.get(edge_id)?;
        inner.graph.edge_weight(*idx).cloned()
    }

    /// Outgoing edges of a node.
    pub fn edges_from(&self, node_id: &NodeId) -> Vec<GraphEdge> {
        self.directed_edges(node_id, Direction::Outgoing)
    }

    /// Incoming edges of a node.
    pub fn edges_to(&self, node_id: &NodeId) -> Vec<GraphEdge> {
        self.directed_edges(node_id, Direction::Incoming)
    }

    fn directed_edges(&self, node_id: &NodeId, direction: Direction) -> Vec<GraphEdge> {
        let inner = self.inner.read();
        let Some(&idx) = inner.node_index.get(node_id) else {
            return Vec::new();
        };
        inner
            .graph
            .edges_directed(idx, direction)
            .map(|e| e.weight().clone())
            .collect()
    }

    /// All edges between a node pair, in either direction.
    pub fn edges_between(&self, node_a: &NodeId, node_b: &NodeId) -> Vec<GraphEdge> {
        let inner = self.inner.read();
        let (Some(&a), Some(&b)) = (inner.node_index.get(node_a), inner.node_index.get(node_b))
        else {
            return Vec::new();
        };
        inner
            .graph
            .edges_directed(a, Direction::Outgoing)
            .filter(|e| e.target() == b)
            .chain(
                inner
                    .graph
                    .edges_directed(b, Direction::Outgoing)
                    .filter(|e| e.target() == a),
            )
            .map(|e| e.weight().clone())
            .collect()
    }

    /// Breadth-first neighbor expansion up to `depth` hops, traversing
    /// edges in both directions. The result is deduplicated and excludes
    /// the start node. Unknown start node yields an empty list. A depth
    /// of 0 behaves as depth 1.
    pub fn neighbors(&self, node_id: &NodeId, depth: usize) -> Vec<GraphNode> {
        let depth = depth.max(1);
        let inner = self.inner.read();
        let Some(&start) = inner.node_index.get(node_id) else {
            return Vec::new();
        };

        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut result = Vec::new();
        let mut frontier = VecDeque::from([(start, 0usize)]);

        while let Some((current, d)) = frontier.pop_front() {
            if d >= depth {
                continue;
            }
            for neighbor in undirected_neighbors(&inner.graph, current) {
                if !visited.insert(neighbor) {
                    continue;
                }
                if let Some(node) = inner.graph.node_weight(neighbor) {
                    result.push(node.clone());
                }
                frontier.push_back((neighbor, d + 1));
            }
        }
        result
    }

    /// Neighborhood view rooted at `node_id`: the center node, its
    /// neighbors within `depth` hops, the edges incident to the center,
    /// and summary stats. Unknown center yields an empty neighborhood.
    pub fn neighborhood(&self, node_id: &NodeId, depth: usize) -> GraphNeighborhood {
        let Some(center) = self.get_node(node_id) else {
            return GraphNeighborhood {
                center: node_id.clone(),
                nodes: Vec::new(),
                edges: Vec::new(),
                stats: NeighborhoodStats::default(),
            };
        };

        let neighbors = self.neighbors(node_id, depth);
        let mut edges = self.edges_from(node_id);
        edges.extend(self.edges_to(node_id));

        let mut relations_by_type: IndexMap<String, usize> = IndexMap::new();
        for edge in &edges {
            *relations_by_type.entry(edge.edge_type.clone()).or_insert(0) += 1;
        }
        let stats = NeighborhoodStats {
            degree: edges.len(),
            relations_by_type,
        };

        let mut nodes = Vec::with_capacity(neighbors.len() + 1);
        nodes.push(center);
        nodes.extend(neighbors);

        GraphNeighborhood {
            center: node_id.clone(),
            nodes,
            edges,
            stats,
        }
    }

    /// Enumerate all simple paths (no repeated node) from `start` to
    /// `end` with at most `max_hops` edges, traversing undirected.
    ///
    /// `start == end` yields the trivial one-node path; no path within
    /// the budget yields an empty list.
    pub fn find_paths(&self, start: &NodeId, end: &NodeId, max_hops: usize) -> Vec<GraphPath> {
        if start == end {
            return vec![GraphPath {
                nodes: vec![start.clone()],
            }];
        }
        let max_hops = max_hops.max(1);

        let inner = self.inner.read();
        let (Some(&start_idx), Some(&end_idx)) =
            (inner.node_index.get(start), inner.node_index.get(end))
        else {
            return Vec::new();
        };

        let mut paths = Vec::new();
        let mut queue: VecDeque<Vec<NodeIndex>> = VecDeque::from([vec![start_idx]]);

        // A path of n nodes spans n - 1 hops; queue admission keeps
        // every extension within the hop budget.
        while let Some(path) = queue.pop_front() {
            let current = *path.last().expect("paths are never empty");
            for neighbor in undirected_neighbors(&inner.graph, current) {
                if path.contains(&neighbor) {
                    continue;
                }
                let mut new_path = path.clone();
                new_path.push(neighbor);
                if neighbor == end_idx {
                    paths.push(new_path);
                } else if new_path.len() <= max_hops {
                    queue.push_back(new_path);
                }
            }
        }

        paths
            .into_iter()
            .map(|path| GraphPath {
                nodes: path
                    .into_iter()
                    .map(|idx| inner.graph[idx].id.clone())
                    .collect(),
            })
            .collect()
    }

    /// Degree and connectivity statistics for a node. Unknown node
    /// yields `None`.
    pub fn node_stats(&self, node_id: &NodeId) -> Option<NodeStats> {
        self.get_node(node_id)?;

        let edges_out = self.edges_from(node_id);
        let edges_in = self.edges_to(node_id);

        let mut relations_by_type: IndexMap<String, usize> = IndexMap::new();
        let mut docs: HashSet<&str> = HashSet::new();
        for edge in edges_out.iter().chain(edges_in.iter()) {
            *relations_by_type.entry(edge.edge_type.clone()).or_insert(0) += 1;
            docs.insert(edge.doc_id.0.as_str());
        }

        Some(NodeStats {
            degree: edges_out.len() + edges_in.len(),
            in_degree: edges_in.len(),
            out_degree: edges_out.len(),
            relations_by_type,
            connected_docs: docs.len(),
        })
    }

    /// Number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.inner.read().graph.node_count()
    }

    /// Number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.inner.read().graph.edge_count()
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn undirected_neighbors(graph: &Graph<GraphNode, GraphEdge>, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut out: Vec<NodeIndex> = graph
        .edges_directed(idx, Direction::Outgoing)
        .map(|e| e.target())
        .chain(
            graph
                .edges_directed(idx, Direction::Incoming)
                .map(|e| e.source()),
        )
        .collect();
    // Multi-edges between the same pair produce repeats
    out.sort();
    out.dedup();
    out
}
