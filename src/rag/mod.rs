//! Graph-guided retrieval.
//!
//! Bridges the knowledge graph and the search orchestrator: entity
//! mentions are lifted out of the question, matched against graph
//! nodes, and their neighborhoods steer which documents the evidence
//! search is narrowed to. The output is an evidence bundle a caller
//! can hand to a downstream answerer; no generation happens here.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::core::{CorpusId, DocumentId, Result, SearchResult};
use crate::graph::{GraphEdge, GraphNode, GraphStore};
use crate::search::{SearchMode, SearchOptions, SearchOrchestrator};

/// Upper bound on entity candidates taken from a question.
const MAX_ENTITY_CANDIDATES: usize = 5;

/// Graph nodes matched per candidate name.
const NODES_PER_CANDIDATE: usize = 2;

/// Coarse question shape, used to pick the graph expansion depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    /// Membership, containment, or organization questions
    Structural,
    /// Ordering or date questions
    Timeline,
    /// Contrast questions over two or more entities
    Comparison,
    /// Everything else
    Factual,
}

impl QuestionCategory {
    /// Classify a question by keyword. First category whose keyword
    /// list matches wins; no match means factual.
    pub fn classify(question: &str) -> Self {
        let lower = question.to_lowercase();
        const STRUCTURAL: &[&str] = &[
            "belong", "member", "part of", "consist", "structure", "hierarchy", "report to",
        ];
        const TIMELINE: &[&str] = &[
            "when", "timeline", "before", "after", "first", "chronolog", "history of", "date",
        ];
        const COMPARISON: &[&str] = &[
            "compare", "comparison", "versus", " vs ", "difference", "differ", "similar",
        ];

        if STRUCTURAL.iter().any(|kw| lower.contains(kw)) {
            QuestionCategory::Structural
        } else if TIMELINE.iter().any(|kw| lower.contains(kw)) {
            QuestionCategory::Timeline
        } else if COMPARISON.iter().any(|kw| lower.contains(kw)) {
            QuestionCategory::Comparison
        } else {
            QuestionCategory::Factual
        }
    }

    /// Graph expansion depth for this question shape. Multi-entity
    /// shapes look two hops out; factual lookups stay local.
    pub fn expansion_depth(self) -> usize {
        match self {
            QuestionCategory::Structural
            | QuestionCategory::Timeline
            | QuestionCategory::Comparison => 2,
            QuestionCategory::Factual => 1,
        }
    }
}

/// One graph neighborhood that informed retrieval.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphContext {
    /// What this context captures (currently always a neighborhood)
    pub context_type: String,
    /// Center node followed by its neighbors
    pub nodes: Vec<GraphNode>,
    /// Edges incident to the center
    pub edges: Vec<GraphEdge>,
    /// Human-readable one-liner for the bundle summary
    pub summary: String,
}

/// Everything retrieval produced for one question: ranked evidence,
/// the graph context that guided it, and a summary of what happened.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvidenceBundle {
    /// The question as asked
    pub question: String,
    /// Detected question shape
    pub category: QuestionCategory,
    /// Ranked evidence chunks
    pub evidence: Vec<SearchResult>,
    /// Graph neighborhoods that informed document narrowing
    pub graph_context: Vec<GraphContext>,
    /// One-line account of how the evidence was gathered
    pub retrieval_summary: String,
}

/// Runs graph-guided retrieval over one graph store and orchestrator.
pub struct GraphGuidedRetriever {
    graph: Arc<GraphStore>,
    orchestrator: Arc<SearchOrchestrator>,
}

impl GraphGuidedRetriever {
    pub fn new(graph: Arc<GraphStore>, orchestrator: Arc<SearchOrchestrator>) -> Self {
        Self { graph, orchestrator }
    }

    /// Retrieve evidence for a question against one corpus.
    ///
    /// Entity mentions are matched against the graph; documents named
    /// by the matched neighborhoods restrict the evidence search to
    /// their chunks. Only when the graph implicates no documents at
    /// all does the search run over the full corpus.
    pub fn retrieve(
        &self,
        corpus_id: &CorpusId,
        question: &str,
        mode: SearchMode,
        options: &SearchOptions,
    ) -> Result<EvidenceBundle> {
        let category = QuestionCategory::classify(question);
        let depth = category.expansion_depth();
        let candidates = extract_entity_names(question);

        let mut graph_context = Vec::new();
        let mut implicated_docs: IndexSet<DocumentId> = IndexSet::new();
        let mut matched_entities = 0usize;

        for name in &candidates {
            for node in self
                .graph
                .find_by_name(name)
                .into_iter()
                .take(NODES_PER_CANDIDATE)
            {
                matched_entities += 1;
                let hood = self.graph.neighborhood(&node.id, depth);

                for n in &hood.nodes {
                    if let Some(doc) = n.metadata.get("document_id") {
                        implicated_docs.insert(DocumentId::new(doc.clone()));
                    }
                }
                for e in &hood.edges {
                    implicated_docs.insert(e.doc_id.clone());
                }

                let summary = format!(
                    "{} ({}) with {} neighbors and {} relations",
                    node.name,
                    node.node_type,
                    hood.nodes.len().saturating_sub(1),
                    hood.edges.len()
                );
                graph_context.push(GraphContext {
                    context_type: "neighborhood".to_string(),
                    nodes: hood.nodes,
                    edges: hood.edges,
                    summary,
                });
            }
        }

        let docs: Vec<DocumentId> = implicated_docs.into_iter().collect();
        let narrowed = !docs.is_empty();
        let evidence = if narrowed {
            self.orchestrator
                .search_within_documents(corpus_id, question, mode, options, &docs)?
        } else {
            self.orchestrator.search(corpus_id, question, mode, options)?
        };

        let retrieval_summary = format!(
            "{:?} question; {} entity candidate(s), {} graph match(es); {} evidence chunk(s) from {}",
            category,
            candidates.len(),
            matched_entities,
            evidence.len(),
            if narrowed {
                format!("{} graph-implicated document(s)", docs.len())
            } else {
                "the full corpus".to_string()
            }
        );
        tracing::debug!(
            question,
            category = ?category,
            matches = matched_entities,
            narrowed,
            "graph-guided retrieval"
        );

        Ok(EvidenceBundle {
            question: question.to_string(),
            category,
            evidence,
            graph_context,
            retrieval_summary,
        })
    }
}

/// Pull likely entity mentions out of a question.
///
/// Capitalized words are candidates, with adjacent capitalized pairs
/// joined into a single candidate first so "Ada Lovelace" matches as
/// one name. Question openers ("What", "Who", ...) are skipped. At
/// most [`MAX_ENTITY_CANDIDATES`] are returned, in question order.
pub fn extract_entity_names(question: &str) -> Vec<String> {
    let skip: HashSet<&str> = [
        "What", "When", "Where", "Who", "Whom", "Whose", "Why", "How", "Which", "Is", "Are",
        "Was", "Were", "Does", "Do", "Did", "The", "A", "An",
    ]
    .into_iter()
    .collect();

    let words: Vec<&str> = question
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();

    let is_candidate = |w: &str| {
        w.chars().next().is_some_and(|c| c.is_uppercase()) && !skip.contains(w)
    };

    let mut names: IndexSet<String> = IndexSet::new();
    let mut i = 0;
    while i < words.len() {
        if is_candidate(words[i]) {
            if i + 1 < words.len() && is_candidate(words[i + 1]) {
                names.insert(format!("{} {}", words[i], words[i + 1]));
                i += 2;
                continue;
            }
            names.insert(words[i].to_string());
        }
        i += 1;
    }

    names.into_iter().take(MAX_ENTITY_CANDIDATES).collect()
}
