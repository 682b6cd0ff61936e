//! Similarity linking over either graph.
//!
//! The linker embeds every node of one graph, runs the all-pairs scan in
//! [`VectorIndex`](crate::VectorIndex), and appends the resulting
//! `similar_to` edges. [`SimilarityTarget`] abstracts "a graph whose nodes
//! can be embedded": the requirement graph embeds node descriptions, the
//! code graph embeds raw element source pulled from the element store.

use serde::{Deserialize, Serialize};
use tandem_graph_core::{
    CodeGraph, EdgeKind, ElementId, ElementStore, GraphEdge, RequirementGraph,
};
use tracing::{debug, warn};

use crate::embedder::Embedder;
use crate::index::VectorIndex;
use crate::Embedding;

fn default_threshold() -> f32 {
    0.8
}

/// Tuning for one similarity-linking pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Minimum cosine score (inclusive) for a `similar_to` edge.
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// Counters for one linking pass over one graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    /// Nodes the pass looked at.
    pub nodes_total: usize,
    /// Nodes embedded during this pass.
    pub embedded: usize,
    /// Nodes whose cached embedding was reused.
    pub reused_cached: usize,
    /// Nodes skipped because the backend failed on them; they end the pass
    /// with no similarity edges.
    pub embedding_failures: usize,
    /// `similar_to` edges appended.
    pub edges_added: usize,
}

/// A graph whose nodes can be embedded and linked by similarity.
pub trait SimilarityTarget {
    /// All node ids in graph order, each with any cached embedding.
    fn embeddable(&self) -> Vec<(ElementId, Option<Embedding>)>;

    /// Text to embed for one node, if the node has usable text.
    fn embed_text(&self, id: &ElementId) -> Option<String>;

    /// Cache an embedding on the node for later reuse.
    fn set_embedding(&mut self, id: &ElementId, embedding: Embedding);

    /// Append a `similar_to` edge in the canonical direction handed in
    /// (`source` orders before `target`). Returns `false` when the edge
    /// already exists.
    fn add_similar_edge(&mut self, source: &ElementId, target: &ElementId, score: f32) -> bool;
}

impl SimilarityTarget for RequirementGraph {
    fn embeddable(&self) -> Vec<(ElementId, Option<Embedding>)> {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), n.embedding.clone()))
            .collect()
    }

    fn embed_text(&self, id: &ElementId) -> Option<String> {
        self.node(id).map(|n| n.description.clone())
    }

    fn set_embedding(&mut self, id: &ElementId, embedding: Embedding) {
        if let Some(node) = self.node_mut(id) {
            node.embedding = Some(embedding);
        }
    }

    fn add_similar_edge(&mut self, source: &ElementId, target: &ElementId, score: f32) -> bool {
        if self.has_edge(source, target, EdgeKind::SimilarTo) {
            return false;
        }
        self.edges.push(GraphEdge::weighted(
            source.clone(),
            target.clone(),
            EdgeKind::SimilarTo,
            score,
        ));
        true
    }
}

/// Code graph plus the element store its embedding text comes from.
pub struct CodeGraphTarget<'a> {
    graph: &'a mut CodeGraph,
    store: &'a ElementStore,
}

impl<'a> CodeGraphTarget<'a> {
    pub fn new(graph: &'a mut CodeGraph, store: &'a ElementStore) -> Self {
        Self { graph, store }
    }
}

impl SimilarityTarget for CodeGraphTarget<'_> {
    fn embeddable(&self) -> Vec<(ElementId, Option<Embedding>)> {
        self.graph
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.embedding.clone()))
            .collect()
    }

    fn embed_text(&self, id: &ElementId) -> Option<String> {
        self.store.get(id).map(|e| e.raw_source.clone())
    }

    fn set_embedding(&mut self, id: &ElementId, embedding: Embedding) {
        if let Some(node) = self.graph.node_mut(id) {
            node.embedding = Some(embedding);
        }
    }

    fn add_similar_edge(&mut self, source: &ElementId, target: &ElementId, score: f32) -> bool {
        if self.graph.has_edge(source, target, EdgeKind::SimilarTo) {
            return false;
        }
        self.graph.edges.push(GraphEdge::weighted(
            source.clone(),
            target.clone(),
            EdgeKind::SimilarTo,
            score,
        ));
        true
    }
}

/// Embed every node of `target` and append `similar_to` edges for all pairs
/// scoring at or above the configured threshold.
///
/// Embedding runs as one batch first; if the batch call fails, each node is
/// retried individually so one bad input only costs that node. Nodes that
/// still fail are counted and excluded from linking rather than failing the
/// pass.
pub fn link_by_similarity<T: SimilarityTarget>(
    target: &mut T,
    embedder: &dyn Embedder,
    config: &SimilarityConfig,
) -> LinkReport {
    let nodes = target.embeddable();
    let mut report = LinkReport {
        nodes_total: nodes.len(),
        ..LinkReport::default()
    };
    let mut index = VectorIndex::new(embedder.dimension());
    let mut pending: Vec<(ElementId, String)> = Vec::new();

    for (id, cached) in nodes {
        if let Some(embedding) = cached {
            index.upsert(id, embedding);
            report.reused_cached += 1;
            continue;
        }
        match target.embed_text(&id) {
            Some(text) => pending.push((id, text)),
            None => {
                warn!(node = %id, "no embeddable text for node");
                report.embedding_failures += 1;
            }
        }
    }

    if !pending.is_empty() {
        debug!(
            model = embedder.model_name(),
            count = pending.len(),
            "embedding batch"
        );
        let texts: Vec<&str> = pending.iter().map(|(_, t)| t.as_str()).collect();
        match embedder.embed(&texts) {
            Ok(vectors) if vectors.len() == pending.len() => {
                for ((id, _), embedding) in pending.iter().zip(vectors) {
                    target.set_embedding(id, embedding.clone());
                    index.upsert(id.clone(), embedding);
                    report.embedded += 1;
                }
            }
            outcome => {
                if let Err(err) = outcome {
                    debug!(error = %err, "batch embed failed; retrying per node");
                }
                for (id, text) in &pending {
                    match embedder.embed(&[text.as_str()]) {
                        Ok(mut vectors) if !vectors.is_empty() => {
                            let embedding = vectors.remove(0);
                            target.set_embedding(id, embedding.clone());
                            index.upsert(id.clone(), embedding);
                            report.embedded += 1;
                        }
                        Ok(_) => {
                            warn!(node = %id, "backend returned no vector; node skipped");
                            report.embedding_failures += 1;
                        }
                        Err(err) => {
                            warn!(node = %id, error = %err, "embedding failed; node skipped");
                            report.embedding_failures += 1;
                        }
                    }
                }
            }
        }
    }

    for pair in index.scan_pairs(config.threshold) {
        if target.add_similar_edge(&pair.source, &pair.target, pair.score) {
            report.edges_added += 1;
        }
    }

    debug!(
        nodes = report.nodes_total,
        edges = report.edges_added,
        failures = report.embedding_failures,
        "similarity pass complete"
    );
    report
}
