//! The two graphs and their shared edge model.
//!
//! Both graphs are plain node/edge lists over the shared [`ElementId`]
//! space. Builders own deduplication while a graph is under construction;
//! [`RequirementGraph::validate`] and [`CodeGraph::validate`] re-check every
//! invariant before a build is allowed to publish.

use crate::element::{CodeElement, ElementKind, ElementStore};
use crate::id::ElementId;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Dense vector produced by an embedding backend.
pub type Embedding = Vec<f32>;

// =============================================================================
// Edges
// =============================================================================

/// Every edge type either graph can carry.
///
/// The derived `Ord` gives edge kinds their canonical sort position, which
/// fixes the order of serialized edge lists and of neighbor listings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Lexical containment, container to contained (code graph).
    Contain,
    /// Invocation, caller to callee (code graph).
    Call,
    /// Import, importer to imported (code graph).
    Import,
    /// Inheritance, subtype to supertype (code graph).
    Inherit,
    /// Semantic hierarchy, parent to child (requirement graph).
    ParentChild,
    /// Embedding similarity at or above the configured threshold (both
    /// graphs); symmetric, stored once with source id < target id.
    SimilarTo,
}

impl EdgeKind {
    /// Whether the kind may appear in the code graph.
    pub fn allowed_in_code(&self) -> bool {
        !matches!(self, EdgeKind::ParentChild)
    }

    /// Whether the kind may appear in the requirement graph.
    pub fn allowed_in_requirement(&self) -> bool {
        matches!(self, EdgeKind::ParentChild | EdgeKind::SimilarTo)
    }

    /// Whether the kind describes code structure rather than similarity.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            EdgeKind::Contain | EdgeKind::Call | EdgeKind::Import | EdgeKind::Inherit
        )
    }

    /// Whether the kind is symmetric (direction carries no meaning).
    pub fn is_symmetric(&self) -> bool {
        matches!(self, EdgeKind::SimilarTo)
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::Contain => write!(f, "contain"),
            EdgeKind::Call => write!(f, "call"),
            EdgeKind::Import => write!(f, "import"),
            EdgeKind::Inherit => write!(f, "inherit"),
            EdgeKind::ParentChild => write!(f, "parent_child"),
            EdgeKind::SimilarTo => write!(f, "similar_to"),
        }
    }
}

/// Directed, typed connection between two nodes of one graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Originating node id.
    pub source: ElementId,
    /// Destination node id.
    pub target: ElementId,
    /// Type of the relationship.
    pub kind: EdgeKind,
    /// Similarity score for `similar_to` edges, `None` for structural and
    /// hierarchy edges.
    pub weight: Option<f32>,
}

impl GraphEdge {
    /// Create an unweighted edge.
    pub fn new(source: ElementId, target: ElementId, kind: EdgeKind) -> Self {
        Self {
            source,
            target,
            kind,
            weight: None,
        }
    }

    /// Create a weighted edge.
    pub fn weighted(source: ElementId, target: ElementId, kind: EdgeKind, weight: f32) -> Self {
        Self {
            source,
            target,
            kind,
            weight: Some(weight),
        }
    }

    /// The identity triple that defines edge uniqueness.
    pub fn key(&self) -> (EdgeKind, &ElementId, &ElementId) {
        (self.kind, &self.source, &self.target)
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// One node of the requirement graph: the natural-language side of an
/// element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementNode {
    /// Same id as the element it describes.
    pub id: ElementId,
    /// Natural-language description (docstring or generated text).
    pub description: String,
    /// Cached embedding of the description, filled in by the linker.
    pub embedding: Option<Embedding>,
}

impl RequirementNode {
    /// Create a node without an embedding.
    pub fn new(id: ElementId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            embedding: None,
        }
    }
}

/// One node of the code graph: the structural side of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeNode {
    /// Same id as the element it mirrors.
    pub id: ElementId,
    /// Fully qualified name of the element.
    pub name: String,
    /// Category of the element.
    pub kind: ElementKind,
    /// Repository-relative path of the defining file.
    pub file_path: String,
    /// Cached embedding of the raw source, filled in by the linker.
    pub embedding: Option<Embedding>,
}

impl CodeNode {
    /// Project an element into its code-graph node.
    pub fn from_element(element: &CodeElement) -> Self {
        Self {
            id: element.id.clone(),
            name: element.qualified_name.clone(),
            kind: element.kind,
            file_path: element.file_path.clone(),
            embedding: None,
        }
    }
}

// =============================================================================
// Graphs
// =============================================================================

/// Violation of a graph invariant, detected by [`RequirementGraph::validate`]
/// or [`CodeGraph::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// An edge whose source equals its target.
    #[error("self-loop on node {0}")]
    SelfLoop(ElementId),
    /// An edge endpoint with no corresponding node.
    #[error("edge endpoint {0} is not a node of the graph")]
    UnknownEndpoint(ElementId),
    /// Two edges with identical (source, target, kind).
    #[error("duplicate edge {source} -[{kind}]-> {target}")]
    DuplicateEdge {
        source: ElementId,
        kind: EdgeKind,
        target: ElementId,
    },
    /// An edge kind the graph does not admit.
    #[error("edge kind {0} is not allowed in this graph")]
    KindNotAllowed(EdgeKind),
    /// A node with more than one `contain` parent.
    #[error("node {0} has more than one container")]
    MultipleContainers(ElementId),
    /// A cycle through `contain` edges.
    #[error("containment edges form a cycle")]
    ContainCycle,
}

/// The semantic graph: requirement nodes plus `parent_child` and
/// `similar_to` edges.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementGraph {
    /// All requirement nodes.
    pub nodes: Vec<RequirementNode>,
    /// All edges between requirement nodes.
    pub edges: Vec<GraphEdge>,
}

impl RequirementGraph {
    /// Creates an empty graph.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of nodes currently tracked.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges currently tracked.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges of the given kind.
    pub fn edge_count_of_kind(&self, kind: EdgeKind) -> usize {
        self.edges.iter().filter(|e| e.kind == kind).count()
    }

    /// Whether a node with this id exists.
    pub fn contains_node(&self, id: &ElementId) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    /// Look up a node by id.
    pub fn node(&self, id: &ElementId) -> Option<&RequirementNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Look up a node mutably, e.g. to cache an embedding.
    pub fn node_mut(&mut self, id: &ElementId) -> Option<&mut RequirementNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    /// Whether an edge with this exact (source, target, kind) exists.
    pub fn has_edge(&self, source: &ElementId, target: &ElementId, kind: EdgeKind) -> bool {
        edge_exists(&self.edges, source, target, kind)
    }

    /// Iterate edges of one kind.
    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Sort edges into canonical order: by kind, then source, then target.
    pub fn sort_edges_canonical(&mut self) {
        sort_edges(&mut self.edges);
    }

    /// Convert to a petgraph graph for traversal or analysis.
    /// Returns the graph and a mapping from ElementId to NodeIndex.
    pub fn to_petgraph(
        &self,
    ) -> (
        StableDiGraph<RequirementNode, EdgeKind>,
        HashMap<ElementId, NodeIndex>,
    ) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for node in &self.nodes {
            let idx = graph.add_node(node.clone());
            id_to_index.insert(node.id.clone(), idx);
        }

        for edge in &self.edges {
            if let (Some(&from_idx), Some(&to_idx)) = (
                id_to_index.get(&edge.source),
                id_to_index.get(&edge.target),
            ) {
                graph.add_edge(from_idx, to_idx, edge.kind);
            }
        }

        (graph, id_to_index)
    }

    /// Check every invariant the graph must uphold before publication.
    pub fn validate(&self) -> Result<(), GraphError> {
        check_edges(
            &self.edges,
            &self.nodes.iter().map(|n| &n.id).collect(),
            EdgeKind::allowed_in_requirement,
        )
    }
}

/// The structural graph: code nodes plus structural and `similar_to` edges.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeGraph {
    /// All code nodes.
    pub nodes: Vec<CodeNode>,
    /// All edges between code nodes.
    pub edges: Vec<GraphEdge>,
}

impl CodeGraph {
    /// Creates an empty graph.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Project every stored element into a node, with no edges yet.
    pub fn from_store(store: &ElementStore) -> Self {
        Self {
            nodes: store.elements().iter().map(CodeNode::from_element).collect(),
            edges: Vec::new(),
        }
    }

    /// Returns the number of nodes currently tracked.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of edges currently tracked.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges of the given kind.
    pub fn edge_count_of_kind(&self, kind: EdgeKind) -> usize {
        self.edges.iter().filter(|e| e.kind == kind).count()
    }

    /// Whether a node with this id exists.
    pub fn contains_node(&self, id: &ElementId) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    /// Look up a node by id.
    pub fn node(&self, id: &ElementId) -> Option<&CodeNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Look up a node mutably, e.g. to cache an embedding.
    pub fn node_mut(&mut self, id: &ElementId) -> Option<&mut CodeNode> {
        self.nodes.iter_mut().find(|n| &n.id == id)
    }

    /// Whether an edge with this exact (source, target, kind) exists.
    pub fn has_edge(&self, source: &ElementId, target: &ElementId, kind: EdgeKind) -> bool {
        edge_exists(&self.edges, source, target, kind)
    }

    /// Iterate edges of one kind.
    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// Sort edges into canonical order: by kind, then source, then target.
    pub fn sort_edges_canonical(&mut self) {
        sort_edges(&mut self.edges);
    }

    /// Convert to a petgraph graph for traversal or analysis.
    /// Returns the graph and a mapping from ElementId to NodeIndex.
    pub fn to_petgraph(
        &self,
    ) -> (
        StableDiGraph<CodeNode, EdgeKind>,
        HashMap<ElementId, NodeIndex>,
    ) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for node in &self.nodes {
            let idx = graph.add_node(node.clone());
            id_to_index.insert(node.id.clone(), idx);
        }

        for edge in &self.edges {
            if let (Some(&from_idx), Some(&to_idx)) = (
                id_to_index.get(&edge.source),
                id_to_index.get(&edge.target),
            ) {
                graph.add_edge(from_idx, to_idx, edge.kind);
            }
        }

        (graph, id_to_index)
    }

    /// Check every invariant the graph must uphold before publication,
    /// including that `contain` edges form a forest.
    pub fn validate(&self) -> Result<(), GraphError> {
        check_edges(
            &self.edges,
            &self.nodes.iter().map(|n| &n.id).collect(),
            EdgeKind::allowed_in_code,
        )?;
        check_contain_forest(&self.edges)
    }
}

// =============================================================================
// Shared edge logic
// =============================================================================

fn edge_exists(
    edges: &[GraphEdge],
    source: &ElementId,
    target: &ElementId,
    kind: EdgeKind,
) -> bool {
    edges
        .iter()
        .any(|e| e.kind == kind && &e.source == source && &e.target == target)
}

fn sort_edges(edges: &mut [GraphEdge]) {
    edges.sort_by(|a, b| a.key().cmp(&b.key()));
}

fn check_edges(
    edges: &[GraphEdge],
    node_ids: &HashSet<&ElementId>,
    allowed: impl Fn(&EdgeKind) -> bool,
) -> Result<(), GraphError> {
    let mut seen: HashSet<(EdgeKind, &ElementId, &ElementId)> = HashSet::new();
    for edge in edges {
        if !allowed(&edge.kind) {
            return Err(GraphError::KindNotAllowed(edge.kind));
        }
        if edge.source == edge.target {
            return Err(GraphError::SelfLoop(edge.source.clone()));
        }
        if !node_ids.contains(&edge.source) {
            return Err(GraphError::UnknownEndpoint(edge.source.clone()));
        }
        if !node_ids.contains(&edge.target) {
            return Err(GraphError::UnknownEndpoint(edge.target.clone()));
        }
        if !seen.insert(edge.key()) {
            return Err(GraphError::DuplicateEdge {
                source: edge.source.clone(),
                kind: edge.kind,
                target: edge.target.clone(),
            });
        }
    }
    Ok(())
}

/// `contain` edges must form a forest: at most one container per node and
/// no cycles.
fn check_contain_forest(edges: &[GraphEdge]) -> Result<(), GraphError> {
    let mut contained: HashSet<&ElementId> = HashSet::new();
    let mut indices: HashMap<&ElementId, NodeIndex> = HashMap::new();
    let mut digraph: DiGraph<(), ()> = DiGraph::new();

    for edge in edges.iter().filter(|e| e.kind == EdgeKind::Contain) {
        if !contained.insert(&edge.target) {
            return Err(GraphError::MultipleContainers(edge.target.clone()));
        }
        let from = *indices
            .entry(&edge.source)
            .or_insert_with(|| digraph.add_node(()));
        let to = *indices
            .entry(&edge.target)
            .or_insert_with(|| digraph.add_node(()));
        digraph.add_edge(from, to, ());
    }

    if is_cyclic_directed(&digraph) {
        return Err(GraphError::ContainCycle);
    }
    Ok(())
}
