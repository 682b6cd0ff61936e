//! Requirement graph construction.
//!
//! Builds the natural-language side of the bundle: one requirement node per
//! element with a usable description. Docstrings win; a pluggable generator
//! may fill in for elements without one. Elements with neither are left out
//! of the requirement graph entirely, while still appearing in the code
//! graph.
//!
//! Node creation is deliberately edge-free. Hierarchy edges are derived
//! afterwards by [`derive_parent_child`] so node building stays independently
//! testable.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use tandem_graph_core::{
    CodeElement, CodeGraph, EdgeKind, ElementStore, GraphEdge, RequirementGraph, RequirementNode,
};

/// No description could be produced for an element.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("description failed: {message}")]
pub struct DescriptionError {
    /// Source-specific failure detail.
    pub message: String,
}

impl DescriptionError {
    /// Create a description error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Where requirement descriptions come from.
///
/// [`docstring`](DescriptionSource::docstring) is consulted first; only when
/// it yields nothing is [`generate`](DescriptionSource::generate) asked to
/// synthesize one. Generators may call out to external services; any timeout
/// belongs inside the implementation, surfacing as a [`DescriptionError`]
/// for that element.
pub trait DescriptionSource {
    /// Description taken directly from the element, if any.
    fn docstring(&self, element: &CodeElement) -> Option<String> {
        element
            .docstring
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Synthesize a description for an element without a docstring.
    fn generate(&self, element: &CodeElement) -> Result<String, DescriptionError>;
}

/// Docstring-only source. Never generates, which keeps builds fully offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocstringSource;

impl DescriptionSource for DocstringSource {
    fn generate(&self, element: &CodeElement) -> Result<String, DescriptionError> {
        Err(DescriptionError::new(format!(
            "no docstring on {}",
            element.qualified_name
        )))
    }
}

/// Counters for one requirement-node build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeReport {
    /// Nodes whose description came straight from a docstring.
    pub from_docstring: usize,
    /// Nodes whose description was synthesized.
    pub generated: usize,
    /// Elements excluded because no description could be produced.
    pub failures: usize,
}

/// Build requirement nodes for every element with a usable description.
///
/// An element the source cannot describe is counted and skipped; the build
/// goes on without it.
pub fn build_requirement_nodes(
    store: &ElementStore,
    source: &dyn DescriptionSource,
) -> (RequirementGraph, DescribeReport) {
    let mut graph = RequirementGraph::empty();
    let mut report = DescribeReport::default();

    for element in store.elements() {
        if let Some(text) = source.docstring(element) {
            graph
                .nodes
                .push(RequirementNode::new(element.id.clone(), text));
            report.from_docstring += 1;
            continue;
        }
        match source.generate(element) {
            Ok(text) => {
                graph
                    .nodes
                    .push(RequirementNode::new(element.id.clone(), text));
                report.generated += 1;
            }
            Err(err) => {
                report.failures += 1;
                warn!(
                    element = %element.qualified_name,
                    error = %err,
                    "element excluded from requirement graph"
                );
            }
        }
    }

    info!(
        nodes = graph.node_count(),
        from_docstring = report.from_docstring,
        generated = report.generated,
        failures = report.failures,
        "built requirement nodes"
    );
    (graph, report)
}

/// Mirror the code graph's hierarchy into the requirement graph.
///
/// Every `contain` and `call` edge whose endpoints both have requirement
/// nodes becomes one `parent_child` edge in the same direction: the
/// container or caller is the parent. Duplicates collapse. Returns the
/// number of edges added.
pub fn derive_parent_child(requirements: &mut RequirementGraph, code: &CodeGraph) -> usize {
    let mut added = 0;
    for edge in code
        .edges
        .iter()
        .filter(|e| matches!(e.kind, EdgeKind::Contain | EdgeKind::Call))
    {
        if !requirements.contains_node(&edge.source) || !requirements.contains_node(&edge.target) {
            continue;
        }
        if requirements.has_edge(&edge.source, &edge.target, EdgeKind::ParentChild) {
            continue;
        }
        requirements.edges.push(GraphEdge::new(
            edge.source.clone(),
            edge.target.clone(),
            EdgeKind::ParentChild,
        ));
        added += 1;
    }
    added
}
