//! Code graph construction.
//!
//! Projects the element store into code nodes, derives `contain` edges from
//! span nesting, and attaches the parser's references as typed edges.
//! References that cannot be attached degrade to a counter, never an error.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tandem_graph_core::{
    CodeElement, CodeGraph, EdgeKind, ElementId, ElementStore, GraphEdge, Reference, ReferenceKind,
};

/// Counters for one code graph build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureReport {
    /// Containment edges derived from span nesting.
    pub contain_edges: usize,
    /// Call edges attached from parser references.
    pub call_edges: usize,
    /// Import edges attached from parser references.
    pub import_edges: usize,
    /// Inheritance edges attached from parser references.
    pub inherit_edges: usize,
    /// References dropped over a self-loop or an unknown endpoint.
    pub skipped_references: usize,
}

/// Build the code graph: one node per element, `contain` edges from span
/// nesting, reference edges from the parser. Edges come out in canonical
/// order.
pub fn build_code_graph(
    store: &ElementStore,
    references: &[Reference],
) -> (CodeGraph, StructureReport) {
    let mut graph = CodeGraph::from_store(store);
    let mut report = StructureReport::default();

    add_contain_edges(&mut graph, store, &mut report);
    add_reference_edges(&mut graph, store, references, &mut report);
    graph.sort_edges_canonical();

    info!(
        nodes = graph.node_count(),
        contain = report.contain_edges,
        call = report.call_edges,
        import = report.import_edges,
        inherit = report.inherit_edges,
        skipped = report.skipped_references,
        "built code graph"
    );
    (graph, report)
}

/// Each element is contained by its innermost strict encloser within the
/// same file. Taking the innermost parent gives every node at most one
/// container, so the `contain` edges form a forest by construction.
fn add_contain_edges(graph: &mut CodeGraph, store: &ElementStore, report: &mut StructureReport) {
    let mut by_file: HashMap<&str, Vec<&CodeElement>> = HashMap::new();
    for element in store.elements() {
        by_file
            .entry(element.file_path.as_str())
            .or_default()
            .push(element);
    }

    for element in store.elements() {
        let parent = by_file[element.file_path.as_str()]
            .iter()
            .copied()
            .filter(|candidate| candidate.encloses(element))
            .min_by_key(|candidate| (candidate.span_len(), &candidate.id));
        if let Some(parent) = parent {
            graph.edges.push(GraphEdge::new(
                parent.id.clone(),
                element.id.clone(),
                EdgeKind::Contain,
            ));
            report.contain_edges += 1;
        }
    }
}

/// Attach parser references as typed edges. Self-loops and references with
/// an endpoint missing from the store are counted as skipped; repeats of an
/// already-attached edge collapse silently.
fn add_reference_edges(
    graph: &mut CodeGraph,
    store: &ElementStore,
    references: &[Reference],
    report: &mut StructureReport,
) {
    let mut seen: HashSet<(EdgeKind, ElementId, ElementId)> = HashSet::new();

    for reference in references {
        let kind = match reference.kind {
            ReferenceKind::Call => EdgeKind::Call,
            ReferenceKind::Import => EdgeKind::Import,
            ReferenceKind::Inherit => EdgeKind::Inherit,
        };

        if reference.source == reference.target {
            report.skipped_references += 1;
            debug!(node = %reference.source, kind = %kind, "skipping self-referential edge");
            continue;
        }
        if !store.contains(&reference.source) || !store.contains(&reference.target) {
            report.skipped_references += 1;
            debug!(
                source = %reference.source,
                target = %reference.target,
                kind = %kind,
                "skipping reference with unknown endpoint"
            );
            continue;
        }
        if !seen.insert((kind, reference.source.clone(), reference.target.clone())) {
            continue;
        }

        graph.edges.push(GraphEdge::new(
            reference.source.clone(),
            reference.target.clone(),
            kind,
        ));
        match reference.kind {
            ReferenceKind::Call => report.call_edges += 1,
            ReferenceKind::Import => report.import_edges += 1,
            ReferenceKind::Inherit => report.inherit_edges += 1,
        }
    }
}
