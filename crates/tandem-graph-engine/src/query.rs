//! Read-only query surface over a published bundle.
//!
//! [`GraphQuery`] is the one interface handed to the reasoning agent. It
//! precomputes adjacency once and never mutates the bundle, so any number of
//! readers can share it.
//!
//! Both graphs live in one id space, so neighbor listings merge the
//! requirement and code sides: asking around an element answers with its
//! structural edges and its semantic edges together. `similar_to` edges are
//! symmetric and reported from both endpoints.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tandem_graph_core::{CodeElement, EdgeKind, ElementId, GraphEdge};

use crate::artifact::GraphBundle;
use crate::error::{QueryError, QueryResult};

/// One neighbor of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Id of the adjacent node.
    pub id: ElementId,
    /// Kind of the connecting edge.
    pub kind: EdgeKind,
    /// Similarity score for `similar_to` edges, `None` otherwise.
    pub weight: Option<f32>,
}

/// Read-only queries over one bundle.
#[derive(Debug)]
pub struct GraphQuery<'a> {
    bundle: &'a GraphBundle,
    /// Every node id of either graph.
    node_ids: HashSet<ElementId>,
    /// Neighbor lists from requirement graph edges, sorted.
    requirement_adjacency: HashMap<ElementId, Vec<Neighbor>>,
    /// Neighbor lists from code graph edges, sorted.
    code_adjacency: HashMap<ElementId, Vec<Neighbor>>,
    /// Directed successor lists over all non-`similar_to` edges of both
    /// graphs, sorted; drives the path search.
    structural: HashMap<ElementId, Vec<ElementId>>,
}

impl<'a> GraphQuery<'a> {
    /// Build the query surface for a bundle.
    pub fn new(bundle: &'a GraphBundle) -> Self {
        let mut node_ids: HashSet<ElementId> = HashSet::new();
        node_ids.extend(bundle.requirement_graph.nodes.iter().map(|n| n.id.clone()));
        node_ids.extend(bundle.code_graph.nodes.iter().map(|n| n.id.clone()));

        let requirement_adjacency = adjacency_of(&bundle.requirement_graph.edges);
        let code_adjacency = adjacency_of(&bundle.code_graph.edges);

        let mut structural: HashMap<ElementId, Vec<ElementId>> = HashMap::new();
        let all_edges = bundle
            .requirement_graph
            .edges
            .iter()
            .chain(bundle.code_graph.edges.iter());
        for edge in all_edges.filter(|e| e.kind != EdgeKind::SimilarTo) {
            structural
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
        }
        for successors in structural.values_mut() {
            successors.sort();
            successors.dedup();
        }

        Self {
            bundle,
            node_ids,
            requirement_adjacency,
            code_adjacency,
            structural,
        }
    }

    /// The bundle this query surface reads.
    pub fn bundle(&self) -> &GraphBundle {
        self.bundle
    }

    /// Whether either graph has a node with this id.
    pub fn contains(&self, id: &ElementId) -> bool {
        self.node_ids.contains(id)
    }

    /// Look up the stored element behind a node id.
    pub fn element(&self, id: &ElementId) -> Option<&CodeElement> {
        self.bundle.elements.get(id)
    }

    /// Neighbors of a node across both graphs, ordered by edge kind then
    /// target id.
    ///
    /// `kinds` restricts the listing to the given edge kinds; `None` lists
    /// everything. When both graphs carry a `similar_to` edge between the
    /// same pair, the listing keeps one entry with the higher score.
    pub fn neighbors(
        &self,
        id: &ElementId,
        kinds: Option<&[EdgeKind]>,
    ) -> QueryResult<Vec<Neighbor>> {
        if !self.node_ids.contains(id) {
            return Err(QueryError::UnknownId(id.clone()));
        }

        let mut out: Vec<Neighbor> = Vec::new();
        if let Some(list) = self.requirement_adjacency.get(id) {
            out.extend(list.iter().cloned());
        }
        if let Some(list) = self.code_adjacency.get(id) {
            out.extend(list.iter().cloned());
        }
        if let Some(kinds) = kinds {
            out.retain(|n| kinds.contains(&n.kind));
        }
        sort_and_dedup(&mut out);
        Ok(out)
    }

    /// Number of distinct neighbor entries of a node across both graphs.
    pub fn degree(&self, id: &ElementId) -> QueryResult<usize> {
        Ok(self.neighbors(id, None)?.len())
    }

    /// Shortest directed path between two nodes over non-`similar_to` edges
    /// of both graphs, breadth-first, at most `max_hops` edges long.
    ///
    /// Returns the node sequence including both endpoints, or `None` when no
    /// path exists within the bound. Call and inheritance edges may form
    /// cycles; the hop bound guarantees termination regardless.
    pub fn shortest_structural_path(
        &self,
        from: &ElementId,
        to: &ElementId,
        max_hops: usize,
    ) -> QueryResult<Option<Vec<ElementId>>> {
        for id in [from, to] {
            if !self.node_ids.contains(id) {
                return Err(QueryError::UnknownId(id.clone()));
            }
        }
        if from == to {
            return Ok(Some(vec![from.clone()]));
        }

        let mut predecessor: HashMap<ElementId, ElementId> = HashMap::new();
        let mut visited: HashSet<ElementId> = HashSet::new();
        let mut queue: VecDeque<(ElementId, usize)> = VecDeque::new();
        visited.insert(from.clone());
        queue.push_back((from.clone(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth == max_hops {
                continue;
            }
            if let Some(successors) = self.structural.get(&current) {
                for next in successors {
                    if visited.contains(next) {
                        continue;
                    }
                    visited.insert(next.clone());
                    predecessor.insert(next.clone(), current.clone());
                    if next == to {
                        return Ok(Some(assemble_path(&predecessor, from, to)));
                    }
                    queue.push_back((next.clone(), depth + 1));
                }
            }
        }
        Ok(None)
    }

    /// Code node ids reachable from a requirement in one cross-graph hop:
    /// the resolved code node(s) plus their code-graph neighbors.
    pub fn cross_hop(&self, requirement_id: &ElementId) -> QueryResult<BTreeSet<ElementId>> {
        let mut out = self.bundle.map.resolve_to_code(requirement_id)?;
        for id in out.clone() {
            if let Some(list) = self.code_adjacency.get(&id) {
                out.extend(list.iter().map(|n| n.id.clone()));
            }
        }
        Ok(out)
    }

    /// Code node ids for a requirement node.
    pub fn resolve_to_code(&self, requirement_id: &ElementId) -> QueryResult<BTreeSet<ElementId>> {
        self.bundle.map.resolve_to_code(requirement_id)
    }

    /// Requirement node ids for a code node.
    pub fn resolve_to_requirement(&self, code_id: &ElementId) -> QueryResult<BTreeSet<ElementId>> {
        self.bundle.map.resolve_to_requirement(code_id)
    }
}

/// Build per-node neighbor lists from one graph's edge list. Symmetric
/// edges are listed from both endpoints.
fn adjacency_of(edges: &[GraphEdge]) -> HashMap<ElementId, Vec<Neighbor>> {
    let mut adjacency: HashMap<ElementId, Vec<Neighbor>> = HashMap::new();
    for edge in edges {
        adjacency
            .entry(edge.source.clone())
            .or_default()
            .push(Neighbor {
                id: edge.target.clone(),
                kind: edge.kind,
                weight: edge.weight,
            });
        if edge.kind.is_symmetric() {
            adjacency
                .entry(edge.target.clone())
                .or_default()
                .push(Neighbor {
                    id: edge.source.clone(),
                    kind: edge.kind,
                    weight: edge.weight,
                });
        }
    }
    for list in adjacency.values_mut() {
        sort_and_dedup(list);
    }
    adjacency
}

/// Canonical neighbor order: edge kind, then target id. Entries for the
/// same (kind, id) collapse to the one with the highest weight.
fn sort_and_dedup(neighbors: &mut Vec<Neighbor>) {
    neighbors.sort_by(|a, b| {
        (a.kind, &a.id)
            .cmp(&(b.kind, &b.id))
            .then_with(|| weight_descending(a.weight, b.weight))
    });
    neighbors.dedup_by(|a, b| a.kind == b.kind && a.id == b.id);
}

fn weight_descending(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Walk the predecessor chain back from `to` and reverse it.
fn assemble_path(
    predecessor: &HashMap<ElementId, ElementId>,
    from: &ElementId,
    to: &ElementId,
) -> Vec<ElementId> {
    let mut path = vec![to.clone()];
    let mut current = to.clone();
    while &current != from {
        match predecessor.get(&current) {
            Some(prev) => {
                path.push(prev.clone());
                current = prev.clone();
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigraph::BigraphMap;
    use tandem_graph_core::{
        CodeGraph, CodeNode, ElementKind, ElementStore, RequirementGraph, RequirementNode,
    };

    fn code_node(id: &str) -> CodeNode {
        CodeNode {
            id: ElementId::from(id),
            name: format!("mod.{}", id),
            kind: ElementKind::Function,
            file_path: "src/mod.py".to_string(),
            embedding: None,
        }
    }

    /// Fixture: code nodes a..d with contain a->b, call b->c, similar_to
    /// c~d; requirement nodes a, b with parent_child a->b and similar_to
    /// a~b.
    fn bundle() -> GraphBundle {
        let code_graph = CodeGraph {
            nodes: ["a", "b", "c", "d"].iter().map(|id| code_node(id)).collect(),
            edges: vec![
                GraphEdge::new("a".into(), "b".into(), EdgeKind::Contain),
                GraphEdge::new("b".into(), "c".into(), EdgeKind::Call),
                GraphEdge::weighted("c".into(), "d".into(), EdgeKind::SimilarTo, 0.9),
            ],
        };
        let requirement_graph = RequirementGraph {
            nodes: vec![
                RequirementNode::new("a".into(), "top level thing"),
                RequirementNode::new("b".into(), "nested thing"),
            ],
            edges: vec![
                GraphEdge::new("a".into(), "b".into(), EdgeKind::ParentChild),
                GraphEdge::weighted("a".into(), "b".into(), EdgeKind::SimilarTo, 0.85),
            ],
        };
        let map = BigraphMap::fuse(&requirement_graph, &code_graph).unwrap();
        GraphBundle {
            elements: ElementStore::new(),
            requirement_graph,
            code_graph,
            map,
        }
    }

    #[test]
    fn test_neighbors_merge_both_graphs_in_canonical_order() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        let neighbors = query.neighbors(&ElementId::from("a"), None).unwrap();
        assert_eq!(
            neighbors,
            vec![
                Neighbor {
                    id: "b".into(),
                    kind: EdgeKind::Contain,
                    weight: None
                },
                Neighbor {
                    id: "b".into(),
                    kind: EdgeKind::ParentChild,
                    weight: None
                },
                Neighbor {
                    id: "b".into(),
                    kind: EdgeKind::SimilarTo,
                    weight: Some(0.85)
                },
            ]
        );
    }

    #[test]
    fn test_degree_counts_merged_neighbors() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        // a: contain + parent_child + similar_to, all towards b.
        assert_eq!(query.degree(&ElementId::from("a")).unwrap(), 3);
        // d: only the symmetric similar_to back to c.
        assert_eq!(query.degree(&ElementId::from("d")).unwrap(), 1);
        assert!(query.degree(&ElementId::from("nope")).is_err());
    }

    #[test]
    fn test_neighbors_filter_by_kind() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        let neighbors = query
            .neighbors(&ElementId::from("a"), Some(&[EdgeKind::SimilarTo]))
            .unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].kind, EdgeKind::SimilarTo);

        let none = query
            .neighbors(&ElementId::from("a"), Some(&[EdgeKind::Import]))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_similar_to_is_visible_from_both_endpoints() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        let neighbors = query.neighbors(&ElementId::from("d"), None).unwrap();
        assert_eq!(
            neighbors,
            vec![Neighbor {
                id: "c".into(),
                kind: EdgeKind::SimilarTo,
                weight: Some(0.9)
            }]
        );
    }

    #[test]
    fn test_neighbors_unknown_id_is_an_error() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);
        assert_eq!(
            query.neighbors(&ElementId::from("nope"), None),
            Err(QueryError::UnknownId(ElementId::from("nope")))
        );
    }

    #[test]
    fn test_path_follows_structural_edges_only() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        let path = query
            .shortest_structural_path(&ElementId::from("a"), &ElementId::from("c"), 5)
            .unwrap();
        assert_eq!(
            path,
            Some(vec![
                ElementId::from("a"),
                ElementId::from("b"),
                ElementId::from("c")
            ])
        );

        // c and d are only connected by similarity.
        let none = query
            .shortest_structural_path(&ElementId::from("c"), &ElementId::from("d"), 5)
            .unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_path_respects_max_hops() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        let too_short = query
            .shortest_structural_path(&ElementId::from("a"), &ElementId::from("c"), 1)
            .unwrap();
        assert_eq!(too_short, None);

        let found = query
            .shortest_structural_path(&ElementId::from("a"), &ElementId::from("c"), 2)
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn test_path_to_self_is_the_single_node() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        let path = query
            .shortest_structural_path(&ElementId::from("a"), &ElementId::from("a"), 0)
            .unwrap();
        assert_eq!(path, Some(vec![ElementId::from("a")]));
    }

    #[test]
    fn test_path_can_traverse_parent_child() {
        let requirement_graph = RequirementGraph {
            nodes: vec![
                RequirementNode::new("a".into(), "parent"),
                RequirementNode::new("b".into(), "child"),
            ],
            edges: vec![GraphEdge::new("a".into(), "b".into(), EdgeKind::ParentChild)],
        };
        let code_graph = CodeGraph {
            nodes: ["a", "b"].iter().map(|id| code_node(id)).collect(),
            edges: vec![],
        };
        let map = BigraphMap::fuse(&requirement_graph, &code_graph).unwrap();
        let bundle = GraphBundle {
            elements: ElementStore::new(),
            requirement_graph,
            code_graph,
            map,
        };
        let query = GraphQuery::new(&bundle);

        let path = query
            .shortest_structural_path(&ElementId::from("a"), &ElementId::from("b"), 3)
            .unwrap();
        assert_eq!(path, Some(vec![ElementId::from("a"), ElementId::from("b")]));
    }

    #[test]
    fn test_cross_hop_returns_code_neighborhood() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        let from_a = query.cross_hop(&ElementId::from("a")).unwrap();
        let expected: BTreeSet<ElementId> = ["a", "b"].iter().map(|id| (*id).into()).collect();
        assert_eq!(from_a, expected);

        let from_b = query.cross_hop(&ElementId::from("b")).unwrap();
        let expected: BTreeSet<ElementId> = ["b", "c"].iter().map(|id| (*id).into()).collect();
        assert_eq!(from_b, expected);
    }

    #[test]
    fn test_cross_hop_rejects_non_requirement_ids() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        // c is a code node with no requirement, so it is not a valid input.
        assert_eq!(
            query.cross_hop(&ElementId::from("c")),
            Err(QueryError::UnknownId(ElementId::from("c")))
        );
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        let bundle = bundle();
        let query = GraphQuery::new(&bundle);

        let first = query.neighbors(&ElementId::from("a"), None).unwrap();
        let second = query.neighbors(&ElementId::from("a"), None).unwrap();
        assert_eq!(first, second);
    }
}
