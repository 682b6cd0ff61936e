//! The cross-graph id relation.
//!
//! Requirement and code nodes share the element id space, so the relation is
//! identity today. It is still stored and queried as its own component with
//! set-valued resolvers, so a future 1:n mapping never breaks the API.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use tandem_graph_core::{CodeGraph, ElementId, RequirementGraph};

use crate::error::{BuildError, BuildResult, QueryError, QueryResult};

/// Bidirectional id relation between the two graphs of one bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BigraphMap {
    requirement_ids: BTreeSet<ElementId>,
    code_ids: BTreeSet<ElementId>,
}

impl BigraphMap {
    /// Fuse the two graphs into a map, checking that every requirement node
    /// has a code node. The reverse direction needs no check: code elements
    /// without a requirement are expected.
    ///
    /// By construction the check should never fire; it guards the published
    /// bundle against builder bugs.
    pub fn fuse(requirements: &RequirementGraph, code: &CodeGraph) -> BuildResult<Self> {
        let requirement_ids: BTreeSet<ElementId> =
            requirements.nodes.iter().map(|n| n.id.clone()).collect();
        let code_ids: BTreeSet<ElementId> = code.nodes.iter().map(|n| n.id.clone()).collect();

        if let Some(orphan) = requirement_ids.difference(&code_ids).next() {
            return Err(BuildError::MappingIntegrity {
                id: orphan.clone(),
            });
        }

        Ok(Self {
            requirement_ids,
            code_ids,
        })
    }

    /// Code node ids for a requirement node. Never empty for a valid id;
    /// an id that is not a requirement node is a caller error.
    pub fn resolve_to_code(&self, requirement_id: &ElementId) -> QueryResult<BTreeSet<ElementId>> {
        if !self.requirement_ids.contains(requirement_id) {
            return Err(QueryError::UnknownId(requirement_id.clone()));
        }
        Ok(std::iter::once(requirement_id.clone()).collect())
    }

    /// Requirement node ids for a code node. Empty when the element carries
    /// no requirement; an id that is not a code node is a caller error.
    pub fn resolve_to_requirement(&self, code_id: &ElementId) -> QueryResult<BTreeSet<ElementId>> {
        if !self.code_ids.contains(code_id) {
            return Err(QueryError::UnknownId(code_id.clone()));
        }
        if self.requirement_ids.contains(code_id) {
            Ok(std::iter::once(code_id.clone()).collect())
        } else {
            Ok(BTreeSet::new())
        }
    }

    /// Whether an id names a requirement node.
    pub fn is_requirement(&self, id: &ElementId) -> bool {
        self.requirement_ids.contains(id)
    }

    /// Whether an id names a code node.
    pub fn is_code(&self, id: &ElementId) -> bool {
        self.code_ids.contains(id)
    }

    /// Ids of every requirement node, ascending.
    pub fn requirement_ids(&self) -> impl Iterator<Item = &ElementId> {
        self.requirement_ids.iter()
    }

    /// Number of requirement-side ids.
    pub fn requirement_count(&self) -> usize {
        self.requirement_ids.len()
    }

    /// Number of code-side ids.
    pub fn code_count(&self) -> usize {
        self.code_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_graph_core::{CodeNode, ElementKind, RequirementNode};

    fn code_graph(ids: &[&str]) -> CodeGraph {
        CodeGraph {
            nodes: ids
                .iter()
                .map(|id| CodeNode {
                    id: ElementId::from(*id),
                    name: format!("mod.{}", id),
                    kind: ElementKind::Function,
                    file_path: "src/mod.py".to_string(),
                    embedding: None,
                })
                .collect(),
            edges: vec![],
        }
    }

    fn requirement_graph(ids: &[&str]) -> RequirementGraph {
        RequirementGraph {
            nodes: ids
                .iter()
                .map(|id| RequirementNode::new(ElementId::from(*id), "does a thing"))
                .collect(),
            edges: vec![],
        }
    }

    #[test]
    fn test_fuse_accepts_requirements_subset_of_code() {
        let map = BigraphMap::fuse(&requirement_graph(&["a"]), &code_graph(&["a", "b"])).unwrap();

        assert_eq!(map.requirement_count(), 1);
        assert_eq!(map.code_count(), 2);

        let resolved = map.resolve_to_code(&ElementId::from("a")).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains(&ElementId::from("a")));
    }

    #[test]
    fn test_fuse_rejects_requirement_without_code() {
        let err = BigraphMap::fuse(&requirement_graph(&["a", "ghost"]), &code_graph(&["a"]))
            .unwrap_err();
        match err {
            BuildError::MappingIntegrity { id } => assert_eq!(id, ElementId::from("ghost")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_code_only_element_resolves_to_empty_set() {
        let map = BigraphMap::fuse(&requirement_graph(&["a"]), &code_graph(&["a", "b"])).unwrap();

        let resolved = map.resolve_to_requirement(&ElementId::from("b")).unwrap();
        assert!(resolved.is_empty());

        let resolved = map.resolve_to_requirement(&ElementId::from("a")).unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_unknown_id_is_an_error_not_an_empty_set() {
        let map = BigraphMap::fuse(&requirement_graph(&["a"]), &code_graph(&["a", "b"])).unwrap();

        assert_eq!(
            map.resolve_to_code(&ElementId::from("nope")),
            Err(QueryError::UnknownId(ElementId::from("nope")))
        );
        assert_eq!(
            map.resolve_to_requirement(&ElementId::from("nope")),
            Err(QueryError::UnknownId(ElementId::from("nope")))
        );
        // A code-only id is not a requirement node either.
        assert_eq!(
            map.resolve_to_code(&ElementId::from("b")),
            Err(QueryError::UnknownId(ElementId::from("b")))
        );
    }
}
