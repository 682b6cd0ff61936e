//! Semantic layer for Tandem-Graph.
//!
//! Bridges both graphs to a vector-embedding space: node text goes through
//! an [`Embedder`], vectors land in a [`VectorIndex`], and every pair of
//! nodes scoring at or above the similarity threshold gets a `similar_to`
//! edge.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐      ┌─────────────────────┐      ┌──────────────┐
//! │ Embedder   │─────▶│ link_by_similarity  │─────▶│ VectorIndex  │
//! │ (backend)  │      │ (SimilarityTarget)  │      │ (pair scan)  │
//! └────────────┘      └─────────┬───────────┘      └──────────────┘
//!                               │
//!                     similar_to edges appended to
//!                     RequirementGraph / CodeGraph
//! ```
//!
//! # Feature flags
//!
//! | Feature     | Effect                                              |
//! |-------------|-----------------------------------------------------|
//! | `fastembed` | Enable native ONNX-based embeddings via `fastembed` |

pub mod embedder;
pub mod index;
pub mod linker;

// Re-exports for ergonomic use from downstream crates.
pub use embedder::{EmbedError, Embedder, HashEmbedder, NoOpEmbedder};
pub use index::{IndexEntry, SimilarPair, VectorIndex};
pub use linker::{link_by_similarity, CodeGraphTarget, LinkReport, SimilarityConfig, SimilarityTarget};

#[cfg(feature = "fastembed")]
pub use embedder::FastEmbedder;

/// Dense floating-point vector representing a text passage in embedding
/// space.
pub use tandem_graph_core::Embedding;

// ───────────────────────────────────────────────────────────────────────────
// Integration tests
// ───────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_graph_core::{
        CodeElement, CodeGraph, EdgeKind, ElementId, ElementKind, ElementStore, RequirementGraph,
        RequirementNode,
    };

    fn store_with(sources: &[(&str, &str)]) -> ElementStore {
        let mut store = ElementStore::new();
        for (i, (name, source)) in sources.iter().enumerate() {
            let start = (i as u32) * 20 + 1;
            let element = CodeElement::new(
                ElementKind::Function,
                *name,
                "src/app.py",
                start,
                start + 10,
                *source,
                None,
            );
            store.upsert(element).unwrap();
        }
        store
    }

    // -- Both graphs linked by the same embedder --

    #[test]
    fn test_both_graphs_link_independently() {
        let store = store_with(&[
            (
                "app.to_json",
                "def to_json(value): return json.dumps(value)",
            ),
            (
                "app.dict_to_json",
                "def dict_to_json(value): return json.dumps(value)",
            ),
            ("app.walk", "def walk(root): yield from os.scandir(root)"),
        ]);
        let ids: Vec<ElementId> = store.ids().cloned().collect();

        let mut requirement_graph = RequirementGraph {
            nodes: vec![
                RequirementNode::new(ids[0].clone(), "Serialize the loaded object into one JSON string"),
                RequirementNode::new(ids[1].clone(), "Serialize the loaded object into one JSON text"),
                RequirementNode::new(ids[2].clone(), "Walk every directory beneath root collecting files"),
            ],
            edges: Vec::new(),
        };
        let mut code_graph = CodeGraph::from_store(&store);

        let embedder = HashEmbedder::new(256);
        let config = SimilarityConfig { threshold: 0.5 };

        let rg_report = link_by_similarity(&mut requirement_graph, &embedder, &config);
        let cg_report = link_by_similarity(
            &mut CodeGraphTarget::new(&mut code_graph, &store),
            &embedder,
            &config,
        );

        assert_eq!(rg_report.embedded, 3);
        assert_eq!(cg_report.embedded, 3);

        // The serializer pair is linked in both graphs; the tree walker
        // joins neither.
        let (first, second) = if ids[0] < ids[1] {
            (&ids[0], &ids[1])
        } else {
            (&ids[1], &ids[0])
        };
        assert!(requirement_graph.has_edge(first, second, EdgeKind::SimilarTo));
        assert!(code_graph.has_edge(first, second, EdgeKind::SimilarTo));
        for graph_edges in [&requirement_graph.edges, &code_graph.edges] {
            assert!(graph_edges
                .iter()
                .all(|e| e.source != ids[2] && e.target != ids[2]));
        }
    }

    // -- Deterministic output across repeated runs --

    #[test]
    fn test_repeated_linking_is_deterministic() {
        let build = || {
            let mut graph = RequirementGraph {
                nodes: vec![
                    RequirementNode::new("r1".into(), "read the config file"),
                    RequirementNode::new("r2".into(), "read the config file twice"),
                    RequirementNode::new("r3".into(), "read the config file thrice"),
                ],
                edges: Vec::new(),
            };
            let embedder = HashEmbedder::new(64);
            link_by_similarity(&mut graph, &embedder, &SimilarityConfig { threshold: 0.5 });
            graph
        };

        let first = build();
        let second = build();
        assert_eq!(first, second);
    }
}
