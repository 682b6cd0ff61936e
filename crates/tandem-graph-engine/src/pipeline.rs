//! The staged build pipeline.
//!
//! Stages run strictly in order, each consuming the completed output of the
//! previous one:
//!
//! ```text
//! discover -> parse -> ingest -> code graph -> requirement nodes
//!     -> parent/child edges -> similarity linking -> validate -> fuse
//! ```
//!
//! Per-unit trouble along the way (bad files, missing descriptions, failed
//! embeddings, dangling references) is folded into the [`BuildSummary`];
//! only invariant violations abort. Nothing is handed to readers unless
//! every stage succeeds.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use tandem_graph_core::{ParseError, ParsedFile, SourceParser};
use tandem_graph_semantic::{
    link_by_similarity, CodeGraphTarget, Embedder, LinkReport, SimilarityConfig,
};

use crate::artifact::{BundleStore, GraphBundle};
use crate::bigraph::BigraphMap;
use crate::describe::{
    build_requirement_nodes, derive_parent_child, DescribeReport, DescriptionSource,
};
use crate::error::BuildResult;
use crate::ingest::{
    discover_source_files, ingest_parses, parse_files, Ingest, IngestReport,
    DEFAULT_SOURCE_EXTENSIONS,
};
use crate::structure::{build_code_graph, StructureReport};

fn default_source_extensions() -> Vec<String> {
    DEFAULT_SOURCE_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Tuning for one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Similarity linking parameters, shared by both graphs.
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Extensions considered source code during discovery.
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            similarity: SimilarityConfig::default(),
            source_extensions: default_source_extensions(),
        }
    }
}

/// Counts from every stage of one build, the soft-failure ledger included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildSummary {
    /// File discovery and parsing counters.
    pub ingest: IngestReport,

    /// Code graph construction counters.
    pub structure: StructureReport,

    /// Requirement node construction counters.
    pub describe: DescribeReport,

    /// `parent_child` edges derived from the code graph.
    pub parent_child_edges: usize,

    /// Similarity pass over the requirement graph.
    pub requirement_link: LinkReport,

    /// Similarity pass over the code graph.
    pub code_link: LinkReport,
}

/// A finished build: the publishable bundle plus its summary.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    /// The artifact readers consume.
    pub bundle: GraphBundle,

    /// Stage counters for the build that produced it.
    pub summary: BuildSummary,
}

impl BuildOutput {
    /// Publish the bundle to a store.
    pub fn publish(&self, store: &BundleStore) -> BuildResult<PathBuf> {
        store.save(&self.bundle)
    }
}

/// Build a bundle from a source repository on disk.
pub fn build_from_repository(
    root: &Path,
    parser: &dyn SourceParser,
    descriptions: &dyn DescriptionSource,
    embedder: &dyn Embedder,
    config: &BuildConfig,
) -> BuildResult<BuildOutput> {
    let extensions: Vec<&str> = config
        .source_extensions
        .iter()
        .map(|s| s.as_str())
        .collect();
    let files = discover_source_files(root, &extensions)?;
    let outcomes = parse_files(parser, &files);
    build_from_parses(outcomes, descriptions, embedder, config)
}

/// Build a bundle from already-collected parse outcomes.
pub fn build_from_parses(
    outcomes: Vec<Result<ParsedFile, ParseError>>,
    descriptions: &dyn DescriptionSource,
    embedder: &dyn Embedder,
    config: &BuildConfig,
) -> BuildResult<BuildOutput> {
    let Ingest {
        store,
        references,
        report: ingest,
    } = ingest_parses(outcomes)?;

    let (mut code_graph, structure) = build_code_graph(&store, &references);
    let (mut requirement_graph, describe) = build_requirement_nodes(&store, descriptions);
    let parent_child_edges = derive_parent_child(&mut requirement_graph, &code_graph);

    let requirement_link = link_by_similarity(&mut requirement_graph, embedder, &config.similarity);
    let code_link = link_by_similarity(
        &mut CodeGraphTarget::new(&mut code_graph, &store),
        embedder,
        &config.similarity,
    );

    requirement_graph.sort_edges_canonical();
    code_graph.sort_edges_canonical();

    requirement_graph.validate()?;
    code_graph.validate()?;
    let map = BigraphMap::fuse(&requirement_graph, &code_graph)?;

    let summary = BuildSummary {
        ingest,
        structure,
        describe,
        parent_child_edges,
        requirement_link,
        code_link,
    };

    info!(
        elements = store.len(),
        requirement_nodes = requirement_graph.node_count(),
        requirement_edges = requirement_graph.edge_count(),
        code_nodes = code_graph.node_count(),
        code_edges = code_graph.edge_count(),
        "build complete"
    );

    Ok(BuildOutput {
        bundle: GraphBundle {
            elements: store,
            requirement_graph,
            code_graph,
            map,
        },
        summary,
    })
}
