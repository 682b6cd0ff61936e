//! Build pipeline, bigraph fusion, and the query surface over both graphs.
//!
//! This crate turns a parsed source repository into the published bundle:
//! the element store, the requirement graph, the code graph, and the
//! bigraph map tying the two together. It also owns the read-only
//! [`GraphQuery`] API that a reasoning agent consumes.
//!
//! ## The Pipeline
//!
//! ```text
//! source tree
//!     │  discover + parse            (ingest)
//!     ▼
//! ElementStore ──────────┬─────────────────────────┐
//!     │                  │                         │
//!     ▼                  ▼                         │
//! CodeGraph          RequirementGraph              │
//!  contain/call/      nodes from docstrings        │
//!  import/inherit     or a generator               │
//!     │                  │                         │
//!     │         parent_child mirrored              │
//!     │         from contain + call                │
//!     ▼                  ▼                         ▼
//!  similar_to linking on both graphs      (raw source text)
//!     │                  │
//!     └───── validate ───┴──► BigraphMap ──► GraphBundle
//! ```
//!
//! Per-unit failures (unparseable files, missing descriptions, failed
//! embeddings, dangling references) degrade to counters in the
//! [`BuildSummary`]; only invariant violations abort a build. A bundle is
//! either published whole or not at all.

pub mod artifact;
pub mod bigraph;
mod describe;
mod error;
mod ingest;
mod pipeline;
mod query;
mod structure;

pub use error::{BuildError, BuildResult, QueryError, QueryResult};

// Ingestion
pub use ingest::{
    discover_source_files, ingest_parses, parse_files, Ingest, IngestReport,
    DEFAULT_SOURCE_EXTENSIONS,
};

// Graph construction
pub use describe::{
    build_requirement_nodes, derive_parent_child, DescribeReport, DescriptionError,
    DescriptionSource, DocstringSource,
};
pub use structure::{build_code_graph, StructureReport};

// Fusion and queries
pub use bigraph::BigraphMap;
pub use query::{GraphQuery, Neighbor};

// Pipeline
pub use pipeline::{
    build_from_parses, build_from_repository, BuildConfig, BuildOutput, BuildSummary,
};

// Persistence
pub use artifact::{BundleMeta, BundleStore, GraphBundle, FORMAT_VERSION, TANDEM_DIR};
