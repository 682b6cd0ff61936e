//! Error types for the build pipeline and the query API.
//!
//! Per-unit trouble (a file that fails to parse, an element with no usable
//! description, a node the embedder rejects) is counted in the build summary
//! and never surfaces here. [`BuildError`] is reserved for conditions that
//! make the bundle unpublishable; [`QueryError`] marks caller mistakes on
//! the read side.

use tandem_graph_core::{ElementId, GraphError, IdCollisionError};
use thiserror::Error;

/// Result type alias for build pipeline operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Result type alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that abort a build before publication.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A requirement node whose id resolves to no code node.
    #[error("mapping integrity violated: requirement node {id} has no code node")]
    MappingIntegrity { id: ElementId },

    /// A finished graph failed invariant validation.
    #[error("graph validation failed: {0}")]
    InvalidGraph(#[from] GraphError),

    /// Two distinct elements hashed to the same id.
    #[error(transparent)]
    IdCollision(#[from] IdCollisionError),

    /// Bundle serialization/deserialization error.
    #[error("bundle serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted bundle written by an incompatible format version.
    #[error("unsupported bundle format version {found} (expected {expected})")]
    FormatVersion { found: u32, expected: u32 },

    /// I/O error (file operations).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller errors on the read-only query API.
///
/// Distinct from an empty result: an empty neighbor list or an empty
/// resolution set is a valid answer about a known id.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// The id is not a node of the graph the operation targets.
    #[error("unknown node id: {0}")]
    UnknownId(ElementId),
}
