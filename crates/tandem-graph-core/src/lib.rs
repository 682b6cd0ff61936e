//! Core domain types shared across the entire Tandem-Graph workspace.
//!
//! The model is built around one id space: every [`CodeElement`] extracted
//! from a repository gets a stable [`ElementId`], and both graphs (the
//! semantic [`RequirementGraph`] and the structural [`CodeGraph`]) address
//! their nodes by that same id. Higher layers (similarity linking, the
//! bigraph map, the query API) live in their own crates and only consume
//! these types.

mod element;
mod graph;
mod id;
mod parse;

pub use element::{CodeElement, ElementKind, ElementStore, IdCollisionError};
pub use graph::{
    CodeGraph, CodeNode, EdgeKind, Embedding, GraphEdge, GraphError, RequirementGraph,
    RequirementNode,
};
pub use id::{derive_element_id, ElementId};
pub use parse::{ParseError, ParsedFile, Reference, ReferenceKind, SourceParser};
