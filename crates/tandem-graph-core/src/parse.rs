//! The parser boundary.
//!
//! Parsing itself is pluggable: any frontend that can report elements and
//! references for one file implements [`SourceParser`]. The engine treats a
//! failed file as a soft error, so one unparseable file never aborts a
//! build.

use crate::element::CodeElement;
use crate::id::ElementId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Types of references a parser can report between elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Source element invokes the target.
    Call,
    /// Source element imports the target.
    Import,
    /// Source element inherits from or implements the target.
    Inherit,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Call => write!(f, "call"),
            ReferenceKind::Import => write!(f, "import"),
            ReferenceKind::Inherit => write!(f, "inherit"),
        }
    }
}

/// A resolved reference from one element to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Type of reference.
    pub kind: ReferenceKind,
    /// Element containing the reference.
    pub source: ElementId,
    /// Element the reference points at.
    pub target: ElementId,
}

impl Reference {
    /// Create a reference.
    pub fn new(kind: ReferenceKind, source: ElementId, target: ElementId) -> Self {
        Self {
            kind,
            source,
            target,
        }
    }
}

/// Everything a parser extracted from one source file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedFile {
    /// Repository-relative path of the file.
    pub path: String,
    /// Elements defined in the file.
    pub elements: Vec<CodeElement>,
    /// References whose source element lives in the file.
    pub references: Vec<Reference>,
}

/// A file the parser could not process.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to parse {file}: {message}")]
pub struct ParseError {
    /// Repository-relative path of the failing file.
    pub file: String,
    /// Frontend-specific failure detail.
    pub message: String,
}

impl ParseError {
    /// Create a parse error for a file.
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Frontend that turns one source file into elements and references.
///
/// Implementations are expected to resolve references to element ids
/// themselves; unresolved references should simply be omitted. Any timeout
/// or resource limit belongs inside the implementation, surfacing as a
/// [`ParseError`] for that file.
pub trait SourceParser: Send + Sync {
    /// Whether this parser wants to handle the given path.
    fn supports(&self, path: &Path) -> bool;

    /// Parse a single file.
    fn parse(&self, path: &Path) -> Result<ParsedFile, ParseError>;
}
