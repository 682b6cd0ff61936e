//! Repository ingestion.
//!
//! Walks a source tree, hands files to a [`SourceParser`], and folds the
//! per-file outcomes into one element store plus the raw reference list the
//! structural builder consumes. Files that fail to parse are counted and
//! logged, never fatal.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use tandem_graph_core::{ElementStore, ParseError, ParsedFile, Reference, SourceParser};

use crate::error::BuildResult;

/// Extensions treated as source code when no explicit list is given.
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "c", "cpp", "h", "hpp",
];

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Files parsed successfully.
    pub files_parsed: usize,
    /// Files the parser gave up on.
    pub parse_failures: usize,
    /// Distinct elements in the store after ingestion.
    pub elements: usize,
}

/// Everything ingestion produced for the downstream builders.
#[derive(Debug, Default)]
pub struct Ingest {
    /// Deduplicated elements in canonical order.
    pub store: ElementStore,
    /// References reported by the parser, unvalidated.
    pub references: Vec<Reference>,
    /// Ingestion counters.
    pub report: IngestReport,
}

/// Walk `root` and collect source files, sorted by path.
///
/// Hidden entries and well-known build/vendor directories are skipped.
/// Only files whose extension appears in `extensions` are returned.
pub fn discover_source_files(root: &Path, extensions: &[&str]) -> BuildResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("source root {} is not a directory", root.display()),
        )
        .into());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && !is_blacklisted(e))
        .filter_map(|e| e.ok())
    {
        if !entry.path().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if extensions.iter().any(|allowed| *allowed == ext) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    info!(root = %root.display(), files = files.len(), "discovered source files");
    Ok(files)
}

/// Check if entry is hidden (starts with .). The walk root itself is exempt.
fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Check if entry is in a blacklisted directory.
fn is_blacklisted(entry: &walkdir::DirEntry) -> bool {
    const BLACKLIST: &[&str] = &[
        "node_modules",
        "target",
        "dist",
        "build",
        "__pycache__",
        "venv",
        "vendor",
        "coverage",
    ];

    entry
        .file_name()
        .to_str()
        .map(|s| BLACKLIST.contains(&s))
        .unwrap_or(false)
}

/// Run the parser over each file it supports, keeping per-file outcomes.
pub fn parse_files(
    parser: &dyn SourceParser,
    files: &[PathBuf],
) -> Vec<Result<ParsedFile, ParseError>> {
    files
        .iter()
        .filter(|path| parser.supports(path))
        .map(|path| parser.parse(path))
        .collect()
}

/// Fold per-file parse outcomes into a single store and reference list.
///
/// Failed files are counted in the report. An id collision between two
/// distinct elements aborts: the store would be ambiguous.
pub fn ingest_parses(outcomes: Vec<Result<ParsedFile, ParseError>>) -> BuildResult<Ingest> {
    let mut store = ElementStore::new();
    let mut references = Vec::new();
    let mut report = IngestReport::default();

    for outcome in outcomes {
        match outcome {
            Ok(parsed) => {
                report.files_parsed += 1;
                for element in parsed.elements {
                    store.upsert(element)?;
                }
                references.extend(parsed.references);
            }
            Err(err) => {
                report.parse_failures += 1;
                warn!(file = %err.file, error = %err.message, "skipping file that failed to parse");
            }
        }
    }

    store.sort_canonical();
    report.elements = store.len();
    info!(
        files = report.files_parsed,
        failures = report.parse_failures,
        elements = report.elements,
        "ingested parse outcomes"
    );

    Ok(Ingest {
        store,
        references,
        report,
    })
}
