//! Bundle persistence under the `.tandem` folder.
//!
//! The bundle is the all-or-nothing published artifact: element list, both
//! graphs, and the bigraph map, with ids consistent across all four. Readers
//! only ever see a fully written bundle.
//!
//! ## File Structure
//!
//! ```text
//! .tandem/
//! ├── bundle.json   # Elements, both graphs, bigraph map
//! └── meta.json     # Format version and counts; written last
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tandem_graph_core::{CodeGraph, ElementStore, RequirementGraph};

use crate::bigraph::BigraphMap;
use crate::error::{BuildError, BuildResult};

/// Name of the persistence folder.
pub const TANDEM_DIR: &str = ".tandem";

/// File names within the tandem directory.
const BUNDLE_FILE: &str = "bundle.json";
const META_FILE: &str = "meta.json";

/// Version of the persistence format.
pub const FORMAT_VERSION: u32 = 1;

/// The published artifact: everything the reasoning agent loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphBundle {
    /// Every element that survived parsing, in canonical order.
    pub elements: ElementStore,

    /// The semantic graph.
    pub requirement_graph: RequirementGraph,

    /// The structural graph.
    pub code_graph: CodeGraph,

    /// The cross-graph id relation.
    pub map: BigraphMap,
}

/// Counts and format version for a persisted bundle.
///
/// Carries no timestamp: rebuilding unchanged inputs must produce
/// byte-identical files, so everything here derives from bundle content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMeta {
    /// Version of the persistence format.
    pub format_version: u32,

    /// Number of stored elements.
    pub elements: usize,

    /// Requirement graph node count.
    pub requirement_nodes: usize,

    /// Requirement graph edge count.
    pub requirement_edges: usize,

    /// Code graph node count.
    pub code_nodes: usize,

    /// Code graph edge count.
    pub code_edges: usize,
}

impl BundleMeta {
    /// Derive the metadata of a bundle.
    pub fn of(bundle: &GraphBundle) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            elements: bundle.elements.len(),
            requirement_nodes: bundle.requirement_graph.node_count(),
            requirement_edges: bundle.requirement_graph.edge_count(),
            code_nodes: bundle.code_graph.node_count(),
            code_edges: bundle.code_graph.edge_count(),
        }
    }
}

/// Store managing bundle persistence within the `.tandem/` folder.
#[derive(Debug, Clone)]
pub struct BundleStore {
    /// Root path of the analyzed repository.
    root: PathBuf,

    /// Path to the `.tandem` directory.
    bundle_dir: PathBuf,
}

impl BundleStore {
    /// Create a store for the given repository root.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let bundle_dir = root.join(TANDEM_DIR);
        Self { root, bundle_dir }
    }

    /// Get the repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path to the bundle directory.
    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }

    /// Check if the bundle directory exists.
    pub fn exists(&self) -> bool {
        self.bundle_dir.exists()
    }

    /// Initialize the directory structure.
    pub fn init(&self) -> BuildResult<()> {
        if !self.bundle_dir.exists() {
            std::fs::create_dir_all(&self.bundle_dir)?;
            debug!(path = %self.bundle_dir.display(), "created bundle directory");
        }
        Ok(())
    }

    // =========================================================================
    // Bundle Persistence
    // =========================================================================

    /// Save a bundle. The metadata file is written after the bundle file, so
    /// its presence marks a complete publication.
    pub fn save(&self, bundle: &GraphBundle) -> BuildResult<PathBuf> {
        self.init()?;

        let bundle_path = self.bundle_dir.join(BUNDLE_FILE);
        let json = serde_json::to_string_pretty(bundle)?;
        std::fs::write(&bundle_path, &json)?;

        let meta = BundleMeta::of(bundle);
        let meta_path = self.bundle_dir.join(META_FILE);
        let json = serde_json::to_string_pretty(&meta)?;
        std::fs::write(&meta_path, &json)?;

        info!(
            path = %bundle_path.display(),
            elements = meta.elements,
            requirement_nodes = meta.requirement_nodes,
            code_nodes = meta.code_nodes,
            "saved graph bundle"
        );

        Ok(bundle_path)
    }

    /// Load the published bundle, if one exists.
    ///
    /// A bundle written by an incompatible format version is an error rather
    /// than `None`: silently ignoring it would invite a rebuild that
    /// clobbers data a newer tool still wants.
    pub fn load(&self) -> BuildResult<Option<GraphBundle>> {
        let bundle_path = self.bundle_dir.join(BUNDLE_FILE);
        let meta_path = self.bundle_dir.join(META_FILE);

        if !bundle_path.exists() || !meta_path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&meta_path)?;
        let meta: BundleMeta = serde_json::from_str(&json)?;
        if meta.format_version != FORMAT_VERSION {
            return Err(BuildError::FormatVersion {
                found: meta.format_version,
                expected: FORMAT_VERSION,
            });
        }

        let json = std::fs::read_to_string(&bundle_path)?;
        let bundle: GraphBundle = serde_json::from_str(&json)?;

        info!(
            path = %bundle_path.display(),
            elements = bundle.elements.len(),
            "loaded graph bundle"
        );

        Ok(Some(bundle))
    }

    /// Check if a published bundle exists.
    pub fn has_bundle(&self) -> bool {
        self.bundle_dir.join(BUNDLE_FILE).exists() && self.bundle_dir.join(META_FILE).exists()
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Remove all bundle data.
    pub fn clean(&self) -> BuildResult<()> {
        if self.bundle_dir.exists() {
            std::fs::remove_dir_all(&self.bundle_dir)?;
            info!(path = %self.bundle_dir.display(), "removed bundle directory");
        }
        Ok(())
    }
}
