//! Existence gate for optional sub-projects.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Manifest file whose presence opts a model project into the build.
pub const MORPHIR_MANIFEST: &str = "morphir.json";

/// An optional sub-project and whether it takes part in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Project directory.
    pub dir: PathBuf,

    /// Whether the project's manifest was readable when the run started.
    pub participates: bool,
}

impl ProjectDescriptor {
    pub fn new(dir: impl Into<PathBuf>, participates: bool) -> Self {
        Self {
            dir: dir.into(),
            participates,
        }
    }
}

/// Presence check for sub-project manifests.
pub struct ExistenceGate;

impl ExistenceGate {
    /// Whether `directory/manifest` can be read.
    ///
    /// Any read error (missing file, permission denied, path is a directory)
    /// yields `false`. The content is never inspected, so an empty or
    /// malformed manifest still participates.
    pub fn participates(directory: &Path, manifest: &str) -> bool {
        let path = directory.join(manifest);
        match std::fs::read(&path) {
            Ok(_) => true,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Manifest not readable");
                false
            }
        }
    }

    /// Evaluate the gate for each of `dirs`, resolved against `root`.
    ///
    /// Order is preserved and every call reads the filesystem afresh.
    pub fn describe<P: AsRef<Path>>(
        root: &Path,
        dirs: &[P],
        manifest: &str,
    ) -> Vec<ProjectDescriptor> {
        dirs.iter()
            .map(|dir| {
                let dir = root.join(dir.as_ref());
                let participates = Self::participates(&dir, manifest);
                ProjectDescriptor { dir, participates }
            })
            .collect()
    }
}
