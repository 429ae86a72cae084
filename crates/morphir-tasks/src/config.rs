//! Task configuration, resolved once per invocation.
//!
//! Nothing below the task entry point reads the environment; everything a
//! stage needs is carried explicitly in [`TaskConfig`].

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::gate::{ExistenceGate, ProjectDescriptor, MORPHIR_MANIFEST};
use crate::matrix::{VersionSet, DEFAULT_SCALA_VERSION, VERSIONS_ENV};

/// Environment variable naming the workspace root.
pub const ROOT_ENV: &str = "MORPHIR_TASKS_ROOT";

/// Model projects built when their manifest is present, relative to the root.
pub const ELM_PROJECT_DIRS: [&str; 4] = [
    "examples/morphir-elm-projects/evaluator-tests",
    "examples/morphir-elm-projects/defaults-tests",
    "examples/morphir-elm-projects/finance",
    "morphir-elm/sdks/morphir-unit-test",
];

/// Model project the JVM suite depends on; always built.
pub const EVALUATOR_TESTS_DIR: &str = "examples/morphir-elm-projects/evaluator-tests";

/// JVM build tool launcher, relative to the root.
pub const MILL: &str = "./mill";

/// Model compiler executable.
pub const MORPHIR_ELM: &str = "morphir-elm";

/// Package manager executable.
pub const BUN: &str = "bun";

/// Build output directory removed by `clean`.
pub const OUT_DIR: &str = "out/";

/// Everything a task pipeline is parameterized by.
#[derive(Debug, Clone, Serialize)]
pub struct TaskConfig {
    /// Workspace root; relative commands run here.
    pub root: PathBuf,

    /// Scala versions for matrix stages.
    pub versions: VersionSet,

    /// Optional model projects, relative to `root`.
    pub elm_projects: Vec<PathBuf>,

    /// Manifest that opts a model project in.
    pub manifest: String,
}

impl TaskConfig {
    /// Defaults: the single default Scala version and the standard projects.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            versions: VersionSet::default(),
            elm_projects: ELM_PROJECT_DIRS.iter().map(PathBuf::from).collect(),
            manifest: MORPHIR_MANIFEST.to_string(),
        }
    }

    /// Resolve from the process environment.
    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        Self::from_lookup(root, |key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for environment values.
    pub fn from_lookup<F>(root: impl Into<PathBuf>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let versions_override = lookup(VERSIONS_ENV);
        Self::new(root).with_versions(VersionSet::resolve(
            versions_override.as_deref(),
            DEFAULT_SCALA_VERSION,
        ))
    }

    pub fn with_versions(mut self, versions: VersionSet) -> Self {
        self.versions = versions;
        self
    }

    pub fn with_elm_projects<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.elm_projects = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Gate every optional model project against the filesystem as it is now.
    pub fn elm_project_descriptors(&self) -> Vec<ProjectDescriptor> {
        ExistenceGate::describe(&self.root, &self.elm_projects, &self.manifest)
    }

    /// `path` resolved against the workspace root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }
}
