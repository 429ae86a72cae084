//! Toolchain version matrix resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable holding the comma-separated Scala version override.
pub const VERSIONS_ENV: &str = "SCALA_VERSIONS";

/// Scala version used when no override is supplied.
pub const DEFAULT_SCALA_VERSION: &str = "3.7.4";

/// Opaque toolchain release identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolchainVersion(String);

impl ToolchainVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free, never-empty list of toolchain versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VersionSet(Vec<ToolchainVersion>);

impl VersionSet {
    /// Resolve an optional comma-separated override against `default`.
    ///
    /// Elements are trimmed, empty elements dropped and repeats removed,
    /// keeping first-seen order. An absent override, or one with nothing left
    /// after trimming (`""`, `","`, `" , "`), yields `[default]`.
    pub fn resolve(env_override: Option<&str>, default: &str) -> Self {
        let mut versions: Vec<ToolchainVersion> = Vec::new();

        for raw in env_override.unwrap_or_default().split(',') {
            let trimmed = raw.trim();
            if trimmed.is_empty() || versions.iter().any(|v| v.as_str() == trimmed) {
                continue;
            }
            versions.push(ToolchainVersion::new(trimmed));
        }

        if versions.is_empty() {
            return Self::single(default);
        }
        Self(versions)
    }

    /// A set holding exactly `version`.
    pub fn single(version: impl Into<String>) -> Self {
        Self(vec![ToolchainVersion::new(version)])
    }

    /// The first version; the one single-version stages build against.
    pub fn primary(&self) -> &ToolchainVersion {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ToolchainVersion> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ToolchainVersion] {
        &self.0
    }
}

impl Default for VersionSet {
    fn default() -> Self {
        Self::single(DEFAULT_SCALA_VERSION)
    }
}

impl<'a> IntoIterator for &'a VersionSet {
    type Item = &'a ToolchainVersion;
    type IntoIter = std::slice::Iter<'a, ToolchainVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for VersionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, version) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(version.as_str())?;
        }
        Ok(())
    }
}
