//! Artifact table and the exported link contract.

use serde::{Deserialize, Serialize};

/// One row of the packaging table: which files to pick up and where they go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Glob matched against file names, or against the path relative to
    /// `src` when the pattern contains a `/`.
    pub pattern: String,
    /// Subdirectory of the source tree to search. Defaults to the tree root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Subdirectory of the package to copy into.
    pub dst: String,
    /// Preserve the path relative to `src`. When `false` the match is
    /// flattened directly into `dst`.
    #[serde(default)]
    pub keep_path: bool,
}

impl ArtifactDescriptor {
    /// Descriptor that flattens every match into `dst`.
    pub fn flat(pattern: &str, dst: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            src: None,
            dst: dst.to_string(),
            keep_path: false,
        }
    }

    /// Descriptor that keeps each match's path relative to `src`.
    pub fn tree(pattern: &str, src: &str, dst: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            src: Some(src.to_string()),
            dst: dst.to_string(),
            keep_path: true,
        }
    }
}

/// The canonical layout: headers under `include/` with their structure
/// preserved, Windows DLLs under `bin/`, every other library flat in `lib/`.
pub fn default_descriptors() -> Vec<ArtifactDescriptor> {
    vec![
        ArtifactDescriptor::tree("*.hpp", "include", "include"),
        ArtifactDescriptor::flat("*.dll", "bin"),
        ArtifactDescriptor::flat("*.so", "lib"),
        ArtifactDescriptor::flat("*.so.*", "lib"),
        ArtifactDescriptor::flat("*.dylib", "lib"),
        ArtifactDescriptor::flat("*.a", "lib"),
    ]
}

/// What downstream consumers must link against.
///
/// This is a declaration. It says nothing about which files a particular
/// build actually produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageExport {
    /// Library link-names (`terminalpp` for `libterminalpp.a`).
    #[serde(default)]
    pub libs: Vec<String>,
}
