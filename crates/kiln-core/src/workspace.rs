//! Scoped working directories for a single recipe evaluation.
//!
//! Each evaluation gets its own disposable directory: the exported sources
//! are staged at its root and the build tool writes into `build/`. Nothing
//! outside it is touched until packaging, and the directory is removed when
//! the workspace is dropped.

use anyhow::{Context, Result};
use std::path::Path;

use crate::packager::{PackagingError, export_sources};

/// Name of the build tree inside a workspace.
pub const BUILD_DIR: &str = "build";

/// A disposable directory owned by one evaluation.
#[derive(Debug)]
pub struct BuildWorkspace {
    temp_dir: tempfile::TempDir,
}

impl BuildWorkspace {
    /// Create a new workspace under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` or the workspace directory cannot be created.
    pub fn new_in(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create {}", root.display()))?;

        let temp_dir = tempfile::Builder::new()
            .prefix("kiln-build-")
            .tempdir_in(root)
            .context("Failed to create build workspace")?;

        tracing::debug!("workspace at {}", temp_dir.path().display());
        Ok(Self { temp_dir })
    }

    /// Access the root path. Staged sources live directly here.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Stage `source` into the workspace root.
    ///
    /// With export patterns only the matching files are copied, paths
    /// preserved. Without any, the whole tree is copied.
    ///
    /// # Errors
    ///
    /// Returns [`PackagingError::Io`] if reading the source or writing the
    /// workspace fails.
    pub fn stage(&self, source: &Path, exports: &[String]) -> Result<usize, PackagingError> {
        if exports.is_empty() {
            copy_dir_all(source, self.path()).map_err(|e| PackagingError::Io {
                path: source.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })?;
            return Ok(walkdir::WalkDir::new(self.path())
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_file())
                .count());
        }

        let staged = export_sources(source, self.path(), exports)?;
        Ok(staged.len())
    }
}

/// Recursively copy a directory tree from `src` to `dst`.
///
/// Uses `fs_extra` for robust recursive copying with overwrite semantics.
///
/// # Errors
///
/// Returns an error if any file or directory cannot be copied.
pub fn copy_dir_all(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<()> {
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .overwrite(true),
    )
    .map_err(|e| anyhow::anyhow!("Copy failed: {e}"))?;
    Ok(())
}
