//! Artifact packaging.
//!
//! Build tools lay their outputs out however they like. The packager walks a
//! source tree once per [`ArtifactDescriptor`], in table order, and copies
//! every match into a fixed package layout (`include/`, `bin/`, `lib/`).
//!
//! ## Flattening and collisions
//!
//! A descriptor with `keep_path = false` drops the matched file's directory,
//! so `build/sub/libx.so.1` lands at `lib/libx.so.1`. Two different sources
//! may then map to the same destination. [`CollisionPolicy`] decides what
//! happens; the default is [`CollisionPolicy::LastWriteWins`], where "last"
//! is well defined because each tree is walked in file-name order.
//!
//! ## Build trees
//!
//! Build tools write generated files (for example a `version.hpp` produced
//! from a `.in` template) into their own tree rather than next to the
//! sources. A descriptor with a `src` directory is therefore also run against
//! `<build tree>/<src>` for every build tree registered with
//! [`Packager::with_build_tree`]. Descriptors without `src` already walk the
//! whole source tree, build trees included.
//!
//! A filesystem error aborts packaging immediately. The remaining
//! descriptors are not processed and the destination must be treated as
//! garbage.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use kiln_schema::ArtifactDescriptor;
use thiserror::Error;

/// Errors raised while packaging.
#[derive(Error, Debug)]
pub enum PackagingError {
    /// A read or write failed. Packaging stopped at this file.
    #[error("IO error packaging {}: {source}", .path.display())]
    Io {
        /// The path being read or written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Two sources map to one destination under [`CollisionPolicy::Reject`].
    #[error("{} is produced by both {} and {}", .destination.display(), .first.display(), .second.display())]
    Collision {
        /// Destination path, relative to the package root.
        destination: PathBuf,
        /// Source copied first.
        first: PathBuf,
        /// Source that would have overwritten it.
        second: PathBuf,
    },

    /// A descriptor's glob does not compile.
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message from `glob`.
        message: String,
    },
}

/// What to do when flattening maps two sources onto one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Overwrite: the file visited last is the one that remains.
    #[default]
    LastWriteWins,
    /// Fail with [`PackagingError::Collision`].
    Reject,
}

/// One copied file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedFile {
    /// Index of the descriptor that matched.
    pub descriptor: usize,
    /// Absolute source path.
    pub source: PathBuf,
    /// Destination relative to the package root.
    pub destination: PathBuf,
}

/// Result of a packaging run: one entry per destination file.
#[derive(Debug, Clone, Default)]
pub struct PackagedSet {
    /// Copied files, in the order they were first written.
    pub files: Vec<PackagedFile>,
    /// How many times a destination was overwritten.
    pub overwritten: usize,
}

impl PackagedSet {
    /// Number of destination files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Destination paths, relative to the package root.
    pub fn destinations(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.destination.as_path())
    }
}

/// Copies build outputs into the package layout.
#[derive(Debug, Clone, Default)]
pub struct Packager {
    collision: CollisionPolicy,
    build_trees: Vec<PathBuf>,
}

impl Packager {
    /// Packager with the given collision policy.
    pub fn new(collision: CollisionPolicy) -> Self {
        Self {
            collision,
            build_trees: Vec::new(),
        }
    }

    /// Also search `<source tree>/<tree>/<src>` for descriptors with a `src`.
    pub fn with_build_tree(mut self, tree: impl Into<PathBuf>) -> Self {
        let tree = tree.into();
        if !self.build_trees.contains(&tree) {
            self.build_trees.push(tree);
        }
        self
    }

    /// Package `source_tree` into `destination_tree`.
    ///
    /// No matches for a descriptor is expected (only one of the dynamic or
    /// static forms normally exists) and not an error. The destination tree
    /// itself is skipped if it lies inside the source tree.
    ///
    /// # Errors
    ///
    /// Returns [`PackagingError::Io`] on the first filesystem failure,
    /// [`PackagingError::Collision`] under [`CollisionPolicy::Reject`], and
    /// [`PackagingError::Pattern`] for a glob that does not compile.
    pub fn package(
        &self,
        source_tree: &Path,
        destination_tree: &Path,
        descriptors: &[ArtifactDescriptor],
    ) -> Result<PackagedSet, PackagingError> {
        fs::create_dir_all(destination_tree).map_err(|e| io_err(destination_tree, e))?;
        let skip = destination_tree.canonicalize().ok();

        let mut set = PackagedSet::default();
        let mut claimed: HashMap<PathBuf, usize> = HashMap::new();

        for (index, descriptor) in descriptors.iter().enumerate() {
            let mut matches = Vec::new();
            for root in self.roots(source_tree, descriptor) {
                if !root.is_dir() {
                    tracing::debug!("{}: {} does not exist", descriptor.pattern, root.display());
                    continue;
                }
                matches.extend(find_matches(&root, descriptor, skip.as_deref())?);
            }
            tracing::debug!("{} matched {} file(s)", descriptor.pattern, matches.len());

            for (source, rel) in matches {
                let dest_rel = destination_for(descriptor, &rel);

                let previous = claimed.get(&dest_rel).copied();
                if let Some(prev) = previous {
                    let first = &set.files[prev].source;
                    if *first == source {
                        continue;
                    }
                    if self.collision == CollisionPolicy::Reject {
                        return Err(PackagingError::Collision {
                            destination: dest_rel,
                            first: first.clone(),
                            second: source,
                        });
                    }
                    tracing::warn!(
                        "{} overwrites {} at {}",
                        source.display(),
                        first.display(),
                        dest_rel.display()
                    );
                }

                copy_artifact(&source, &destination_tree.join(&dest_rel))?;

                let file = PackagedFile {
                    descriptor: index,
                    source,
                    destination: dest_rel.clone(),
                };
                if let Some(prev) = previous {
                    set.files[prev] = file;
                    set.overwritten += 1;
                } else {
                    claimed.insert(dest_rel, set.files.len());
                    set.files.push(file);
                }
            }
        }

        Ok(set)
    }

    /// Directories a descriptor is matched under, staged sources first.
    fn roots(&self, source_tree: &Path, descriptor: &ArtifactDescriptor) -> Vec<PathBuf> {
        match &descriptor.src {
            Some(src) => std::iter::once(source_tree.join(src))
                .chain(self.build_trees.iter().map(|t| source_tree.join(t).join(src)))
                .collect(),
            None => vec![source_tree.to_path_buf()],
        }
    }
}

/// Snapshot the recipe's exported sources: every file under `source` that
/// matches one of `patterns`, copied to `dest` with its path preserved.
///
/// # Errors
///
/// Same as [`Packager::package`].
pub fn export_sources(
    source: &Path,
    dest: &Path,
    patterns: &[String],
) -> Result<Vec<PathBuf>, PackagingError> {
    let descriptors: Vec<ArtifactDescriptor> = patterns
        .iter()
        .map(|p| ArtifactDescriptor {
            pattern: p.clone(),
            src: None,
            dst: String::new(),
            keep_path: true,
        })
        .collect();

    let set = Packager::default().package(source, dest, &descriptors)?;
    Ok(set.files.into_iter().map(|f| f.destination).collect())
}

fn destination_for(descriptor: &ArtifactDescriptor, rel: &Path) -> PathBuf {
    let base = Path::new(&descriptor.dst);
    if descriptor.keep_path {
        base.join(rel)
    } else {
        // `rel` always comes from a file entry, so it has a file name.
        base.join(rel.file_name().unwrap_or(rel.as_os_str()))
    }
}

/// Files under `root` matching the descriptor, as (absolute, relative-to-root)
/// pairs in file-name order.
fn find_matches(
    root: &Path,
    descriptor: &ArtifactDescriptor,
    skip: Option<&Path>,
) -> Result<Vec<(PathBuf, PathBuf)>, PackagingError> {
    let pattern = glob::Pattern::new(&descriptor.pattern).map_err(|e| PackagingError::Pattern {
        pattern: descriptor.pattern.clone(),
        message: e.to_string(),
    })?;
    let by_path = descriptor.pattern.contains('/');
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let walker = walkdir::WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && skip.is_some_and(|s| e.path().canonicalize().is_ok_and(|c| c == s)))
        });

    let mut matches = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(&path, std::io::Error::from(e))
        })?;

        if entry.file_type().is_dir() || entry.path().is_dir() {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };

        let matched = if by_path {
            pattern.matches_path_with(rel, options)
        } else {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| pattern.matches_with(name, options))
        };

        if matched {
            matches.push((entry.path().to_path_buf(), rel.to_path_buf()));
        }
    }

    Ok(matches)
}

/// Copy one file, replacing whatever is at `dest`.
///
/// A symlink whose target is a sibling file name (`libx.so -> libx.so.1`) is
/// recreated as a symlink so versioned library chains survive flattening.
/// Any other symlink is copied as the file it points to.
fn copy_artifact(source: &Path, dest: &Path) -> Result<(), PackagingError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if dest.symlink_metadata().is_ok() {
        fs::remove_file(dest).map_err(|e| io_err(dest, e))?;
    }

    if let Some(target) = sibling_link_target(source) {
        return relink(source, &target, dest);
    }

    fs::copy(source, dest).map_err(|e| io_err(source, e))?;
    Ok(())
}

fn sibling_link_target(source: &Path) -> Option<PathBuf> {
    let meta = source.symlink_metadata().ok()?;
    if !meta.file_type().is_symlink() {
        return None;
    }
    let target = fs::read_link(source).ok()?;
    let mut components = target.components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(_)), None) => Some(target),
        _ => None,
    }
}

#[cfg(unix)]
fn relink(_source: &Path, target: &Path, dest: &Path) -> Result<(), PackagingError> {
    std::os::unix::fs::symlink(target, dest).map_err(|e| io_err(dest, e))
}

#[cfg(not(unix))]
fn relink(source: &Path, _target: &Path, dest: &Path) -> Result<(), PackagingError> {
    fs::copy(source, dest).map(|_| ()).map_err(|e| io_err(source, e))
}

fn io_err(path: &Path, source: std::io::Error) -> PackagingError {
    PackagingError::Io {
        path: path.to_path_buf(),
        source,
    }
}
