//! Package export contract and manifest.
//!
//! The export contract tells consumers which link-names a package provides.
//! It is a pure function of the recipe: option values never change it. The
//! manifest (`kilninfo.json`) records what a particular build produced.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kiln_schema::{DependencySpec, OptionSet, OptionValue, PackageExport, Settings};
use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::packager::{PackagedSet, PackagingError};
use crate::recipe::Recipe;

/// Manifest file written at the package root.
pub const MANIFEST_FILE: &str = "kilninfo.json";

/// Link-names consumers must link against.
pub fn export_info(recipe: &Recipe) -> PackageExport {
    recipe.package_info.clone()
}

/// One packaged file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Path relative to the package root, with `/` separators.
    pub path: String,
    /// Hex-encoded SHA-256 of the contents.
    pub sha256: String,
    /// Size in bytes.
    pub size: u64,
}

/// Record of one packaging run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// `name/version`.
    pub reference: String,
    /// Effective option values.
    pub options: BTreeMap<String, OptionValue>,
    /// Settings the recipe consumed.
    pub settings: Settings,
    /// Resolved requirements, in resolution order.
    pub requires: Vec<DependencySpec>,
    /// Link contract.
    pub export: PackageExport,
    /// Packaged files, sorted by path.
    pub files: Vec<ManifestFile>,
}

impl PackageManifest {
    /// Build a manifest for the files in `packaged`, hashing them under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagingError::Io`] if a packaged file cannot be read.
    pub fn collect(
        recipe: &Recipe,
        options: &OptionSet,
        settings: &Settings,
        requires: Vec<DependencySpec>,
        packaged: &PackagedSet,
        root: &Path,
    ) -> Result<Self, PackagingError> {
        let mut files = packaged
            .destinations()
            .map(|rel| hash_file(root, rel))
            .collect::<Result<Vec<_>, _>>()?;
        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(Self {
            reference: recipe.identity().reference(),
            options: options.values(),
            settings: settings.clone(),
            requires,
            export: export_info(recipe),
            files,
        })
    }

    /// Write the manifest to `<root>/kilninfo.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagingError::Io`] if serialization or the write fails.
    pub fn write(&self, root: &Path) -> Result<PathBuf, PackagingError> {
        let path = root.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| PackagingError::Io {
            path: path.clone(),
            source: io::Error::from(e),
        })?;
        fs::write(&path, json).map_err(|e| PackagingError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Read the manifest from `<root>/kilninfo.json`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagingError::Io`] if the file is missing or malformed.
    pub fn load(root: &Path) -> Result<Self, PackagingError> {
        let path = root.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|e| PackagingError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| PackagingError::Io {
            path,
            source: io::Error::from(e),
        })
    }
}

fn hash_file(root: &Path, rel: &Path) -> Result<ManifestFile, PackagingError> {
    let path = root.join(rel);
    let wrap = |e: io::Error| PackagingError::Io {
        path: path.clone(),
        source: e,
    };

    let mut file = fs::File::open(&path).map_err(wrap)?;
    let mut hasher = sha2::Sha256::new();
    let size = io::copy(&mut file, &mut hasher).map_err(wrap)?;

    Ok(ManifestFile {
        path: rel.to_string_lossy().replace('\\', "/"),
        sha256: hex::encode(hasher.finalize()),
        size,
    })
}

/// Link-names in `export` with no matching artifact under `package_dir`.
///
/// A name `x` is satisfied by `lib/libx.a`, `lib/libx.so`, `lib/libx.so.*`,
/// `lib/libx.dylib`, `lib/x.lib` or `bin/x.dll`.
pub fn verify(export: &PackageExport, package_dir: &Path) -> Vec<String> {
    let lib = file_names(&package_dir.join("lib"));
    let bin = file_names(&package_dir.join("bin"));

    export
        .libs
        .iter()
        .filter(|name| {
            let unix = format!("lib{name}");
            let found_lib = lib.iter().any(|f| {
                f == &format!("{unix}.a")
                    || f == &format!("{unix}.so")
                    || f.starts_with(&format!("{unix}.so."))
                    || f == &format!("{unix}.dylib")
                    || f == &format!("{name}.lib")
            });
            let found_bin = bin.iter().any(|f| f == &format!("{name}.dll"));
            !(found_lib || found_bin)
        })
        .cloned()
        .collect()
}

fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().to_str().map(ToString::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::Packager;
    use crate::recipe::tests::terminalpp;
    use crate::resolver::resolve;
    use tempfile::tempdir;

    #[test]
    fn test_export_info_ignores_options() {
        let recipe = terminalpp();
        assert_eq!(export_info(&recipe).libs, vec!["terminalpp"]);

        let mut opts = recipe.default_options().unwrap();
        opts.set("shared", true).unwrap();
        assert_eq!(export_info(&recipe).libs, vec!["terminalpp"]);
    }

    #[test]
    fn test_manifest_written_and_loaded() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir_all(src.path().join("build")).unwrap();
        fs::write(src.path().join("build/libterminalpp.a"), "archive").unwrap();

        let recipe = terminalpp();
        let opts = recipe.default_options().unwrap();
        let set = Packager::default()
            .package(src.path(), dst.path(), &recipe.package)
            .unwrap();

        let manifest = PackageManifest::collect(
            &recipe,
            &opts,
            &Settings::default(),
            resolve(&recipe.requires, &opts),
            &set,
            dst.path(),
        )
        .unwrap();
        let path = manifest.write(dst.path()).unwrap();
        assert!(path.ends_with(MANIFEST_FILE));

        let loaded = PackageManifest::load(dst.path()).unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.reference, "terminalpp/1.3.0");
        assert_eq!(loaded.requires.len(), 3);
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.files[0].path, "lib/libterminalpp.a");
        assert_eq!(loaded.files[0].size, 7);
        assert_eq!(loaded.files[0].sha256.len(), 64);
    }

    #[test]
    fn test_verify_reports_missing_libs() {
        let dir = tempdir().unwrap();
        let export = PackageExport {
            libs: vec!["terminalpp".to_string()],
        };
        assert_eq!(verify(&export, dir.path()), vec!["terminalpp"]);

        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/libterminalpp.so.1.3.0"), "").unwrap();
        assert!(verify(&export, dir.path()).is_empty());
    }

    #[test]
    fn test_verify_accepts_windows_layout() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::write(dir.path().join("bin/terminalpp.dll"), "").unwrap();
        let export = PackageExport {
            libs: vec!["terminalpp".to_string(), "extra".to_string()],
        };
        assert_eq!(verify(&export, dir.path()), vec!["extra"]);
    }
}
